use std::path::Path;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::network::{InputType, Network};
use crate::tensor::{BatchTensor, CHANNELS, INPUT_LEN, TARGET_HEIGHT, TARGET_WIDTH};

/// A trained classifier treated as a black box: one batch in, one score per
/// label out.
///
/// Implementations are shared by every request thread, so `predict` takes
/// `&self` and must not rely on interior mutability without its own
/// synchronisation.
pub trait ClassificationOracle: Send + Sync {
    /// Length of the score vector `predict` returns.
    fn output_len(&self) -> usize;

    /// Class labels baked into the model, if it carries any.
    fn embedded_labels(&self) -> Option<&[String]> {
        None
    }

    /// Scores a `(1, 244, 244, 3)` batch.
    fn predict(&self, batch: &BatchTensor) -> Result<Vec<f32>>;
}

/// Oracle backed by a dense [`Network`] loaded from model JSON.
///
/// The batch is flattened in HWC order (R, G, B per pixel, rows top to
/// bottom), which is the `ImageRgb` input layout.
#[derive(Debug, Clone)]
pub struct DenseOracle {
    network: Network,
}

impl DenseOracle {
    /// Wraps an already validated network, checking it accepts a flattened
    /// 244×244 RGB image.
    pub fn new(network: Network) -> std::result::Result<Self, String> {
        network.validate()?;
        if network.input_len() != INPUT_LEN {
            return Err(format!(
                "model expects {} inputs, the pipeline produces {INPUT_LEN}",
                network.input_len()
            ));
        }
        match network.metadata.as_ref().and_then(|m| m.input_type.as_ref()) {
            None => {}
            Some(InputType::ImageRgb { width, height })
                if *width as usize == TARGET_WIDTH && *height as usize == TARGET_HEIGHT => {}
            Some(other) => {
                return Err(format!("model declares input {other:?}, expected 244x244 RGB"));
            }
        }
        if let Some(last) = network.layers.last() {
            if !last.activator.yields_probabilities() {
                warn!(activation = ?last.activator, "output layer does not produce probabilities");
            }
        }
        Ok(DenseOracle { network })
    }

    /// Loads and checks a model file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let network = Network::load_json(path)?;
        let oracle = DenseOracle::new(network).map_err(|reason| Error::ModelLoad {
            path: path.to_path_buf(),
            reason,
        })?;
        info!(path = %path.display(), outputs = oracle.output_len(), "loaded dense oracle");
        Ok(oracle)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }
}

impl ClassificationOracle for DenseOracle {
    fn output_len(&self) -> usize {
        self.network.output_len()
    }

    fn embedded_labels(&self) -> Option<&[String]> {
        self.network.metadata.as_ref().and_then(|m| m.output_labels.as_deref())
    }

    fn predict(&self, batch: &BatchTensor) -> Result<Vec<f32>> {
        let expected = (1, TARGET_HEIGHT, TARGET_WIDTH, CHANNELS);
        if batch.dim() != expected {
            return Err(Error::Oracle(format!(
                "batch has shape {:?}, expected {expected:?}",
                batch.dim()
            )));
        }
        let input: Vec<f64> = batch.iter().map(|&v| f64::from(v)).collect();
        Ok(self.network.forward(&input).into_iter().map(|v| v as f32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::layers::dense::Layer;
    use crate::math::matrix::Matrix;
    use crate::network::ModelMetadata;
    use ndarray::Array4;

    /// Two-class network whose first logit is the sum of all red samples.
    fn red_detector() -> Network {
        let mut weights = Matrix::zeros(INPUT_LEN, 2);
        for (i, row) in weights.data.iter_mut().enumerate() {
            if i % CHANNELS == 0 {
                row[0] = 1e-4;
            }
        }
        Network::new(vec![Layer::new(weights, Matrix::zeros(1, 2), ActivationFunction::Softmax)])
    }

    #[test]
    fn rejects_wrong_input_size() {
        let small = Network::new(vec![Layer::new(
            Matrix::zeros(10, 2),
            Matrix::zeros(1, 2),
            ActivationFunction::Softmax,
        )]);
        assert!(DenseOracle::new(small).is_err());
    }

    #[test]
    fn rejects_mismatched_declared_input() {
        let net = red_detector().with_metadata(ModelMetadata {
            input_type: Some(InputType::ImageGrayscale { width: 244, height: 244 }),
            ..Default::default()
        });
        assert!(DenseOracle::new(net).is_err());
    }

    #[test]
    fn scores_follow_hwc_layout() {
        let oracle = DenseOracle::new(red_detector()).unwrap();
        let mut red = Array4::<f32>::zeros((1, 244, 244, 3));
        red.index_axis_mut(ndarray::Axis(3), 0).fill(1.0);
        let scores = oracle.predict(&red).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);

        let blue = {
            let mut b = Array4::<f32>::zeros((1, 244, 244, 3));
            b.index_axis_mut(ndarray::Axis(3), 2).fill(1.0);
            b
        };
        let scores = oracle.predict(&blue).unwrap();
        assert!((scores[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn wrong_batch_shape_is_an_oracle_error() {
        let oracle = DenseOracle::new(red_detector()).unwrap();
        let err = oracle.predict(&Array4::zeros((2, 244, 244, 3))).unwrap_err();
        assert!(matches!(err, Error::Oracle(_)));
    }
}
