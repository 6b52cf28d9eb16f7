use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// A fully connected layer evaluated read-only.
///
/// `weights` is `(input_size × size)` and `biases` is `(1 × size)`, matching
/// the layout of saved model files. Extra fields present in older files
/// (cached activations) are ignored on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction
}

impl Layer {
    pub fn new(weights: Matrix, biases: Matrix, activation: ActivationFunction) -> Layer {
        Layer {
            size: weights.cols,
            weights,
            biases,
            activator: activation
        }
    }

    /// Number of inputs this layer accepts.
    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    /// Computes `activation(input · W + b)`.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut z = self.weights.left_mul(input);
        if let Some(bias) = self.biases.data.first() {
            for (zi, b) in z.iter_mut().zip(bias) {
                *zi += b;
            }
        }
        self.activator.apply(z)
    }

    /// Checks that weights, biases and `size` describe the same layer.
    pub fn check_shape(&self) -> Result<(), String> {
        if !self.weights.is_consistent() || !self.biases.is_consistent() {
            return Err("ragged weight or bias matrix".into());
        }
        if self.weights.cols != self.size {
            return Err(format!(
                "weights have {} columns but layer size is {}",
                self.weights.cols, self.size
            ));
        }
        if self.biases.rows != 1 || self.biases.cols != self.size {
            return Err(format!(
                "biases are {}x{} but layer size is {}",
                self.biases.rows, self.biases.cols, self.size
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_adds_bias_after_product() {
        let layer = Layer::new(
            Matrix::from_data(vec![vec![1.0, -1.0], vec![2.0, 0.5]]),
            Matrix::from_data(vec![vec![0.5, 0.0]]),
            ActivationFunction::Identity,
        );
        assert_eq!(layer.forward(&[1.0, 1.0]), vec![3.5, -0.5]);
    }

    #[test]
    fn check_shape_flags_bias_mismatch() {
        let layer = Layer::new(
            Matrix::zeros(3, 2),
            Matrix::zeros(1, 3),
            ActivationFunction::ReLU,
        );
        assert!(layer.check_shape().is_err());
    }
}
