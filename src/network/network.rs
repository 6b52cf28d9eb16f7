use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::layers::dense::Layer;
use crate::network::metadata::ModelMetadata;

/// A stack of dense layers loaded from a saved model file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl Network {
    pub fn new(layers: Vec<Layer>) -> Network {
        Network { layers, metadata: None }
    }

    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Network {
        self.metadata = Some(metadata);
        self
    }

    /// Forward pass. Takes `&self`: nothing is cached, so one network can
    /// serve concurrent requests.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.forward(&current);
        }
        current
    }

    /// Inputs expected by the first layer.
    pub fn input_len(&self) -> usize {
        self.layers.first().map_or(0, |l| l.input_size())
    }

    /// Outputs produced by the last layer.
    pub fn output_len(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }

    /// Checks each layer's shape and that consecutive layers chain.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.layers.is_empty() {
            return Err("model has no layers".into());
        }
        let mut expected_input = self.layers[0].input_size();
        for (i, layer) in self.layers.iter().enumerate() {
            layer.check_shape().map_err(|e| format!("layer {i}: {e}"))?;
            if layer.input_size() != expected_input {
                return Err(format!(
                    "layer {i} expects {} inputs but the previous layer yields {expected_input}",
                    layer.input_size()
                ));
            }
            expected_input = layer.size;
        }
        Ok(())
    }

    /// Serializes the network to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).map_err(|e| Error::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Deserializes and validates a network from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Network> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        let network: Network = serde_json::from_reader(reader).map_err(|e| Error::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        network.validate().map_err(|reason| Error::ModelLoad {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(network)
    }
}
