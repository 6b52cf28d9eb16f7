use serde::{Deserialize, Serialize};

/// Describes how to interpret the input fed to a Network.
/// Stored in model JSON; the oracle only accepts `ImageRgb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputType {
    /// Comma-separated f64 values.
    Numeric,
    /// Grayscale image resized to width×height, normalized to [0, 1].
    ImageGrayscale { width: u32, height: u32 },
    /// RGB image resized to width×height, normalized to [0, 1], flattened as R,G,B,...
    ImageRgb { width: u32, height: u32 },
}

/// Optional annotations attached to a saved Network.
/// All fields are Option<> so models without metadata deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelMetadata {
    pub description: Option<String>,
    pub input_type: Option<InputType>,
    /// Class labels for the output layer, in output order. When present they
    /// must agree with the taxonomy manifest loaded next to the model.
    pub output_labels: Option<Vec<String>>,
}
