pub mod stage_tensor;

pub use stage_tensor::{StageTensor, ValueRange};

use ndarray::{Array3, Array4};

/// Height of every tensor the oracle sees.
pub const TARGET_HEIGHT: usize = 244;
/// Width of every tensor the oracle sees.
pub const TARGET_WIDTH: usize = 244;
/// Colour channels per pixel (R, G, B).
pub const CHANNELS: usize = 3;
/// Number of scalar inputs the oracle consumes per image.
pub const INPUT_LEN: usize = TARGET_HEIGHT * TARGET_WIDTH * CHANNELS;

/// Un-batched image in HWC layout, values in [0, 1].
pub type ImageTensor = Array3<f32>;

/// Batch of images in NHWC layout; the pipeline always produces `N == 1`.
pub type BatchTensor = Array4<f32>;
