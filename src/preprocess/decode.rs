//! Image decoding for the preprocessing pipeline.
//!
//! Decodes image bytes (PNG/JPEG/BMP/GIF), converts to 8-bit RGB, resizes to
//! the oracle's fixed resolution, and normalizes pixel values to [0, 1].

use image::imageops::{self, FilterType};
use ndarray::Array3;
use tracing::debug;

use crate::error::{Error, Result};
use crate::tensor::{ImageTensor, CHANNELS, TARGET_HEIGHT, TARGET_WIDTH};

/// Resampling filter used for the resize; bicubic matches how the training
/// images were scaled.
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Decodes `bytes` into a `(244, 244, 3)` tensor with values in [0, 1].
///
/// Grayscale inputs are replicated to three channels and alpha is discarded
/// before resizing. Fails with [`Error::Decode`] when the bytes are not an
/// image in a supported format (an empty payload included).
pub fn decode_image(bytes: &[u8]) -> Result<ImageTensor> {
    let img = image::load_from_memory(bytes).map_err(Error::Decode)?;
    debug!(width = img.width(), height = img.height(), "decoded upload");

    let rgb = img.to_rgb8();
    let resized = imageops::resize(&rgb, TARGET_WIDTH as u32, TARGET_HEIGHT as u32, RESIZE_FILTER);

    Ok(Array3::from_shape_fn((TARGET_HEIGHT, TARGET_WIDTH, CHANNELS), |(y, x, c)| {
        f32::from(resized.get_pixel(x as u32, y as u32).0[c]) / 255.0
    }))
}
