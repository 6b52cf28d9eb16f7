//! # Preprocessing pipeline
//!
//! decode → random flip → contrast (optional) → denoise + sharpen, in that
//! order. The order is part of the model contract: contrast enhancement and
//! denoising do not commute.

pub mod augment;
pub mod border;
pub mod contrast;
pub mod decode;
pub mod denoise;
pub mod sharpen;

use std::time::Instant;

use ndarray::{Array3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::tensor::{BatchTensor, ImageTensor, StageTensor, ValueRange};

pub use augment::random_flip;
pub use contrast::enhance_contrast;
pub use decode::decode_image;
pub use denoise::{denoise_colored, NlMeansParams};
pub use sharpen::sharpen;

/// Per-request pipeline switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Randomly mirror the image before enhancement.
    pub augment: bool,
    /// Run the grayscale contrast-enhancement path.
    pub to_grayscale: bool,
}

/// Output of [`preprocess`]: the same pixels viewed with and without the
/// leading batch axis.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// `(1, 244, 244, 3)` tensor handed to the oracle.
    pub batch: BatchTensor,
    /// `(244, 244, 3)` tensor kept for the diagnostic image.
    pub image: ImageTensor,
    /// Whether the augmentation stage mirrored the image.
    pub flipped: bool,
}

/// Entry rescale of the denoise stage: every sample is multiplied by 255 and
/// stored as a byte.
///
/// Unit-range samples land in `[0, 255]` by truncation. Byte-range samples
/// (the output of the contrast stage) are multiplied in 8-bit arithmetic and
/// wrap modulo 256, so `v` becomes `256 - v` for `v > 0` and 0 stays 0. The
/// classifier was trained on grayscale-path images with this inversion, so it
/// is kept as is.
pub fn rescale_for_denoise(tensor: &StageTensor) -> Array3<u8> {
    match tensor.range() {
        ValueRange::Unit => tensor.to_bytes(),
        ValueRange::Byte => tensor.to_bytes().mapv_into(|v| v.wrapping_mul(255)),
    }
}

/// Denoise-and-sharpen stage, always applied.
///
/// Accepts a tensor in either range, rescales it with
/// [`rescale_for_denoise`], promotes a single channel to three, runs
/// non-local-means then the sharpening kernel, and returns a unit-range
/// tensor.
pub fn denoise_and_sharpen(tensor: StageTensor, params: &NlMeansParams) -> ImageTensor {
    debug_assert!(tensor.is_within_range());
    let bytes = denoise::ensure_three_channels(rescale_for_denoise(&tensor));
    let denoised = denoise_colored(&bytes, params);
    let sharpened = sharpen(&denoised);
    StageTensor::from_bytes(&sharpened).into_unit()
}

/// Runs the full pipeline on raw image bytes.
///
/// Deterministic for a given input when `options.augment` is false; with
/// augmentation on, the single random draw comes from `rng`.
pub fn preprocess<R: Rng + ?Sized>(
    bytes: &[u8],
    options: PipelineOptions,
    rng: &mut R,
) -> Result<PreprocessedImage> {
    let start = Instant::now();

    let decoded = StageTensor::unit(decode_image(bytes)?);
    let (augmented, flipped) = random_flip(decoded, options.augment, rng);
    let contrasted = enhance_contrast(augmented, options.to_grayscale);
    let image = denoise_and_sharpen(contrasted, &NlMeansParams::default());
    let batch = image.clone().insert_axis(Axis(0));

    debug!(
        flipped,
        to_grayscale = options.to_grayscale,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "preprocessing finished"
    );
    Ok(PreprocessedImage { batch, image, flipped })
}
