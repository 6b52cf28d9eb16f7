//! Diagnostic image encoding: tensor → JPEG → base64.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::tensor::stage_tensor::unit_to_byte;
use crate::tensor::{ImageTensor, CHANNELS};

/// JPEG quality used unless configured otherwise.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Serializes the exact tensor the oracle saw into a text-safe JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultEncoder {
    quality: u8,
}

impl Default for ResultEncoder {
    fn default() -> Self {
        ResultEncoder { quality: DEFAULT_JPEG_QUALITY }
    }
}

impl ResultEncoder {
    pub fn new(quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(Error::Config(format!("JPEG quality must be in 1..=100, got {quality}")));
        }
        Ok(ResultEncoder { quality })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Truncates the unit-range tensor to bytes, encodes it as JPEG and
    /// returns the standard padded base64 of the file.
    pub fn encode(&self, image: &ImageTensor) -> Result<String> {
        let rgb = to_rgb_image(image)?;
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(&rgb)
            .map_err(Error::Encoding)?;
        Ok(STANDARD.encode(&jpeg))
    }
}

/// Converts an HWC unit-range tensor to an 8-bit RGB image.
pub fn to_rgb_image(image: &ImageTensor) -> Result<RgbImage> {
    let (h, w, c) = image.dim();
    if c != CHANNELS {
        return Err(Error::Encoding(ImageError::Parameter(
            image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::Generic(format!("expected 3 channels, got {c}")),
            ),
        )));
    }
    Ok(RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            unit_to_byte(image[[y, x, 0]]),
            unit_to_byte(image[[y, x, 1]]),
            unit_to_byte(image[[y, x, 2]]),
        ])
    }))
}
