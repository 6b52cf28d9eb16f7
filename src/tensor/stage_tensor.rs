use ndarray::{Array3, Zip};

use crate::tensor::ImageTensor;

/// Value range a [`StageTensor`] is currently expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRange {
    /// Floating-point samples in [0, 1].
    Unit,
    /// Integral samples in [0, 255] stored as f32.
    Byte,
}

/// An HWC tensor travelling between pipeline stages together with the range
/// its samples are expressed in.
///
/// Stages never guess the range from the data; they ask the tensor, convert
/// with the helpers below, and hand back a tensor tagged with the new range.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTensor {
    data: Array3<f32>,
    range: ValueRange,
}

impl StageTensor {
    /// Wraps a tensor whose samples are already in [0, 1].
    pub fn unit(data: Array3<f32>) -> Self {
        StageTensor { data, range: ValueRange::Unit }
    }

    /// Wraps an 8-bit tensor; samples become byte-range floats.
    pub fn from_bytes(bytes: &Array3<u8>) -> Self {
        StageTensor { data: bytes.mapv(f32::from), range: ValueRange::Byte }
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn range(&self) -> ValueRange {
        self.range
    }

    /// Number of channels in the last axis.
    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// Applies a shape-level transform (flip, transpose, ...) that leaves the
    /// value range untouched.
    pub fn map_data<F>(self, transform: F) -> Self
    where
        F: FnOnce(Array3<f32>) -> Array3<f32>,
    {
        StageTensor { data: transform(self.data), range: self.range }
    }

    /// Converts to 8-bit samples.
    ///
    /// Unit-range samples are scaled by 255 in f32 and truncated toward zero;
    /// byte-range samples are cast directly. Out-of-range values saturate.
    pub fn to_bytes(&self) -> Array3<u8> {
        match self.range {
            ValueRange::Unit => self.data.mapv(unit_to_byte),
            ValueRange::Byte => self.data.mapv(|v| v as u8),
        }
    }

    /// Converts to a unit-range image tensor.
    pub fn into_unit(self) -> ImageTensor {
        match self.range {
            ValueRange::Unit => self.data,
            ValueRange::Byte => self.data.mapv_into(|v| v / 255.0),
        }
    }

    /// True when every sample lies inside the range this tensor claims.
    pub fn is_within_range(&self) -> bool {
        let upper = match self.range {
            ValueRange::Unit => 1.0,
            ValueRange::Byte => 255.0,
        };
        let mut ok = true;
        Zip::from(&self.data).for_each(|&v| ok &= (0.0..=upper).contains(&v));
        ok
    }
}

/// Unit-range sample to byte: `(v * 255) as u8`, truncating.
pub fn unit_to_byte(v: f32) -> u8 {
    (v * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn unit_to_bytes_truncates() {
        let t = StageTensor::unit(Array3::from_elem((1, 1, 3), 0.999));
        assert_eq!(t.to_bytes()[[0, 0, 0]], 254);
    }

    #[test]
    fn byte_tensor_rescales_on_exit() {
        let bytes = Array3::from_elem((2, 2, 3), 255u8);
        let t = StageTensor::from_bytes(&bytes);
        assert_eq!(t.range(), ValueRange::Byte);
        let unit = t.into_unit();
        assert!(unit.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn decoded_pixel_values_survive_a_byte_round_trip() {
        // Every byte value divided by 255 in f32 must come back unchanged.
        let bytes = Array3::from_shape_fn((16, 16, 1), |(y, x, _)| (y * 16 + x) as u8);
        let unit = StageTensor::unit(bytes.mapv(|b| f32::from(b) / 255.0));
        assert_eq!(unit.to_bytes(), bytes);
    }

    #[test]
    fn range_check_respects_tag() {
        let t = StageTensor::unit(Array3::from_elem((1, 1, 1), 2.0));
        assert!(!t.is_within_range());
        let bytes = StageTensor::from_bytes(&Array3::from_elem((1, 1, 1), 200u8));
        assert!(bytes.is_within_range());
    }
}
