use ndarray::{s, Array3};
use rand::Rng;
use tracing::debug;

use crate::tensor::StageTensor;

/// Mirrors the tensor along the width axis.
pub fn flip_horizontal(data: Array3<f32>) -> Array3<f32> {
    data.slice(s![.., ..;-1, ..]).to_owned()
}

/// Random horizontal flip.
///
/// When `enabled` is false the tensor is returned untouched and `rng` is not
/// consulted. Otherwise one uniform draw is taken and the tensor is mirrored
/// when it exceeds 0.5. Returns the tensor and whether it was flipped.
pub fn random_flip<R: Rng + ?Sized>(
    tensor: StageTensor,
    enabled: bool,
    rng: &mut R,
) -> (StageTensor, bool) {
    if !enabled {
        return (tensor, false);
    }
    let flip = rng.gen::<f64>() > 0.5;
    debug!(flip, "augmentation draw");
    if flip {
        (tensor.map_data(flip_horizontal), true)
    } else {
        (tensor, false)
    }
}
