//! # Contrast enhancement
//!
//! Optional grayscale path: luminance reduction, contrast-limited adaptive
//! histogram equalization (CLAHE), then global histogram equalization, with the
//! result replicated back to three channels. All arithmetic is on 8-bit
//! samples so the output matches the equalization used for the training set.

use ndarray::{Array2, Array3, Axis};
use tracing::debug;

use crate::preprocess::border::reflect_101;
use crate::tensor::{StageTensor, CHANNELS};

/// CLAHE clip limit, relative to a uniform histogram.
pub const CLAHE_CLIP_LIMIT: f64 = 3.0;
/// CLAHE tile grid as (columns, rows).
pub const CLAHE_TILE_GRID: (usize, usize) = (8, 8);

const HIST_SIZE: usize = 256;

/// Contrast stage. Identity when `enabled` is false; otherwise returns a
/// byte-range, three-channel tensor whose channels are identical.
pub fn enhance_contrast(tensor: StageTensor, enabled: bool) -> StageTensor {
    if !enabled {
        return tensor;
    }
    let bytes = tensor.to_bytes();
    let gray = to_luminance(&bytes);
    let local = clahe(&gray, CLAHE_CLIP_LIMIT, CLAHE_TILE_GRID);
    let global = equalize_histogram(&local);
    debug!("applied grayscale contrast enhancement");
    let out = StageTensor::from_bytes(&replicate_channels(&global, CHANNELS));
    debug_assert!(out.is_within_range());
    out
}

/// BT.601 luma in 14-bit fixed point with rounding. Single-channel input is
/// passed through.
pub fn to_luminance(rgb: &Array3<u8>) -> Array2<u8> {
    const SHIFT: u32 = 14;
    const R2Y: u32 = 4899;
    const G2Y: u32 = 9617;
    const B2Y: u32 = 1868;

    if rgb.dim().2 == 1 {
        return rgb.index_axis(Axis(2), 0).to_owned();
    }
    let (h, w, _) = rgb.dim();
    Array2::from_shape_fn((h, w), |(y, x)| {
        let r = u32::from(rgb[[y, x, 0]]);
        let g = u32::from(rgb[[y, x, 1]]);
        let b = u32::from(rgb[[y, x, 2]]);
        ((r * R2Y + g * G2Y + b * B2Y + (1 << (SHIFT - 1))) >> SHIFT) as u8
    })
}

/// Stacks a single-channel image `channels` times along the last axis.
pub fn replicate_channels(gray: &Array2<u8>, channels: usize) -> Array3<u8> {
    let (h, w) = gray.dim();
    Array3::from_shape_fn((h, w, channels), |(y, x, _)| gray[[y, x]])
}

/// Contrast-limited adaptive histogram equalization.
///
/// `grid` is (columns, rows). When the image does not divide evenly into the
/// grid it is extended to the bottom and right with a reflect-101 border for
/// histogram purposes; the output keeps the input size.
pub fn clahe(src: &Array2<u8>, clip_limit: f64, grid: (usize, usize)) -> Array2<u8> {
    let (height, width) = src.dim();
    let (tiles_x, tiles_y) = grid;

    let (padded_h, padded_w) = if width % tiles_x == 0 && height % tiles_y == 0 {
        (height, width)
    } else {
        (height + tiles_y - height % tiles_y, width + tiles_x - width % tiles_x)
    };
    let tile_w = padded_w / tiles_x;
    let tile_h = padded_h / tiles_y;
    let tile_area = tile_w * tile_h;

    let clip = if clip_limit > 0.0 {
        Some(((clip_limit * tile_area as f64 / HIST_SIZE as f64) as usize).max(1))
    } else {
        None
    };
    let lut_scale = 255.0_f32 / tile_area as f32;

    let sample = |y: usize, x: usize| -> u8 {
        src[[reflect_101(y as isize, height), reflect_101(x as isize, width)]]
    };

    // One LUT per tile, row-major over the grid.
    let mut luts = vec![[0u8; HIST_SIZE]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut hist = [0usize; HIST_SIZE];
            for y in ty * tile_h..(ty + 1) * tile_h {
                for x in tx * tile_w..(tx + 1) * tile_w {
                    hist[usize::from(sample(y, x))] += 1;
                }
            }
            if let Some(clip) = clip {
                clip_histogram(&mut hist, clip);
            }
            let lut = &mut luts[ty * tiles_x + tx];
            let mut sum = 0usize;
            for (value, count) in hist.iter().enumerate() {
                sum += count;
                lut[value] = saturate_round(sum as f32 * lut_scale);
            }
        }
    }

    let inv_tw = 1.0_f32 / tile_w as f32;
    let inv_th = 1.0_f32 / tile_h as f32;
    let mut dst = Array2::<u8>::zeros((height, width));
    for y in 0..height {
        let (ty1, ty2, ya) = neighbour_tiles(y, inv_th, tiles_y);
        for x in 0..width {
            let (tx1, tx2, xa) = neighbour_tiles(x, inv_tw, tiles_x);
            let v = usize::from(src[[y, x]]);
            let lut = |ty: usize, tx: usize| f32::from(luts[ty * tiles_x + tx][v]);
            let top = lut(ty1, tx1) * (1.0 - xa) + lut(ty1, tx2) * xa;
            let bottom = lut(ty2, tx1) * (1.0 - xa) + lut(ty2, tx2) * xa;
            dst[[y, x]] = saturate_round(top * (1.0 - ya) + bottom * ya);
        }
    }
    dst
}

/// Locates the two tile centres surrounding `pos` and the interpolation
/// weight toward the second one.
fn neighbour_tiles(pos: usize, inv_tile: f32, tiles: usize) -> (usize, usize, f32) {
    let f = pos as f32 * inv_tile - 0.5;
    let first = f.floor();
    let weight = f - first;
    let first = first as isize;
    let lo = first.max(0) as usize;
    let hi = ((first + 1) as usize).min(tiles - 1);
    (lo, hi, weight)
}

/// Clips every bin at `clip` and spreads the excess evenly over all bins,
/// handing the remainder out one count at a time at a fixed stride.
fn clip_histogram(hist: &mut [usize; HIST_SIZE], clip: usize) {
    let mut clipped = 0usize;
    for count in hist.iter_mut() {
        if *count > clip {
            clipped += *count - clip;
            *count = clip;
        }
    }

    let batch = clipped / HIST_SIZE;
    let mut residual = clipped - batch * HIST_SIZE;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual != 0 {
        let step = (HIST_SIZE / residual).max(1);
        let mut i = 0;
        while i < HIST_SIZE && residual > 0 {
            hist[i] += 1;
            i += step;
            residual -= 1;
        }
    }
}

/// Global histogram equalization.
///
/// The LUT is anchored at the first occupied bin (mapped to 0) and scaled so
/// the last occupied bin reaches 255. An image with a single value is
/// returned unchanged.
pub fn equalize_histogram(src: &Array2<u8>) -> Array2<u8> {
    let total = src.len();
    if total == 0 {
        return src.clone();
    }
    let mut hist = [0usize; HIST_SIZE];
    for &v in src.iter() {
        hist[usize::from(v)] += 1;
    }

    let first = hist.iter().position(|&c| c != 0).unwrap_or(0);
    if hist[first] == total {
        return src.clone();
    }

    let scale = 255.0_f32 / (total - hist[first]) as f32;
    let mut lut = [0u8; HIST_SIZE];
    let mut sum = 0usize;
    for i in first + 1..HIST_SIZE {
        sum += hist[i];
        lut[i] = saturate_round(sum as f32 * scale);
    }
    src.mapv(|v| lut[usize::from(v)])
}

/// Rounds half to even and clamps into the byte range.
pub(crate) fn saturate_round(v: f32) -> u8 {
    v.round_ties_even().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::ValueRange;

    #[test]
    fn luminance_uses_fixed_point_weights() {
        let px = |r, g, b| Array3::from_shape_vec((1, 1, 3), vec![r, g, b]).unwrap();
        assert_eq!(to_luminance(&px(255, 0, 0))[[0, 0]], 76);
        assert_eq!(to_luminance(&px(0, 255, 0))[[0, 0]], 150);
        assert_eq!(to_luminance(&px(255, 255, 255))[[0, 0]], 255);
        assert_eq!(to_luminance(&px(0, 0, 0))[[0, 0]], 0);
    }

    #[test]
    fn equalization_stretches_two_levels_to_full_range() {
        let src = Array2::from_shape_fn((4, 4), |(y, _)| if y < 2 { 10u8 } else { 20 });
        let out = equalize_histogram(&src);
        assert_eq!(out[[0, 0]], 0);
        assert_eq!(out[[3, 3]], 255);
    }

    #[test]
    fn equalization_leaves_flat_image_alone() {
        let src = Array2::from_elem((5, 7), 42u8);
        assert_eq!(equalize_histogram(&src), src);
    }

    #[test]
    fn clip_redistribution_conserves_mass() {
        let mut hist = [0usize; HIST_SIZE];
        hist[100] = 961;
        clip_histogram(&mut hist, 11);
        assert_eq!(hist.iter().sum::<usize>(), 961);
        assert!(hist.iter().all(|&c| c <= 11 + 3 + 1));
    }

    #[test]
    fn clahe_keeps_flat_image_flat() {
        let src = Array2::from_elem((244, 244), 90u8);
        let out = clahe(&src, CLAHE_CLIP_LIMIT, CLAHE_TILE_GRID);
        assert_eq!(out.dim(), (244, 244));
        let first = out[[0, 0]];
        assert!(out.iter().all(|&v| v == first));
    }

    #[test]
    fn clahe_stretches_a_low_contrast_checkerboard() {
        // 32x32 tiles, each half 100 and half 110: clip at 12, every tile
        // shares the LUT, so the two levels land on 104 and 117.
        let src = Array2::from_shape_fn((256, 256), |(y, x)| if (x + y) % 2 == 0 { 100u8 } else { 110 });
        let out = clahe(&src, CLAHE_CLIP_LIMIT, CLAHE_TILE_GRID);
        assert_eq!(out[[0, 0]], 104);
        assert_eq!(out[[0, 1]], 117);
    }

    #[test]
    fn disabled_stage_is_identity() {
        let t = StageTensor::unit(Array3::from_elem((3, 3, 3), 0.25));
        assert_eq!(enhance_contrast(t.clone(), false), t);
    }

    #[test]
    fn enabled_stage_yields_equal_byte_channels() {
        let t = StageTensor::unit(Array3::from_shape_fn((32, 40, 3), |(y, x, c)| {
            ((y * 3 + x * 5 + c * 60) % 256) as f32 / 255.0
        }));
        let out = enhance_contrast(t, true);
        assert_eq!(out.range(), ValueRange::Byte);
        assert_eq!(out.channels(), 3);
        for px in out.data().lanes(Axis(2)) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }
}
