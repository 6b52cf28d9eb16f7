//! # Colour-aware non-local-means denoising
//!
//! The image is moved to 8-bit CIE L\*a\*b\* computed from linear
//! (not gamma-encoded) channel values; lightness is denoised with the
//! luminance strength and the (a, b) pair jointly with the chrominance
//! strength, then the result is converted back. Patch distances for every
//! search offset are evaluated with an integral image so the cost does not
//! grow with the patch size.

use ndarray::{Array3, Axis};
use tracing::debug;

use crate::preprocess::border::reflect_101;

/// Parameters of the non-local-means filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlMeansParams {
    /// Filter strength for the lightness channel.
    pub luminance_strength: f32,
    /// Filter strength for the two chroma channels.
    pub chrominance_strength: f32,
    /// Side of the square patch compared between pixels (odd).
    pub patch_size: usize,
    /// Side of the square search window around each pixel (odd).
    pub search_window: usize,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        NlMeansParams {
            luminance_strength: 10.0,
            chrominance_strength: 10.0,
            patch_size: 7,
            search_window: 21,
        }
    }
}

/// Weights below this are treated as zero.
const WEIGHT_THRESHOLD: f32 = 0.001;

/// Denoises a three-channel 8-bit image.
///
/// Channels are interpreted in blue-green-red order for the Lab conversion,
/// which is how the training pipeline handed its RGB arrays to the filter.
/// Both conversions use the same order, so pixels come back in their
/// original channel positions.
pub fn denoise_colored(image: &Array3<u8>, params: &NlMeansParams) -> Array3<u8> {
    let (h, w, _) = image.dim();
    let mut lightness = Array3::<u8>::zeros((h, w, 1));
    let mut chroma = Array3::<u8>::zeros((h, w, 2));
    for y in 0..h {
        for x in 0..w {
            let [l, a, b] = bgr_to_lab(image[[y, x, 0]], image[[y, x, 1]], image[[y, x, 2]]);
            lightness[[y, x, 0]] = l;
            chroma[[y, x, 0]] = a;
            chroma[[y, x, 1]] = b;
        }
    }

    let lightness = nl_means(&lightness, params.luminance_strength, params.patch_size, params.search_window);
    let chroma = nl_means(&chroma, params.chrominance_strength, params.patch_size, params.search_window);
    debug!(?params, "non-local-means done");

    let mut out = Array3::<u8>::zeros((h, w, 3));
    for y in 0..h {
        for x in 0..w {
            let [b, g, r] = lab_to_bgr(lightness[[y, x, 0]], chroma[[y, x, 0]], chroma[[y, x, 1]]);
            out[[y, x, 0]] = b;
            out[[y, x, 1]] = g;
            out[[y, x, 2]] = r;
        }
    }
    out
}

/// Non-local-means over an image with any number of channels; channels are
/// compared jointly.
///
/// For every pixel, each candidate in the `search_window` square contributes
/// with weight `exp(-d / (h² · channels))`, where `d` is the mean over the
/// patch of the summed squared channel differences. Borders are reflect-101.
pub fn nl_means(src: &Array3<u8>, strength: f32, patch_size: usize, search_window: usize) -> Array3<u8> {
    let (height, width, cn) = src.dim();
    if height == 0 || width == 0 {
        return src.clone();
    }
    let patch_half = patch_size / 2;
    let search_half = search_window / 2;
    let border = patch_half + search_half;

    // Padded copy, flat HWC.
    let pw = width + 2 * border;
    let ph = height + 2 * border;
    let mut padded = vec![0i32; ph * pw * cn];
    for py in 0..ph {
        let sy = reflect_101(py as isize - border as isize, height);
        for px in 0..pw {
            let sx = reflect_101(px as isize - border as isize, width);
            for c in 0..cn {
                padded[(py * pw + px) * cn + c] = i32::from(src[[sy, sx, c]]);
            }
        }
    }

    // Region whose squared differences feed the patch sums: every pixel
    // extended by half a patch on each side.
    let rw = width + 2 * patch_half;
    let rh = height + 2 * patch_half;
    let mut integral = vec![0i64; (rh + 1) * (rw + 1)];

    let patch_area = (patch_size * patch_size) as f32;
    let denom = strength * strength * cn as f32;
    let mut weight_sum = vec![0f32; height * width];
    let mut value_sum = vec![0f32; height * width * cn];

    let search = search_half as isize;
    for dy in -search..=search {
        for dx in -search..=search {
            // Integral image of squared differences between the region and
            // the region shifted by (dy, dx).
            for ry in 0..rh {
                let py = ry + search_half;
                let qy = (py as isize + dy) as usize;
                let mut row_acc = 0i64;
                for rx in 0..rw {
                    let px = rx + search_half;
                    let qx = (px as isize + dx) as usize;
                    let p = (py * pw + px) * cn;
                    let q = (qy * pw + qx) * cn;
                    let mut d = 0i64;
                    for c in 0..cn {
                        let diff = i64::from(padded[p + c] - padded[q + c]);
                        d += diff * diff;
                    }
                    row_acc += d;
                    integral[(ry + 1) * (rw + 1) + rx + 1] = integral[ry * (rw + 1) + rx + 1] + row_acc;
                }
            }

            for y in 0..height {
                for x in 0..width {
                    let top = y * (rw + 1);
                    let bottom = (y + patch_size) * (rw + 1);
                    let ssd = integral[bottom + x + patch_size] - integral[top + x + patch_size]
                        - integral[bottom + x]
                        + integral[top + x];
                    let dist = ssd as f32 / patch_area;
                    let weight = (-dist / denom).exp();
                    if weight < WEIGHT_THRESHOLD {
                        continue;
                    }
                    let idx = y * width + x;
                    weight_sum[idx] += weight;
                    let q = (((y + border) as isize + dy) as usize * pw + ((x + border) as isize + dx) as usize) * cn;
                    for c in 0..cn {
                        value_sum[idx * cn + c] += weight * padded[q + c] as f32;
                    }
                }
            }
        }
    }

    // The zero offset always contributes weight 1, so `weight_sum >= 1`.
    Array3::from_shape_fn((height, width, cn), |(y, x, c)| {
        let idx = y * width + x;
        let v = value_sum[idx * cn + c] / weight_sum[idx];
        (v + 0.5).floor().clamp(0.0, 255.0) as u8
    })
}

// ---------------------------------------------------------------------------
// 8-bit Lab conversion (D65, linear channels)
// ---------------------------------------------------------------------------

const XN: f32 = 0.950456;
const ZN: f32 = 1.088754;
const LAB_THRESHOLD: f32 = 0.008856;

fn lab_f(t: f32) -> f32 {
    if t > LAB_THRESHOLD { t.cbrt() } else { 7.787 * t + 16.0 / 116.0 }
}

fn to_byte(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Converts one pixel given as (blue, green, red) to 8-bit Lab:
/// `L·255/100`, `a + 128`, `b + 128`. Channel bytes are taken as linear
/// intensities; no sRGB transfer curve is applied.
pub fn bgr_to_lab(b: u8, g: u8, r: u8) -> [u8; 3] {
    let r = f32::from(r) / 255.0;
    let g = f32::from(g) / 255.0;
    let b = f32::from(b) / 255.0;

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / XN;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / ZN;

    let fy = lab_f(y);
    let l = if y > LAB_THRESHOLD { 116.0 * fy - 16.0 } else { 903.3 * y };
    let a = 500.0 * (lab_f(x) - fy);
    let bb = 200.0 * (fy - lab_f(z));

    [to_byte(l * 255.0 / 100.0), to_byte(a + 128.0), to_byte(bb + 128.0)]
}

/// Inverse of [`bgr_to_lab`]; returns (blue, green, red).
pub fn lab_to_bgr(l: u8, a: u8, b: u8) -> [u8; 3] {
    let l = f32::from(l) * 100.0 / 255.0;
    let a = f32::from(a) - 128.0;
    let b = f32::from(b) - 128.0;

    let (y, fy) = if l <= 8.0 {
        let y = l / 903.3;
        (y, 7.787 * y + 16.0 / 116.0)
    } else {
        let fy = (l + 16.0) / 116.0;
        (fy * fy * fy, fy)
    };
    let inv_f = |f: f32| {
        let cube = f * f * f;
        if cube > LAB_THRESHOLD { cube } else { (f - 16.0 / 116.0) / 7.787 }
    };
    let x = inv_f(fy + a / 500.0) * XN;
    let z = inv_f(fy - b / 200.0) * ZN;

    let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let g = -0.969256 * x + 1.875991 * y + 0.041556 * z;
    let bl = 0.055648 * x - 0.204043 * y + 1.057311 * z;

    let channel = |v: f32| to_byte(v.clamp(0.0, 1.0) * 255.0);
    [channel(bl), channel(g), channel(r)]
}

/// Repeats a single-channel image into three channels; other inputs are
/// returned as-is.
pub fn ensure_three_channels(image: Array3<u8>) -> Array3<u8> {
    if image.dim().2 != 1 {
        return image;
    }
    let gray = image.index_axis(Axis(2), 0).to_owned();
    let (h, w) = gray.dim();
    Array3::from_shape_fn((h, w, 3), |(y, x, _)| gray[[y, x]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_round_trip_is_close_for_grays() {
        for v in [0u8, 1, 17, 64, 128, 200, 254, 255] {
            let [l, a, b] = bgr_to_lab(v, v, v);
            assert!((i32::from(a) - 128).abs() <= 1, "a for {v}");
            assert!((i32::from(b) - 128).abs() <= 1, "b for {v}");
            let back = lab_to_bgr(l, a, b);
            for c in back {
                assert!((i32::from(c) - i32::from(v)).abs() <= 2, "{v} -> {back:?}");
            }
        }
    }

    #[test]
    fn lab_lightness_uses_linear_channels() {
        // L = 116 * cbrt(128/255) - 16 = 76.19, stored as 194.
        assert_eq!(bgr_to_lab(128, 128, 128), [194, 128, 128]);
        assert_eq!(bgr_to_lab(45, 45, 45)[0], 125);
        assert_eq!(lab_to_bgr(194, 128, 128), [128, 128, 128]);
    }

    #[test]
    fn lab_extremes() {
        assert_eq!(bgr_to_lab(0, 0, 0), [0, 128, 128]);
        assert_eq!(bgr_to_lab(255, 255, 255)[0], 255);
    }

    #[test]
    fn flat_image_stays_flat() {
        let src = Array3::from_elem((20, 24, 3), 140u8);
        let out = denoise_colored(&src, &NlMeansParams::default());
        let first = out[[0, 0, 0]];
        assert!(out.iter().all(|&v| (i32::from(v) - i32::from(first)).abs() <= 1));
        assert!((i32::from(first) - 140).abs() <= 2);
    }

    #[test]
    fn nl_means_pulls_a_fine_checkerboard_together() {
        let src = Array3::from_shape_fn((24, 24, 1), |(y, x, _)| if (x + y) % 2 == 0 { 120u8 } else { 130 });
        let out = nl_means(&src, 10.0, 7, 21);
        let max = *out.iter().max().unwrap();
        let min = *out.iter().min().unwrap();
        assert!(max - min < 10, "spread {min}..{max}");
        assert!(min >= 120 && max <= 130);
    }

    #[test]
    fn nl_means_ignores_very_different_patches() {
        // Two halves 100 apart: cross-half weights fall below the threshold,
        // so pixels far from the seam keep their value exactly.
        let src = Array3::from_shape_fn((30, 30, 1), |(_, x, _)| if x < 15 { 50u8 } else { 150 });
        let out = nl_means(&src, 10.0, 7, 21);
        assert_eq!(out[[10, 0, 0]], 50);
        assert_eq!(out[[10, 29, 0]], 150);
    }

    #[test]
    fn single_channel_is_promoted() {
        let out = ensure_three_channels(Array3::from_elem((2, 2, 1), 9u8));
        assert_eq!(out.dim(), (2, 2, 3));
        assert!(out.iter().all(|&v| v == 9));
    }
}
