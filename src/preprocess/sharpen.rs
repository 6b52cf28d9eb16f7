use ndarray::Array3;

use crate::preprocess::border::reflect_101;

/// 3×3 sharpening kernel (identity plus a negated 4-neighbour Laplacian).
pub const SHARPEN_KERNEL: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];

/// Convolves every channel with [`SHARPEN_KERNEL`]; results saturate to the
/// byte range and borders are reflect-101.
pub fn sharpen(image: &Array3<u8>) -> Array3<u8> {
    let (h, w, cn) = image.dim();
    Array3::from_shape_fn((h, w, cn), |(y, x, c)| {
        let mut acc = 0i32;
        for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
            for (kx, &k) in row.iter().enumerate() {
                if k == 0 {
                    continue;
                }
                let sy = reflect_101(y as isize + ky as isize - 1, h);
                let sx = reflect_101(x as isize + kx as isize - 1, w);
                acc += k * i32::from(image[[sy, sx, c]]);
            }
        }
        acc.clamp(0, 255) as u8
    })
}
