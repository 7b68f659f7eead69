// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image interpolation.
//!
//! Images are indexed `[y, x]`; all coordinates here are (x, y) with pixel
//! centres on integers.

use ndarray::{prelude::*, Zip};

use crate::constants::{CUBIC_KERNEL, MISSING_VALUE};

/// The cubic convolution kernel (Keys 1981) with parameter `a`.
#[inline]
fn cubic_weight(t: f64, a: f64) -> f64 {
    let t = t.abs();
    if t <= 1.0 {
        ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((a * t - 5.0 * a) * t + 8.0 * a) * t - 4.0 * a
    } else {
        0.0
    }
}

#[inline]
fn inside(image: &ArrayView2<f32>, x: f64, y: f64) -> bool {
    let (ny, nx) = image.dim();
    x >= 0.0 && y >= 0.0 && x <= nx as f64 - 1.0 && y <= ny as f64 - 1.0
}

/// Sample an image at (x, y) with cubic convolution. Coordinates outside the
/// image give [`MISSING_VALUE`]; neighbours beyond the edge are clamped to the
/// edge.
pub(crate) fn sample_cubic(image: &ArrayView2<f32>, x: f64, y: f64) -> f32 {
    if !x.is_finite() || !y.is_finite() || !inside(image, x, y) {
        return MISSING_VALUE;
    }
    let (ny, nx) = image.dim();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as isize, y0 as isize);

    let mut wx = [0.0; 4];
    let mut wy = [0.0; 4];
    for k in 0..4 {
        wx[k] = cubic_weight(fx - (k as f64 - 1.0), CUBIC_KERNEL);
        wy[k] = cubic_weight(fy - (k as f64 - 1.0), CUBIC_KERNEL);
    }

    let mut sum = 0.0;
    for (j, wy) in wy.iter().enumerate() {
        let row = (y0 + j as isize - 1).clamp(0, ny as isize - 1) as usize;
        let mut row_sum = 0.0;
        for (i, wx) in wx.iter().enumerate() {
            let col = (x0 + i as isize - 1).clamp(0, nx as isize - 1) as usize;
            row_sum += wx * f64::from(image[(row, col)]);
        }
        sum += wy * row_sum;
    }
    sum as f32
}

/// Sample an image at (x, y) with bilinear interpolation. `None` outside the
/// image.
pub(crate) fn sample_bilinear(image: &ArrayView2<f32>, x: f64, y: f64) -> Option<f64> {
    if !x.is_finite() || !y.is_finite() || !inside(image, x, y) {
        return None;
    }
    let (ny, nx) = image.dim();
    let x0 = (x.floor() as usize).min(nx.saturating_sub(2));
    let y0 = (y.floor() as usize).min(ny.saturating_sub(2));
    let x1 = (x0 + 1).min(nx - 1);
    let y1 = (y0 + 1).min(ny - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let v00 = f64::from(image[(y0, x0)]);
    let v10 = f64::from(image[(y0, x1)]);
    let v01 = f64::from(image[(y1, x0)]);
    let v11 = f64::from(image[(y1, x1)]);
    Some(
        v00 * (1.0 - fx) * (1.0 - fy)
            + v10 * fx * (1.0 - fy)
            + v01 * (1.0 - fx) * fy
            + v11 * fx * fy,
    )
}

/// Make a new image of dimensions `dim` (ny, nx) where each output pixel
/// (x, y) takes the cubic-convolution value of `image` at `source(x, y)`.
pub(crate) fn remap<F>(image: ArrayView2<f32>, dim: (usize, usize), source: F) -> Array2<f32>
where
    F: Fn(f64, f64) -> (f64, f64) + Sync,
{
    let mut out = Array2::from_elem(dim, MISSING_VALUE);
    Zip::indexed(&mut out).par_for_each(|(row, col), v| {
        let (sx, sy) = source(col as f64, row as f64);
        *v = sample_cubic(&image, sx, sy);
    });
    out
}
