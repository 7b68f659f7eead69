// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

mod interp;
mod powell;
#[cfg(test)]
mod tests;

pub(crate) use interp::{remap, sample_bilinear, sample_cubic};
pub(crate) use powell::{powell, PowellResult};

use ndarray::prelude::*;

/// The coordinate of the centre of an axis with `n` pixels. Pixel centres
/// sit on integers, so this is the middle of the middle pair for even `n`.
#[inline]
pub(crate) fn frame_centre(n: usize) -> f64 {
    (n as f64 - 1.0) / 2.0
}

/// The median of some values. For an even number of values, the mean of the
/// middle two is returned. NaNs are ignored. `None` if there are no values.
pub(crate) fn median(values: &mut Vec<f64>) -> Option<f64> {
    values.retain(|v| !v.is_nan());
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        Some(values[n / 2])
    } else {
        Some(0.5 * (values[n / 2 - 1] + values[n / 2]))
    }
}

/// The median of the image pixels with a positive mask weight. `None` if
/// nothing is unmasked or the shapes differ.
pub(crate) fn masked_median(image: ArrayView2<f32>, mask: ArrayView2<f32>) -> Option<f64> {
    if image.dim() != mask.dim() {
        return None;
    }
    let mut values: Vec<f64> = image
        .iter()
        .zip(mask.iter())
        .filter(|(_, &m)| m > 0.0)
        .map(|(&v, _)| f64::from(v))
        .collect();
    median(&mut values)
}

/// Solve the square linear system `a x = b` by Gaussian elimination with
/// partial pivoting. `None` if the matrix is (numerically) singular or isn't
/// `n`x`n` for `n` right-hand sides.
pub(crate) fn solve_linear(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    if a.dim() != (n, n) {
        return None;
    }

    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[(i, col)].abs().total_cmp(&a[(j, col)].abs()))
            .unwrap_or(col);
        if a[(pivot, col)].abs() <= scale * 1e-13 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap((pivot, k), (col, k));
            }
            b.swap(pivot, col);
        }
        for row in col + 1..n {
            let factor = a[(row, col)] / a[(col, col)];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[(row, k)] -= factor * a[(col, k)];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[(row, k)] * x[k];
        }
        x[row] = sum / a[(row, row)];
    }
    Some(x)
}

/// A polynomial in `(x - centre)`, coefficients in increasing order of power.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Polynomial {
    pub(crate) centre: f64,
    pub(crate) coeffs: Vec<f64>,
}

impl Polynomial {
    pub(crate) fn eval(&self, x: f64) -> f64 {
        let dx = x - self.centre;
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * dx + c)
    }
}

/// Least-squares polynomial fit. The abscissae are centred on their mean;
/// wavelengths around 1075 nm squared lose a lot of precision otherwise.
/// `None` if there are too few points, `x` and `y` differ in length or the
/// system is singular.
pub(crate) fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Option<Polynomial> {
    let num_coeffs = degree + 1;
    if x.len() != y.len() || x.len() < num_coeffs {
        return None;
    }

    let centre = x.iter().sum::<f64>() / x.len() as f64;
    let mut ata = Array2::zeros((num_coeffs, num_coeffs));
    let mut aty = Array1::zeros(num_coeffs);
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - centre;
        let powers: Vec<f64> = (0..num_coeffs).map(|p| dx.powi(p as i32)).collect();
        for i in 0..num_coeffs {
            aty[i] += powers[i] * yi;
            for j in 0..num_coeffs {
                ata[(i, j)] += powers[i] * powers[j];
            }
        }
    }
    let coeffs = solve_linear(ata, aty)?;
    Some(Polynomial {
        centre,
        coeffs: coeffs.to_vec(),
    })
}

/// Linearly interpolate `(x, y)` (with `x` ascending) at `x_new`. Points
/// outside the range of `x` take the nearest end value. `None` if there are
/// no points or `x` and `y` differ in length.
pub(crate) fn interpolate(x: &[f64], y: &[f64], x_new: f64) -> Option<f64> {
    if x.is_empty() || x.len() != y.len() {
        return None;
    }
    let last = x.len() - 1;
    if x_new <= x[0] {
        return Some(y[0]);
    }
    if x_new >= x[last] {
        return Some(y[last]);
    }
    let i = x.partition_point(|&v| v <= x_new).saturating_sub(1).min(last - 1);
    let span = x[i + 1] - x[i];
    if span == 0.0 {
        return Some(y[i]);
    }
    let t = (x_new - x[i]) / span;
    Some(y[i] + t * (y[i + 1] - y[i]))
}

/// Given values on a uniform grid with spacing `step`, get the values of the
/// same function shifted by `shift` (in the same units as `step`), i.e.
/// `out(x) = in(x - shift)`. Samples beyond either end take the end value.
pub(crate) fn shift_uniform(values: &[f64], step: f64, shift: f64) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return vec![];
    }
    let pixel_shift = shift / step;
    (0..n)
        .map(|i| {
            let src = i as f64 - pixel_shift;
            if src <= 0.0 {
                values[0]
            } else if src >= (n - 1) as f64 {
                values[n - 1]
            } else {
                let i0 = src.floor() as usize;
                let t = src - i0 as f64;
                values[i0] + t * (values[i0 + 1] - values[i0])
            }
        })
        .collect()
}
