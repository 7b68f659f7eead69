// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;

use super::*;

#[test]
fn test_median() {
    assert_eq!(median(&mut vec![]), None);
    assert_eq!(median(&mut vec![3.0, 1.0, 2.0]), Some(2.0));
    assert_eq!(median(&mut vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
    assert_eq!(median(&mut vec![f64::NAN, 5.0, 1.0]), Some(3.0));
}

#[test]
fn test_masked_median() {
    let image = Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f32);
    let mut mask = Array2::zeros((4, 4));
    mask[(0, 1)] = 1.0;
    mask[(2, 2)] = 0.5;
    mask[(3, 3)] = 1.0;
    assert_abs_diff_eq!(masked_median(image.view(), mask.view()).unwrap(), 10.0);
    assert_eq!(
        masked_median(image.view(), Array2::zeros((4, 4)).view()),
        None
    );
}

#[test]
fn test_solve_linear() {
    let a = array![[2.0, 1.0, -1.0], [-3.0, -1.0, 2.0], [-2.0, 1.0, 2.0]];
    let b = array![8.0, -11.0, -3.0];
    let x = solve_linear(a, b).unwrap();
    assert_abs_diff_eq!(x, array![2.0, 3.0, -1.0], epsilon = 1e-12);

    let singular = array![[1.0, 2.0], [2.0, 4.0]];
    assert!(solve_linear(singular, array![1.0, 2.0]).is_none());
}

#[test]
fn test_polyfit_recovers_quadratic() {
    let x: Vec<f64> = (0..11).map(|i| 1074.4 + 0.06 * i as f64).collect();
    let truth = |x: f64| 1.5 - 0.3 * (x - 1074.7) + 2.0 * (x - 1074.7).powi(2);
    let y: Vec<f64> = x.iter().map(|&x| truth(x)).collect();
    let poly = polyfit(&x, &y, 2).unwrap();
    for &xi in &x {
        assert_abs_diff_eq!(poly.eval(xi), truth(xi), epsilon = 1e-10);
    }
    assert_abs_diff_eq!(poly.eval(1075.5), truth(1075.5), epsilon = 1e-9);

    assert!(polyfit(&x[..2], &y[..2], 2).is_none());
}

#[test]
fn test_interpolate() {
    let x = [0.0, 1.0, 3.0];
    let y = [0.0, 10.0, 30.0];
    assert_abs_diff_eq!(interpolate(&x, &y, 0.5).unwrap(), 5.0);
    assert_abs_diff_eq!(interpolate(&x, &y, 2.0).unwrap(), 20.0);
    assert_abs_diff_eq!(interpolate(&x, &y, -1.0).unwrap(), 0.0);
    assert_abs_diff_eq!(interpolate(&x, &y, 4.0).unwrap(), 30.0);
    assert_abs_diff_eq!(interpolate(&x, &y, 3.0).unwrap(), 30.0);

    assert_eq!(interpolate(&[], &[], 1.0), None);
    assert_eq!(interpolate(&x, &y[..2], 1.0), None);
}

#[test]
fn test_mismatched_shapes_give_none() {
    let image = Array2::<f32>::ones((4, 4));
    assert_eq!(masked_median(image.view(), Array2::ones((3, 4)).view()), None);
    assert!(solve_linear(Array2::eye(3), array![1.0, 2.0]).is_none());
    assert!(polyfit(&[0.0, 1.0, 2.0, 3.0], &[1.0, 2.0], 1).is_none());
}

#[test]
fn test_samplers_on_empty_image() {
    let image = Array2::<f32>::zeros((0, 0));
    assert_eq!(sample_cubic(&image.view(), 0.0, 0.0), 0.0);
    assert_eq!(sample_bilinear(&image.view(), 0.0, 0.0), None);
}

#[test]
fn test_shift_uniform() {
    let values = [0.0, 1.0, 2.0, 3.0, 4.0];
    // Shifting right by half a step.
    let shifted = shift_uniform(&values, 0.1, 0.05);
    assert_abs_diff_eq!(shifted.as_slice(), [0.0, 0.5, 1.5, 2.5, 3.5].as_slice());
    let shifted = shift_uniform(&values, 0.1, -0.2);
    assert_abs_diff_eq!(shifted.as_slice(), [2.0, 3.0, 4.0, 4.0, 4.0].as_slice());
}

#[test]
fn test_cubic_reproduces_linear_ramps() {
    let image = Array2::from_shape_fn((8, 8), |(r, c)| (2.0 * c as f64 + 0.5 * r as f64) as f32);
    let view = image.view();
    assert_abs_diff_eq!(sample_cubic(&view, 3.25, 4.5), 2.0 * 3.25 + 0.5 * 4.5, epsilon = 1e-5);
    assert_abs_diff_eq!(sample_cubic(&view, 5.0, 2.0), 12.0, epsilon = 1e-5);
    // Outside is missing.
    assert_eq!(sample_cubic(&view, -0.1, 2.0), 0.0);
    assert_eq!(sample_cubic(&view, 2.0, 7.01), 0.0);
}

#[test]
fn test_bilinear() {
    let image = array![[0.0f32, 1.0], [2.0, 3.0]];
    let view = image.view();
    assert_abs_diff_eq!(sample_bilinear(&view, 0.5, 0.5).unwrap(), 1.5);
    assert_abs_diff_eq!(sample_bilinear(&view, 1.0, 1.0).unwrap(), 3.0);
    assert!(sample_bilinear(&view, 1.5, 0.0).is_none());
}

#[test]
fn test_remap_identity_and_shift() {
    let image = Array2::from_shape_fn((16, 16), |(r, c)| {
        (-((c as f64 - 7.5).powi(2) + (r as f64 - 7.5).powi(2)) / 20.0).exp() as f32
    });
    let same = remap(image.view(), image.dim(), |x, y| (x, y));
    assert_abs_diff_eq!(same, image, epsilon = 1e-6);

    // Integer shifts move pixels exactly; uncovered pixels are missing.
    let shifted = remap(image.view(), image.dim(), |x, y| (x - 2.0, y));
    assert_abs_diff_eq!(shifted[(7, 9)], image[(7, 7)], epsilon = 1e-6);
    assert_eq!(shifted[(7, 0)], 0.0);
}

#[test]
fn test_powell_rosenbrock() {
    let rosenbrock = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2);
    let result = powell(rosenbrock, &[-1.2, 1.0], &[0.1, 0.1], 1e-12);
    assert_abs_diff_eq!(result.x[0], 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(result.x[1], 1.0, epsilon = 2e-3);
    assert!(result.f < 1e-6);
}

#[test]
fn test_powell_is_deterministic() {
    let bowl = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2) + x[0] * x[1];
    let a = powell(bowl, &[0.0, 0.0], &[1.0, 1.0], 1e-10);
    let b = powell(bowl, &[0.0, 0.0], &[1.0, 1.0], 1e-10);
    assert_eq!(a, b);
    // Analytic minimum of the bowl.
    assert_abs_diff_eq!(a.x[0], 28.0 / 7.0, epsilon = 1e-5);
    assert_abs_diff_eq!(a.x[1], -2.0, epsilon = 1e-5);
}
