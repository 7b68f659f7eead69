// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;

use super::*;

/// A smooth step going from 0 to 1 as `r` passes `edge`.
fn step(r: f64, edge: f64) -> f64 {
    0.5 * (1.0 + ((r - edge) / 1.5).tanh())
}

/// A flat-like image: bright between the occulter and the field stop, both
/// centred on (x, y).
fn annulus(dim: (usize, usize), x: f64, y: f64, r_occ: f64, r_fld: f64) -> Array2<f32> {
    Array2::from_shape_fn(dim, |(row, col)| {
        let r = (col as f64 - x).hypot(row as f64 - y);
        (step(r, r_occ) * (1.0 - step(r, r_fld))) as f32
    })
}

#[test]
fn test_find_occulter_and_field() {
    let image = annulus((128, 128), 63.4, 61.8, 30.0, 45.0);

    let occulter = find_circle(image.view(), 31.0, EdgePolarity::Rising).unwrap();
    assert_abs_diff_eq!(occulter.x, 63.4, epsilon = 0.1);
    assert_abs_diff_eq!(occulter.y, 61.8, epsilon = 0.1);
    assert_abs_diff_eq!(occulter.radius, 30.0, epsilon = 0.2);

    let field = find_circle(image.view(), 44.0, EdgePolarity::Falling).unwrap();
    assert_abs_diff_eq!(field.x, 63.4, epsilon = 0.1);
    assert_abs_diff_eq!(field.y, 61.8, epsilon = 0.1);
    assert_abs_diff_eq!(field.radius, 45.0, epsilon = 0.2);
}

#[test]
fn test_find_circle_is_deterministic() {
    let image = annulus((100, 110), 52.7, 49.1, 25.0, 40.0);
    let a = find_circle(image.view(), 24.0, EdgePolarity::Rising).unwrap();
    let b = find_circle(image.view(), 24.0, EdgePolarity::Rising).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_radius_is_clamped_to_guess() {
    // The true occulter radius is more than 10% bigger than the guess. The
    // field stop is beyond the search window.
    let image = annulus((180, 180), 90.2, 88.6, 46.0, 75.0);
    let circle = find_circle(image.view(), 40.0, EdgePolarity::Rising).unwrap();
    assert_eq!(circle.radius, 40.0);
    assert_abs_diff_eq!(circle.x, 90.2, epsilon = 0.1);
    assert_abs_diff_eq!(circle.y, 88.6, epsilon = 0.1);
}

#[test]
fn test_radius_is_clamped_when_edge_is_outside_search_window() {
    // At 1.5 and 2 times the guess, the true edge is beyond the search
    // window, so the steepest rise is found at the end of every ray.
    for r_occ in [30.0, 40.0] {
        let image = annulus((200, 200), 100.3, 98.7, r_occ, 80.0);
        let circle = find_circle(image.view(), 20.0, EdgePolarity::Rising).unwrap();
        assert_eq!(circle.radius, 20.0);
        assert_abs_diff_eq!(circle.x, 100.3, epsilon = 0.05);
        assert_abs_diff_eq!(circle.y, 98.7, epsilon = 0.05);
    }
}

#[test]
fn test_small_deviation_is_not_clamped() {
    let image = annulus((128, 128), 64.0, 64.0, 30.0, 50.0);
    let circle = find_circle(image.view(), 32.0, EdgePolarity::Rising).unwrap();
    assert!(circle.radius != 32.0);
    assert_abs_diff_eq!(circle.radius, 30.0, epsilon = 0.2);
}

#[test]
fn test_flat_image_is_degenerate() {
    let image = Array2::from_elem((64, 64), 1.0f32);
    let result = find_circle(image.view(), 20.0, EdgePolarity::Rising);
    assert!(matches!(result, Err(GeometryError::Degenerate { .. })));

    let result = find_circle(image.view(), -1.0, EdgePolarity::Falling);
    assert!(matches!(result, Err(GeometryError::Degenerate { .. })));
}

#[test]
fn test_fit_circle_exact_points() {
    let points: Vec<[f64; 2]> = (0..12)
        .map(|i| {
            let t = TAU * i as f64 / 12.0;
            [10.0 + 5.0 * t.cos(), -3.0 + 5.0 * t.sin()]
        })
        .collect();
    let circle = fit_circle(&points).unwrap();
    assert_abs_diff_eq!(circle.x, 10.0, epsilon = 1e-10);
    assert_abs_diff_eq!(circle.y, -3.0, epsilon = 1e-10);
    assert_abs_diff_eq!(circle.radius, 5.0, epsilon = 1e-10);

    // Collinear points have no circle.
    assert!(fit_circle(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).is_none());
}

#[test]
fn test_clipping_ignores_outliers() {
    let mut points: Vec<[f64; 2]> = (0..36)
        .map(|i| {
            let t = TAU * i as f64 / 36.0;
            [20.0 * t.cos(), 20.0 * t.sin()]
        })
        .collect();
    points.push([35.0, 0.0]);
    let circle = fit_circle_clipped(&points).unwrap();
    assert_abs_diff_eq!(circle.x, 0.0, epsilon = 1e-8);
    assert_abs_diff_eq!(circle.radius, 20.0, epsilon = 1e-8);
}

#[test]
fn test_image_geometry_offsets() {
    let geometry = ImageGeometry::new(
        BeamGeometry {
            occulter: Circle {
                x: 310.0,
                y: 305.0,
                radius: 226.0,
            },
            field: Circle {
                x: 312.5,
                y: 301.0,
                radius: 297.0,
            },
        },
        BeamGeometry {
            occulter: Circle {
                x: 308.0,
                y: 309.0,
                radius: 226.0,
            },
            field: Circle {
                x: 308.0,
                y: 309.0,
                radius: 297.0,
            },
        },
    );
    assert_eq!(geometry.field_offsets(), [(2.5, -4.0), (0.0, 0.0)]);
    assert_eq!(geometry.beam_offset(), (-2.0, 4.0));
    assert_eq!(geometry.beam(Beam::Two).occulter.x, 308.0);
}

#[test]
fn test_find_image_geometry_falls_back_to_nominal() {
    let config = InstrumentConfig {
        raw_size: 64,
        beam_size: 32,
        beam_origins: [[0, 32], [32, 0]],
        occulter_radius_guess: 8.0,
        field_radius_guess: 12.0,
        ..Default::default()
    };
    let raw = Array2::zeros((64, 64));
    let geometry = find_image_geometry(raw.view(), &config);
    assert_eq!(geometry.beam1.occulter, Circle::centred((32, 32), 8.0));
    assert_eq!(geometry.beam2.field, Circle::centred((32, 32), 12.0));
}

#[test]
fn test_find_image_geometry_both_beams() {
    let config = InstrumentConfig {
        raw_size: 256,
        beam_size: 128,
        beam_origins: [[0, 128], [128, 0]],
        distortion: [[[1.0, 0.0], [0.0, 1.0]]; 2],
        occulter_radius_guess: 30.0,
        field_radius_guess: 46.0,
        ..Default::default()
    };
    let mut raw = Array2::zeros((256, 256));
    raw.slice_mut(s![128.., ..128])
        .assign(&annulus((128, 128), 62.0, 65.5, 30.0, 46.0));
    raw.slice_mut(s![..128, 128..])
        .assign(&annulus((128, 128), 66.3, 61.0, 30.0, 46.0));

    let geometry = find_image_geometry(raw.view(), &config);
    assert_abs_diff_eq!(geometry.beam1.occulter.x, 62.0, epsilon = 0.1);
    assert_abs_diff_eq!(geometry.beam1.occulter.y, 65.5, epsilon = 0.1);
    assert_abs_diff_eq!(geometry.beam2.field.x, 66.3, epsilon = 0.1);
    let (dx, dy) = geometry.beam_offset();
    assert_abs_diff_eq!(dx, 4.3, epsilon = 0.2);
    assert_abs_diff_eq!(dy, -4.5, epsilon = 0.2);
}
