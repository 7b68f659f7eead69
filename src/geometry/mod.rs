// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Finding the occulter and field-stop circles.
//!
//! Both the occulter and the field stop show up in a flat (or sky) image as
//! circular intensity edges. [`find_circle`] casts rays from a trial centre,
//! locates the steepest edge of the requested polarity along each ray within
//! a window around the expected radius, and fits a circle to the edge points
//! by algebraic least squares.

mod error;
#[cfg(test)]
mod tests;

pub use error::GeometryError;

use log::{debug, trace, warn};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    beam::{corrected_beams, Beam},
    constants::{
        EDGE_SEARCH_MAX, EDGE_SEARCH_MIN, EDGE_SEARCH_STEP, NUM_EDGE_RAYS, RADIUS_CLAMP_FRACTION,
        TAU,
    },
    math::{frame_centre, sample_bilinear, solve_linear},
    InstrumentConfig,
};

/// The number of times rays are re-cast from the latest fitted centre.
const NUM_SEARCH_ITERATIONS: usize = 3;

/// Edge points with a radial residual beyond this many standard deviations
/// are dropped before the final fit of each iteration.
const CLIP_SIGMA: f64 = 3.0;

/// A circle in image pixel coordinates (0-based, pixel centres on integers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Circle {
    /// A circle of the given radius at the centre of a `ny` × `nx` image.
    pub fn centred(dim: (usize, usize), radius: f64) -> Circle {
        Circle {
            x: frame_centre(dim.1),
            y: frame_centre(dim.0),
            radius,
        }
    }

    /// Is the centre of this circle inside an image of dimensions `dim`
    /// (ny, nx)?
    pub fn centre_within(&self, dim: (usize, usize)) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.x <= (dim.1 as f64 - 1.0)
            && self.y <= (dim.0 as f64 - 1.0)
    }
}

impl std::fmt::Display for Circle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}) r={:.2}", self.x, self.y, self.radius)
    }
}

/// Which way the intensity changes when crossing an edge outwards from the
/// centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolarity {
    /// Dark inside, bright outside (the occulter).
    Rising,

    /// Bright inside, dark outside (the field stop).
    Falling,
}

/// Find the circular edge of the given polarity with a radius near
/// `radius_guess`.
///
/// If the fitted radius deviates from the guess by more than 10%, the fitted
/// centre is kept but the radius is set to the guess, and a warning is
/// logged. An `Err` is only returned if no circle could be fitted at all.
///
/// The result depends only on the inputs; repeated calls give identical
/// circles.
pub fn find_circle(
    image: ArrayView2<f32>,
    radius_guess: f64,
    polarity: EdgePolarity,
) -> Result<Circle, GeometryError> {
    let degenerate = |reason: String| {
        warn!("Circle search near radius {radius_guess} px degenerated: {reason}");
        GeometryError::Degenerate {
            radius_guess,
            reason,
        }
    };
    if radius_guess.is_nan() || radius_guess <= 0.0 {
        return Err(degenerate(format!("invalid radius guess {radius_guess}")));
    }

    let (mut cx, mut cy) = bright_centroid(image);
    trace!("Starting circle search at ({cx:.2}, {cy:.2})");

    let mut fit = None;
    for iteration in 0..NUM_SEARCH_ITERATIONS {
        let points = edge_points(image, cx, cy, radius_guess, polarity);
        if points.len() < 3 {
            return Err(degenerate(format!(
                "only {} edge points found",
                points.len()
            )));
        }
        let circle = fit_circle_clipped(&points)
            .ok_or_else(|| degenerate("the least-squares system is singular".to_string()))?;
        trace!(
            "Iteration {}: {} edge points, circle {circle}",
            iteration + 1,
            points.len()
        );
        cx = circle.x;
        cy = circle.y;
        fit = Some(circle);
    }
    let mut circle = fit.ok_or_else(|| degenerate("no search iterations".to_string()))?;

    if !circle.x.is_finite() || !circle.y.is_finite() || !circle.radius.is_finite() {
        return Err(degenerate("the fitted circle isn't finite".to_string()));
    }
    if !circle.centre_within(image.dim()) {
        return Err(degenerate(format!(
            "fitted centre ({:.2}, {:.2}) is outside the image",
            circle.x, circle.y
        )));
    }

    if (circle.radius - radius_guess).abs() > RADIUS_CLAMP_FRACTION * radius_guess {
        warn!(
            "Fitted radius {:.2} px is more than {}% away from the guess {radius_guess} px; using the guess",
            circle.radius,
            RADIUS_CLAMP_FRACTION * 100.0
        );
        circle.radius = radius_guess;
    }
    debug!("Found circle {circle}");
    Ok(circle)
}

/// The intensity-weighted centroid of the pixels brighter than the mean. The
/// illuminated annulus between the occulter and field stop is roughly
/// concentric with both, so this is a good start for either edge. Falls back
/// to the image centre.
fn bright_centroid(image: ArrayView2<f32>) -> (f64, f64) {
    let (ny, nx) = image.dim();
    let fallback = (frame_centre(nx), frame_centre(ny));
    let finite = image.iter().filter(|v| v.is_finite());
    let (sum, count) = finite.fold((0.0, 0usize), |(s, c), &v| (s + f64::from(v), c + 1));
    if count == 0 {
        return fallback;
    }
    let mean = sum / count as f64;

    let mut weight = 0.0;
    let mut wx = 0.0;
    let mut wy = 0.0;
    for ((row, col), &v) in image.indexed_iter() {
        let v = f64::from(v);
        if v.is_finite() && v > mean {
            let w = v - mean;
            weight += w;
            wx += w * col as f64;
            wy += w * row as f64;
        }
    }
    if weight > 0.0 {
        (wx / weight, wy / weight)
    } else {
        fallback
    }
}

/// Cast rays from (cx, cy) and return the location of the steepest edge of
/// the requested polarity along each one, within the search window around
/// `radius_guess`. Rays without such an edge contribute nothing.
fn edge_points(
    image: ArrayView2<f32>,
    cx: f64,
    cy: f64,
    radius_guess: f64,
    polarity: EdgePolarity,
) -> Vec<[f64; 2]> {
    let r_min = EDGE_SEARCH_MIN * radius_guess;
    let r_max = EDGE_SEARCH_MAX * radius_guess;
    let num_samples = ((r_max - r_min) / EDGE_SEARCH_STEP).floor() as usize + 1;
    let sign = match polarity {
        EdgePolarity::Rising => 1.0,
        EdgePolarity::Falling => -1.0,
    };

    let mut profile = Vec::with_capacity(num_samples);
    let mut points = Vec::with_capacity(NUM_EDGE_RAYS);
    for i_ray in 0..NUM_EDGE_RAYS {
        let theta = TAU * i_ray as f64 / NUM_EDGE_RAYS as f64;
        let (sin, cos) = theta.sin_cos();

        // Sample until the ray leaves the image.
        profile.clear();
        for i in 0..num_samples {
            let r = r_min + i as f64 * EDGE_SEARCH_STEP;
            match sample_bilinear(&image, cx + r * cos, cy + r * sin) {
                Some(v) if v.is_finite() => profile.push(v),
                _ => break,
            }
        }
        if profile.len() < 5 {
            continue;
        }

        // Signed central differences, so the edge we want is always the
        // largest positive value.
        let deriv: Vec<f64> = profile
            .windows(3)
            .map(|w| sign * (w[2] - w[0]) / (2.0 * EDGE_SEARCH_STEP))
            .collect();
        let Some((i_max, &d_max)) = deriv
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };
        if d_max <= 0.0 {
            continue;
        }

        // Sub-sample refinement with a parabola through the peak.
        let mut offset = 0.0;
        if i_max > 0 && i_max + 1 < deriv.len() {
            let (a, b, c) = (deriv[i_max - 1], d_max, deriv[i_max + 1]);
            let denom = a - 2.0 * b + c;
            if denom != 0.0 {
                offset = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
            }
        }
        // deriv[i] is centred on profile[i + 1].
        let r_edge = r_min + (i_max as f64 + 1.0 + offset) * EDGE_SEARCH_STEP;
        points.push([cx + r_edge * cos, cy + r_edge * sin]);
    }
    points
}

/// Algebraic (Kåsa) circle fit: least squares on
/// `x² + y² + D x + E y + F = 0`. Coordinates are taken relative to the mean
/// of the points to keep the normal equations well conditioned.
fn fit_circle(points: &[[f64; 2]]) -> Option<Circle> {
    if points.len() < 3 {
        return None;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n;

    let mut ata = Array2::zeros((3, 3));
    let mut atb = Array1::zeros(3);
    for p in points {
        let x = p[0] - mx;
        let y = p[1] - my;
        let row = [x, y, 1.0];
        let rhs = -(x * x + y * y);
        for i in 0..3 {
            atb[i] += row[i] * rhs;
            for j in 0..3 {
                ata[(i, j)] += row[i] * row[j];
            }
        }
    }
    let sol = solve_linear(ata, atb)?;
    let (d, e, f) = (sol[0], sol[1], sol[2]);
    let x = -d / 2.0;
    let y = -e / 2.0;
    let r2 = x * x + y * y - f;
    if r2.is_nan() || r2 <= 0.0 {
        return None;
    }
    Some(Circle {
        x: x + mx,
        y: y + my,
        radius: r2.sqrt(),
    })
}

/// Fit a circle, drop points whose radial residual is beyond
/// [`CLIP_SIGMA`] standard deviations, and fit again.
fn fit_circle_clipped(points: &[[f64; 2]]) -> Option<Circle> {
    let first = fit_circle(points)?;
    let residuals: Vec<f64> = points
        .iter()
        .map(|p| (p[0] - first.x).hypot(p[1] - first.y) - first.radius)
        .collect();
    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    let sigma = (residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    if sigma == 0.0 {
        return Some(first);
    }

    let kept: Vec<[f64; 2]> = points
        .iter()
        .zip(&residuals)
        .filter(|(_, r)| (*r - mean).abs() <= CLIP_SIGMA * sigma)
        .map(|(p, _)| *p)
        .collect();
    if kept.len() == points.len() {
        return Some(first);
    }
    trace!("Clipped {} of {} edge points", points.len() - kept.len(), points.len());
    fit_circle(&kept)
}

/// The occulter and field-stop circles of one beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamGeometry {
    pub occulter: Circle,
    pub field: Circle,
}

impl BeamGeometry {
    /// The field-stop centre relative to the occulter centre (dx, dy).
    pub fn field_offset(&self) -> (f64, f64) {
        (self.field.x - self.occulter.x, self.field.y - self.occulter.y)
    }
}

/// The geometry of both beams of a raw frame, in distortion-corrected beam
/// sub-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub beam1: BeamGeometry,
    pub beam2: BeamGeometry,
}

impl ImageGeometry {
    pub fn new(beam1: BeamGeometry, beam2: BeamGeometry) -> ImageGeometry {
        ImageGeometry { beam1, beam2 }
    }

    pub fn beam(&self, beam: Beam) -> &BeamGeometry {
        match beam {
            Beam::One => &self.beam1,
            Beam::Two => &self.beam2,
        }
    }

    /// The field-minus-occulter offsets of each beam.
    pub fn field_offsets(&self) -> [(f64, f64); 2] {
        [self.beam1.field_offset(), self.beam2.field_offset()]
    }

    /// The beam 2 occulter centre relative to the beam 1 occulter centre
    /// (dx, dy).
    pub fn beam_offset(&self) -> (f64, f64) {
        (
            self.beam2.occulter.x - self.beam1.occulter.x,
            self.beam2.occulter.y - self.beam1.occulter.y,
        )
    }
}

/// Find the occulter and field-stop circles of both beams of a raw flat
/// frame. Each beam is extracted and distortion corrected first. Any circle
/// that can't be fitted is replaced by the nominal circle (beam centre and
/// configured radius guess).
pub fn find_image_geometry(raw_flat: ArrayView2<f32>, config: &InstrumentConfig) -> ImageGeometry {
    let beams = corrected_beams(raw_flat, config);
    let [beam1, beam2] = Beam::BOTH.map(|beam| {
        let image = beams[beam.index()].view();
        let find = |guess: f64, polarity: EdgePolarity, what: &str| {
            find_circle(image, guess, polarity).unwrap_or_else(|_| {
                let nominal = Circle::centred(image.dim(), guess);
                warn!("Using the nominal {what} circle {nominal} for {beam}");
                nominal
            })
        };
        BeamGeometry {
            occulter: find(config.occulter_radius_guess, EdgePolarity::Rising, "occulter"),
            field: find(config.field_radius_guess, EdgePolarity::Falling, "field stop"),
        }
    });
    debug!("Beam 1 occulter {}, field {}", beam1.occulter, beam1.field);
    debug!("Beam 2 occulter {}, field {}", beam2.occulter, beam2.field);
    ImageGeometry::new(beam1, beam2)
}
