// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. Instrument geometry that may
change between deployments lives in [`crate::InstrumentConfig`] instead;
the values here are either physical or fix the numerical behaviour of the
pipeline and must not be changed without re-validating Level 1 products.
 */

pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// The `a` parameter of the cubic convolution kernel used for every image
/// remap (distortion, rotation, translation). -0.5 is IDL's `cubic=-0.5`.
pub const CUBIC_KERNEL: f64 = -0.5;

/// The value given to remapped pixels that fall outside of the source image.
pub const MISSING_VALUE: f32 = 0.0;

/// Fractional deviation of a fitted circle radius from its guess beyond which
/// the radius is clamped to the guess.
pub const RADIUS_CLAMP_FRACTION: f64 = 0.1;

/// The number of rays cast from a trial centre when searching for a circular
/// edge.
pub const NUM_EDGE_RAYS: usize = 360;

/// The radial search window, as fractions of the radius guess.
pub const EDGE_SEARCH_MIN: f64 = 0.75;
pub const EDGE_SEARCH_MAX: f64 = 1.25;

/// Radial sampling step along each ray \[pixels\].
pub const EDGE_SEARCH_STEP: f64 = 0.5;

/// The number of exposures in a complete flat-field wavelength scan (11
/// wavelengths for each of two beams).
pub const FLAT_SEQUENCE_LEN: usize = 22;

/// The number of wavelengths in a flat-field scan, per beam.
pub const NUM_SCAN_WAVELENGTHS: usize = 11;

/// A flat sequence is only attributed to a line if its mean wavelength is
/// within this distance of the line centre \[nm\].
pub const LINE_MATCH_TOLERANCE: f64 = 2.0;

/// Fractional convergence tolerance of the Powell minimiser.
pub const POWELL_FTOL: f64 = 1e-8;

/// Chi-square above which a wavelength fit isn't trusted to correct flats.
pub const DEFAULT_CHISQ_THRESHOLD: f64 = 0.01;

/// Seconds in an hour.
pub const HOUR_SECONDS: f64 = 3600.0;

/// The apparent solar semi-diameter at a distance of 1 AU \[arcseconds\].
pub const SOLAR_SEMI_DIAMETER_1AU: f64 = 959.63;
