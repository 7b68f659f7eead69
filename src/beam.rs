// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The two beams of a raw CoMP frame.
//!
//! A raw frame holds two images of the corona side by side, one in each
//! polarisation-analysed beam. Each beam's sub-image is cut out of the raw
//! frame and has its own fixed optical distortion removed before anything
//! else is done with it.

use ndarray::{prelude::*, s};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::{
    config::InstrumentConfig,
    math::{frame_centre, remap},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum Beam {
    #[strum(serialize = "beam 1")]
    One,
    #[strum(serialize = "beam 2")]
    Two,
}

impl Beam {
    /// Both beams, in order.
    pub const BOTH: [Beam; 2] = [Beam::One, Beam::Two];

    /// The 0-based index of this beam.
    pub fn index(self) -> usize {
        match self {
            Beam::One => 0,
            Beam::Two => 1,
        }
    }

    /// The other beam.
    pub fn complement(self) -> Beam {
        match self {
            Beam::One => Beam::Two,
            Beam::Two => Beam::One,
        }
    }
}

/// Cut a beam's sub-image out of a raw frame.
///
/// # Panics
///
/// Panics if the raw frame is smaller than the configured raw frame size.
pub fn extract_beam(raw: ArrayView2<f32>, beam: Beam, config: &InstrumentConfig) -> Array2<f32> {
    let [x0, y0] = config.beam_origins[beam.index()];
    let n = config.beam_size;
    raw.slice(s![y0..y0 + n, x0..x0 + n]).to_owned()
}

/// Remove a beam's optical distortion. Each output pixel, relative to the
/// sub-image centre, is multiplied by the beam's distortion matrix to find
/// where it lies in the raw sub-image, which is then sampled with cubic
/// convolution.
pub fn correct_distortion(
    sub_image: ArrayView2<f32>,
    beam: Beam,
    config: &InstrumentConfig,
) -> Array2<f32> {
    let m = config.distortion[beam.index()];
    let (ny, nx) = sub_image.dim();
    let cx = frame_centre(nx);
    let cy = frame_centre(ny);
    remap(sub_image, sub_image.dim(), |x, y| {
        let dx = x - cx;
        let dy = y - cy;
        (
            cx + m[0][0] * dx + m[0][1] * dy,
            cy + m[1][0] * dx + m[1][1] * dy,
        )
    })
}

/// Extract both beams from a raw frame and remove their distortion.
pub fn corrected_beams(raw: ArrayView2<f32>, config: &InstrumentConfig) -> [Array2<f32>; 2] {
    Beam::BOTH.map(|beam| correct_distortion(extract_beam(raw, beam, config).view(), beam, config))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn small_config() -> InstrumentConfig {
        InstrumentConfig {
            raw_size: 10,
            beam_size: 4,
            beam_origins: [[0, 6], [6, 0]],
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_beams() {
        let config = small_config();
        let raw = Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c) as f32);
        let b1 = extract_beam(raw.view(), Beam::One, &config);
        let b2 = extract_beam(raw.view(), Beam::Two, &config);
        assert_eq!(b1.dim(), (4, 4));
        assert_eq!(b1[(0, 0)], 60.0);
        assert_eq!(b2[(0, 0)], 6.0);
        assert_eq!(b2[(3, 3)], 39.0);
    }

    #[test]
    fn test_identity_distortion_is_a_no_op() {
        let config = InstrumentConfig {
            distortion: [[[1.0, 0.0], [0.0, 1.0]]; 2],
            ..small_config()
        };
        let sub = Array2::from_shape_fn((4, 4), |(r, c)| (r + c) as f32);
        let corrected = correct_distortion(sub.view(), Beam::Two, &config);
        assert_abs_diff_eq!(corrected, sub, epsilon = 1e-6);
    }

    #[test]
    fn test_distortion_stretches_about_centre() {
        let config = InstrumentConfig {
            beam_size: 9,
            distortion: [[[1.0, 0.0], [0.0, 0.5]]; 2],
            ..small_config()
        };
        // A linear ramp in y is exactly representable by the cubic kernel.
        let sub = Array2::from_shape_fn((9, 9), |(r, _)| r as f32);
        let corrected = correct_distortion(sub.view(), Beam::One, &config);
        // The centre row stays put, the top row samples half way to it.
        assert_abs_diff_eq!(corrected[(4, 4)], 4.0, epsilon = 1e-5);
        assert_abs_diff_eq!(corrected[(0, 4)], 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(corrected[(8, 1)], 6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_beam_complement() {
        assert_eq!(Beam::One.complement(), Beam::Two);
        assert_eq!(Beam::Two.complement().index(), 0);
        assert_eq!(Beam::One.to_string(), "beam 1");
    }
}
