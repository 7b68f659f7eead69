// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with wavelength calibration.

use thiserror::Error;

use crate::header::HeaderError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WavecalError {
    #[error("Bad reference spectrum grid: {reason}")]
    BadGrid { reason: String },

    #[error("Flat exposure {index}: {source}")]
    Header {
        index: usize,
        #[source]
        source: HeaderError,
    },

    #[error("Expected {expected} exposures with BEAM = {beam}, but found {found}")]
    IncompleteScan {
        beam: i32,
        expected: usize,
        found: usize,
    },

    #[error("Exposure {index} of the scan ({wavelength} nm) is {got_y}x{got_x} pixels, but raw frames are expected to be {expected}x{expected}")]
    FrameSize {
        index: usize,
        wavelength: f64,
        got_y: usize,
        got_x: usize,
        expected: usize,
    },

    #[error("No unmasked pixels in the {channel} channel at {wavelength} nm")]
    EmptyMask {
        channel: &'static str,
        wavelength: f64,
    },

    #[error("Couldn't fit a continuum through the {channel} channel")]
    Continuum { channel: &'static str },
}
