// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with registering beams.

use thiserror::Error;

use crate::header::HeaderError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    #[error("Exposure {index}: {source}")]
    Header {
        index: usize,
        #[source]
        source: HeaderError,
    },

    #[error("Exposure {index} is {got_y}x{got_x} pixels, but raw frames are expected to be {expected}x{expected}")]
    FrameSize {
        index: usize,
        got_y: usize,
        got_x: usize,
        expected: usize,
    },

    #[error("No exposures were supplied for registration")]
    NoExposures,
}
