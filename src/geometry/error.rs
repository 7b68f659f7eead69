// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with finding circles.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// The search couldn't produce a circle at all. Callers are expected to
    /// substitute a nominal circle.
    #[error("Circle search near radius {radius_guess} px degenerated: {reason}")]
    Degenerate { radius_guess: f64, reason: String },
}
