// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Geometric and wavelength calibration core for the CoMP solar coronagraph.

Raw dual-beam frames go through the [`geometry`] finder (occulter and field
stop circles), the [`mask`] builder and the [`registration`] step (distortion
correction, rotation to solar north and occulter centring). Flat-field
wavelength scans go through the [`wavecal`] calibrator.
 */

pub mod beam;
mod cli;
pub mod config;
pub mod constants;
pub mod ephemeris;
pub mod geometry;
pub mod header;
pub mod io;
pub mod mask;
pub(crate) mod math;
mod misc;
pub mod registration;
pub mod wavecal;

// Re-exports.
pub use beam::Beam;
pub use cli::{Comp, PipelineError};
pub use config::InstrumentConfig;
pub use geometry::{BeamGeometry, Circle, EdgePolarity, ImageGeometry};
pub use header::Header;
pub use mask::GeometrySource;
pub use wavecal::{SpectralLine, WavelengthCalibration, WavelengthFit};

use crossbeam_utils::atomic::AtomicCell;

/// Should progress bars be drawn? Set once by the binary.
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
