// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! File stuff (input/output, reading/writing, globs).

mod glob;
mod products;
pub mod read;
pub mod write;

pub(crate) use self::glob::expand_inputs;
pub use self::glob::GlobError;
pub use products::{
    load_calibration, load_geometry, save_calibration, save_geometry, ProductError,
};
pub use read::{
    read_exposure_files, read_exposures, read_primary_header, read_spectrum_table, ReadError,
};
pub use write::{write_fits_array, write_mask, write_stack, WriteError};
