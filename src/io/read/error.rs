// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading input files.

use std::path::PathBuf;

use thiserror::Error;

use super::FitsError;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("{file:?} HDU {hdu}: expected a 2D image, but the shape is {shape:?}")]
    Shape {
        file: PathBuf,
        hdu: usize,
        shape: Vec<usize>,
    },

    #[error("{file:?} doesn't contain any exposures")]
    NoExposures { file: PathBuf },

    #[error("{file:?} line {line_num}: expected a wavelength and a value, but got '{line}'")]
    Spectrum {
        file: PathBuf,
        line_num: usize,
        line: String,
    },

    #[error("{file:?} doesn't contain any spectrum rows")]
    EmptySpectrum { file: PathBuf },

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
