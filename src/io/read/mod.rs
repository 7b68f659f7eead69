// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading raw exposures and reference spectra.

mod error;
pub(crate) mod fits;

pub use error::ReadError;
pub use fits::FitsError;

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use log::{debug, trace};
use ndarray::prelude::*;

use crate::{header::Header, misc::make_progress_bar, registration::RawExposure};

/// Read all of the exposures in a CoMP FITS file. Each image extension is an
/// exposure; its header is the primary header's keywords overridden by the
/// extension's. A primary HDU holding an image is an exposure too.
pub fn read_exposures<P: AsRef<Path>>(file: P) -> Result<Vec<RawExposure>, ReadError> {
    let file = file.as_ref();
    let mut fptr = fits::fits_open(file)?;
    let num_hdus = fits::fits_num_hdus(&mut fptr)?;
    trace!("{} has {num_hdus} HDUs", file.display());

    let primary = fits::fits_open_hdu(&mut fptr, 0)?;
    let mut primary_header = Header::new();
    fits::fits_read_known_keys(&mut fptr, &primary, &mut primary_header)?;

    let mut exposures = vec![];
    for hdu_index in 0..num_hdus {
        let hdu = fits::fits_open_hdu(&mut fptr, hdu_index)?;
        let shape = match fits::fits_image_shape(&hdu) {
            // Primary HDUs without data, and tables.
            None | Some([]) => continue,
            Some(&[ny, nx]) => (ny, nx),
            Some(shape) => {
                return Err(ReadError::Shape {
                    file: file.to_path_buf(),
                    hdu: hdu_index + 1,
                    shape: shape.to_vec(),
                })
            }
        };

        let mut header = primary_header.clone();
        if hdu_index > 0 {
            fits::fits_read_known_keys(&mut fptr, &hdu, &mut header)?;
        }
        let data: Vec<f32> = fits::fits_get_image(&mut fptr, &hdu)?;
        let image = Array2::from_shape_vec(shape, data).map_err(|_| ReadError::Shape {
            file: file.to_path_buf(),
            hdu: hdu_index + 1,
            shape: vec![shape.0, shape.1],
        })?;
        exposures.push(RawExposure { header, image });
    }

    if exposures.is_empty() {
        return Err(ReadError::NoExposures {
            file: file.to_path_buf(),
        });
    }
    debug!("Read {} exposures from {}", exposures.len(), file.display());
    Ok(exposures)
}

/// Read the exposures of many files, keeping the order of the files.
pub fn read_exposure_files(files: &[PathBuf]) -> Result<Vec<RawExposure>, ReadError> {
    let progress = make_progress_bar(files.len(), "Reading files", "files");
    let mut exposures = vec![];
    for file in files {
        exposures.extend(read_exposures(file)?);
        progress.inc(1);
    }
    progress.finish();
    Ok(exposures)
}

/// Read the known keywords of a file's primary HDU.
pub fn read_primary_header<P: AsRef<Path>>(file: P) -> Result<Header, ReadError> {
    let mut fptr = fits::fits_open(file)?;
    let primary = fits::fits_open_hdu(&mut fptr, 0)?;
    let mut header = Header::new();
    fits::fits_read_known_keys(&mut fptr, &primary, &mut header)?;
    Ok(header)
}

/// Read a two-column (wavelength \[nm\], value) text table, as used for the
/// solar and telluric reference spectra. Blank lines and lines starting with
/// `#` are ignored; any columns after the second are too. Rows are sorted by
/// wavelength.
pub fn read_spectrum_table<P: AsRef<Path>>(file: P) -> Result<Vec<(f64, f64)>, ReadError> {
    let file = file.as_ref();
    let reader = BufReader::new(File::open(file)?);
    let mut rows = vec![];
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut columns = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty());
        let mut next_value = || -> Option<f64> { columns.next()?.parse().ok() };
        match (next_value(), next_value()) {
            (Some(wavelength), Some(value)) => rows.push((wavelength, value)),
            _ => {
                return Err(ReadError::Spectrum {
                    file: file.to_path_buf(),
                    line_num: i + 1,
                    line: line.to_string(),
                })
            }
        }
    }
    if rows.is_empty() {
        return Err(ReadError::EmptySpectrum {
            file: file.to_path_buf(),
        });
    }
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(rows)
}
