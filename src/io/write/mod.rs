// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Writing images, masks and registered stacks to FITS files.

mod error;

pub use error::WriteError;

use std::path::Path;

use fitsio::{
    images::{ImageDescription, ImageType},
    FitsFile,
};
use log::debug;
use ndarray::prelude::*;

/// Write an array as the primary image of a new FITS file, replacing the file
/// if it exists. The FITS axes are the reverse of the array's, so a `[y, x]`
/// image has `NAXIS1` = x. `cards` are written as numeric keywords.
pub fn write_fits_array<D: Dimension>(
    file: &Path,
    array: ArrayView<f32, D>,
    cards: &[(&str, f64)],
) -> Result<(), WriteError> {
    if file.exists() {
        std::fs::remove_file(file)?;
    }
    let image_description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: array.shape(),
    };
    let mut fptr = FitsFile::create(file)
        .with_custom_primary(&image_description)
        .open()?;
    let hdu = fptr.primary_hdu()?;
    // Standard layout, whatever the layout of the view.
    let data: Vec<f32> = array.iter().copied().collect();
    hdu.write_image(&mut fptr, &data)?;

    for (key, value) in cards {
        hdu.write_key(&mut fptr, key, *value)?;
    }
    hdu.write_key(
        &mut fptr,
        "SOFTWARE",
        format!(
            "Created by {} v{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ),
    )?;
    debug!("Wrote {:?} to {}", array.shape(), file.display());
    Ok(())
}

/// Write a mask. Masks are stored as floats with values 0 and 1.
pub fn write_mask(file: &Path, mask: ArrayView2<f32>) -> Result<(), WriteError> {
    write_fits_array(file, mask, &[])
}

/// Write a stack of registered images, indexed `[exposure, y, x]`.
pub fn write_stack(file: &Path, stack: ArrayView3<f32>) -> Result<(), WriteError> {
    write_fits_array(file, stack, &[])
}
