// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions for reading FITS files. Errors carry the location of the
//! caller, as cfitsio's own messages rarely say which file or HDU was at
//! fault.

mod error;

pub use error::FitsError;

use std::{fmt::Display, path::Path};

use fitsio::{hdu::*, FitsFile};

use crate::header::{Header, KNOWN_KEYWORDS};

/// Open a fits file.
#[track_caller]
pub(crate) fn fits_open<P: AsRef<Path>>(file: P) -> Result<FitsFile, FitsError> {
    FitsFile::open(file.as_ref()).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Open {
            fits_error: Box::new(e),
            fits_filename: file.as_ref().to_path_buf().into_boxed_path(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}

/// Open a fits file's HDU.
#[track_caller]
pub(crate) fn fits_open_hdu<T: DescribesHdu + Display + Copy>(
    fits_fptr: &mut FitsFile,
    hdu_description: T,
) -> Result<FitsHdu, FitsError> {
    fits_fptr.hdu(hdu_description).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Fitsio {
            fits_error: Box::new(e),
            fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
            hdu_description: format!("{hdu_description}").into_boxed_str(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}

/// The number of HDUs in a fits file.
#[track_caller]
pub(crate) fn fits_num_hdus(fits_fptr: &mut FitsFile) -> Result<usize, FitsError> {
    let mut num_hdus = 0;
    let mut status = 0;
    unsafe {
        // ffthdu = fits_get_num_hdus
        fitsio_sys::ffthdu(
            fits_fptr.as_raw(), /* I - FITS file pointer */
            &mut num_hdus,      /* O - number of HDUs    */
            &mut status,        /* IO - error status     */
        );
    }
    fitsio::errors::check_status(status).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Fitsio {
            fits_error: Box::new(e),
            fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
            hdu_description: "all".into(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })?;
    Ok(num_hdus.max(0) as usize)
}

/// Given a FITS file pointer, a HDU that belongs to it, and a keyword that may
/// or may not exist, pull out the (unparsed) value of the keyword.
#[track_caller]
pub(crate) fn fits_get_optional_key(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    keyword: &str,
) -> Result<Option<String>, FitsError> {
    match hdu.read_key::<String>(fits_fptr, keyword) {
        Ok(value) => Ok(Some(value)),
        Err(e) => match &e {
            // 202 = KEY_NO_EXIST, 204 = VALUE_UNDEFINED
            fitsio::errors::Error::Fits(fe) if matches!(fe.status, 202 | 204) => Ok(None),
            _ => {
                let caller = std::panic::Location::caller();
                Err(FitsError::Fitsio {
                    fits_error: Box::new(e),
                    fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                    hdu_description: format!("{}", hdu.number + 1).into_boxed_str(),
                    source_file: caller.file(),
                    source_line: caller.line(),
                    source_column: caller.column(),
                })
            }
        },
    }
}

/// Read every keyword the core knows about from a HDU into `header`,
/// replacing values already there.
#[track_caller]
pub(crate) fn fits_read_known_keys(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
    header: &mut Header,
) -> Result<(), FitsError> {
    for &key in KNOWN_KEYWORDS {
        if let Some(value) = fits_get_optional_key(fits_fptr, hdu, key)? {
            header.insert(key, value);
        }
    }
    Ok(())
}

/// The shape of a HDU's image, or `None` if the HDU isn't an image.
pub(crate) fn fits_image_shape(hdu: &FitsHdu) -> Option<&[usize]> {
    match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => Some(shape.as_slice()),
        _ => None,
    }
}

/// Given a FITS file pointer and a HDU, read the associated image.
#[track_caller]
pub(crate) fn fits_get_image<T: fitsio::images::ReadImage>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
) -> Result<T, FitsError> {
    match &hdu.info {
        HduInfo::ImageInfo { .. } => hdu.read_image(fits_fptr).map_err(|e| {
            let caller = std::panic::Location::caller();
            FitsError::Fitsio {
                fits_error: Box::new(e),
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_description: format!("{}", hdu.number + 1).into_boxed_str(),
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            }
        }),
        _ => {
            let caller = std::panic::Location::caller();
            Err(FitsError::NotImage {
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            })
        }
    }
}
