// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Saving and loading pipeline products (image geometry and wavelength
//! calibrations) as toml or json, picked by file extension.

use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use hifitime::Epoch;
use itertools::Itertools;
use log::debug;
use ndarray::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::{
    geometry::ImageGeometry,
    wavecal::{SpectralLine, WavelengthCalibration},
};

lazy_static::lazy_static! {
    pub(crate) static ref PRODUCT_EXTENSIONS: String = ProductFileType::iter().join(", ");
}

#[derive(Debug, Display, EnumIter, EnumString)]
enum ProductFileType {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

impl ProductFileType {
    fn from_path(file: &Path) -> Result<ProductFileType, ProductError> {
        file.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ProductFileType::from_str(&e).ok())
            .ok_or_else(|| ProductError::UnknownExtension {
                file: file.to_path_buf(),
            })
    }
}

fn save<T: Serialize>(file: &Path, value: &T) -> Result<(), ProductError> {
    let encode_error = |err: String| ProductError::Encode {
        file: file.to_path_buf(),
        err,
    };
    let contents = match ProductFileType::from_path(file)? {
        ProductFileType::Toml => toml::to_string(value).map_err(|e| encode_error(e.to_string()))?,
        ProductFileType::Json => {
            serde_json::to_string_pretty(value).map_err(|e| encode_error(e.to_string()))?
        }
    };
    File::create(file)?.write_all(contents.as_bytes())?;
    debug!("Wrote {}", file.display());
    Ok(())
}

fn load<T: DeserializeOwned>(file: &Path) -> Result<T, ProductError> {
    let file_type = ProductFileType::from_path(file)?;
    let mut contents = String::new();
    File::open(file)?.read_to_string(&mut contents)?;
    let decode_error = |err: String| ProductError::Decode {
        file: file.to_path_buf(),
        err,
    };
    match file_type {
        ProductFileType::Toml => toml::from_str(&contents).map_err(|e| decode_error(e.to_string())),
        ProductFileType::Json => {
            serde_json::from_str(&contents).map_err(|e| decode_error(e.to_string()))
        }
    }
}

pub fn save_geometry(file: &Path, geometry: &ImageGeometry) -> Result<(), ProductError> {
    save(file, geometry)
}

pub fn load_geometry(file: &Path) -> Result<ImageGeometry, ProductError> {
    load(file)
}

/// The on-disk form of a [`WavelengthCalibration`]. Times are GPS seconds.
#[derive(Debug, Serialize, Deserialize)]
struct SavedCalibration {
    line: SpectralLine,
    gps_times: Vec<f64>,
    offset: Array2<f64>,
    h2o_factor: Array2<f64>,
    continuum_scale_on: Array2<f64>,
    continuum_scale_off: Array2<f64>,
    chi_square: Array2<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    telluric_offset: Option<Array2<f64>>,
    wavelengths: Array3<f64>,
    correction: Array3<f64>,
}

pub fn save_calibration(file: &Path, calibration: &WavelengthCalibration) -> Result<(), ProductError> {
    let c = calibration.clone();
    save(
        file,
        &SavedCalibration {
            line: c.line,
            gps_times: c.times.iter().map(|t| t.to_gpst_seconds()).collect(),
            offset: c.offset,
            h2o_factor: c.h2o_factor,
            continuum_scale_on: c.continuum_scale_on,
            continuum_scale_off: c.continuum_scale_off,
            chi_square: c.chi_square,
            telluric_offset: c.telluric_offset,
            wavelengths: c.wavelengths,
            correction: c.correction,
        },
    )
}

pub fn load_calibration(file: &Path) -> Result<WavelengthCalibration, ProductError> {
    let s: SavedCalibration = load(file)?;
    let n = s.gps_times.len();
    let scalar_shapes = [
        s.offset.dim(),
        s.h2o_factor.dim(),
        s.continuum_scale_on.dim(),
        s.continuum_scale_off.dim(),
        s.chi_square.dim(),
    ];
    if scalar_shapes.iter().any(|&d| d != (n, 2))
        || s.telluric_offset.as_ref().map_or(false, |t| t.dim() != (n, 2))
        || s.wavelengths.dim().0 != n
        || s.wavelengths.dim() != s.correction.dim()
    {
        return Err(ProductError::Inconsistent {
            file: file.to_path_buf(),
        });
    }
    Ok(WavelengthCalibration {
        line: s.line,
        times: s.gps_times.into_iter().map(Epoch::from_gpst_seconds).collect(),
        offset: s.offset,
        h2o_factor: s.h2o_factor,
        continuum_scale_on: s.continuum_scale_on,
        continuum_scale_off: s.continuum_scale_off,
        chi_square: s.chi_square,
        telluric_offset: s.telluric_offset,
        wavelengths: s.wavelengths,
        correction: s.correction,
    })
}

#[derive(Error, Debug)]
pub enum ProductError {
    #[error("'{file:?}' doesn't have a recognised file extension! Valid extensions are: {}", *PRODUCT_EXTENSIONS)]
    UnknownExtension { file: PathBuf },

    #[error("Couldn't encode {file:?}:\n{err}")]
    Encode { file: PathBuf, err: String },

    #[error("Couldn't decode {file:?}:\n{err}")]
    Decode { file: PathBuf, err: String },

    #[error("The arrays in {file:?} don't have consistent shapes")]
    Inconsistent { file: PathBuf },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
