// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all pipeline errors. This should be the *only* error enum
//! that is publicly visible from the binary.

use thiserror::Error;

use crate::{
    config::ConfigError,
    header::HeaderError,
    io::{GlobError, ProductError, ReadError, WriteError},
    registration::RegistrationError,
    wavecal::WavecalError,
};

/// The *only* publicly visible error from the binary. Messages are grouped by
/// what went wrong, with a hint where one helps.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An error related to the instrument configuration.
    #[error("{0}\n\nThe instrument config is given with --config; fields left out take their default values.")]
    Config(String),

    /// Required exposure metadata is missing or malformed.
    #[error("{0}\n\nCheck the FITS headers of the input files.")]
    Metadata(String),

    /// An error related to registration.
    #[error("{0}")]
    Registration(String),

    /// An error related to wavelength calibration.
    #[error("{0}")]
    Wavecal(String),

    /// An error related to input files or arguments.
    #[error("{0}")]
    Input(String),

    /// An error related to pipeline products (geometry and calibration
    /// files).
    #[error("{0}\n\nGeometry and calibration files must have a .toml or .json extension.")]
    Product(String),

    /// A cfitsio error. Because these are usually quite spartan, some
    /// suggestions are provided here.
    #[error("cfitsio error: {0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv) and maybe disabling progress bars.")]
    Cfitsio(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::IO(e) => Self::from(e),
            _ => Self::Config(e.to_string()),
        }
    }
}

impl From<HeaderError> for PipelineError {
    fn from(e: HeaderError) -> Self {
        Self::Metadata(e.to_string())
    }
}

impl From<RegistrationError> for PipelineError {
    fn from(e: RegistrationError) -> Self {
        let s = e.to_string();
        match e {
            RegistrationError::Header { .. } => Self::Metadata(s),
            RegistrationError::FrameSize { .. } | RegistrationError::NoExposures => {
                Self::Registration(s)
            }
        }
    }
}

impl From<WavecalError> for PipelineError {
    fn from(e: WavecalError) -> Self {
        let s = e.to_string();
        match e {
            WavecalError::Header { .. } => Self::Metadata(s),
            WavecalError::BadGrid { .. } | WavecalError::FrameSize { .. } => Self::Input(s),
            WavecalError::IncompleteScan { .. }
            | WavecalError::EmptyMask { .. }
            | WavecalError::Continuum { .. } => Self::Wavecal(s),
        }
    }
}

impl From<ReadError> for PipelineError {
    fn from(e: ReadError) -> Self {
        let s = e.to_string();
        match e {
            ReadError::Fits(_) => Self::Cfitsio(s),
            ReadError::IO(e) => Self::from(e),
            ReadError::Shape { .. }
            | ReadError::NoExposures { .. }
            | ReadError::Spectrum { .. }
            | ReadError::EmptySpectrum { .. } => Self::Input(s),
        }
    }
}

impl From<WriteError> for PipelineError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::Fitsio(e) => Self::Cfitsio(e.to_string()),
            WriteError::IO(e) => Self::from(e),
        }
    }
}

impl From<ProductError> for PipelineError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::IO(e) => Self::from(e),
            _ => Self::Product(e.to_string()),
        }
    }
}

impl From<GlobError> for PipelineError {
    fn from(e: GlobError) -> Self {
        Self::Input(e.to_string())
    }
}

impl From<log::SetLoggerError> for PipelineError {
    fn from(e: log::SetLoggerError) -> Self {
        Self::Generic(format!("Failed to initialise logging: {e}"))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
