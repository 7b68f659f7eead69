// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Instrument configuration.
//!
//! Everything about the CoMP optics and detector layout that the reduction
//! depends on is collected into [`InstrumentConfig`]. It is built once per
//! pipeline run (either from defaults or a toml/json file) and only ever
//! borrowed afterwards.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

/// Empirically determined distortion coefficient of beam 1.
pub const DEFAULT_K1: f64 = 0.99353;

/// Empirically determined distortion coefficient of beam 2.
pub const DEFAULT_K2: f64 = 1.00973;

lazy_static::lazy_static! {
    pub(crate) static ref CONFIG_FILE_TYPES_COMMA_SEPARATED: String = ConfigFileType::iter().join(", ");
}

#[derive(Debug, Display, EnumIter, EnumString)]
enum ConfigFileType {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

/// A 2x2 linear map applied about the centre of a beam sub-image. Rows are
/// output coordinates, columns are input coordinates, ordered (x, y).
pub type DistortionMatrix = [[f64; 2]; 2];

/// Fixed instrument geometry and numerical settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// The side length of a raw dual-beam detector frame \[pixels\].
    pub raw_size: usize,

    /// The side length of a single-beam working image \[pixels\].
    pub beam_size: usize,

    /// The (x, y) pixel coordinates of the first pixel of each beam's
    /// sub-image within a raw frame.
    pub beam_origins: [[usize; 2]; 2],

    /// For each beam, the matrix mapping a distortion-corrected pixel
    /// (relative to the sub-image centre) to its location in the raw
    /// sub-image.
    pub distortion: [DistortionMatrix; 2],

    /// Initial guess of the occulter radius \[pixels\].
    pub occulter_radius_guess: f64,

    /// Initial guess of the field-stop radius \[pixels\].
    pub field_radius_guess: f64,

    /// Added to the (scaled) occulter radius when masking \[pixels\].
    pub occulter_offset: f64,

    /// Added to the (scaled) field-stop radius when masking \[pixels\].
    pub field_offset: f64,

    /// Rotation of the occulter post relative to the header post angle
    /// \[degrees\].
    pub post_rotation: f64,

    /// Half-width of the masked occulter-post wedge \[degrees\].
    pub post_half_width: f64,

    /// Half-width of the masked beam-overlap wedge \[degrees\].
    pub overlap_half_width: f64,

    /// Hours to add to header (local) times to get UTC.
    pub utc_offset_hours: f64,

    /// If the two per-beam readings of a legacy header disagree by more than
    /// this, a warning is logged \[pixels\].
    pub legacy_divergence_warn: f64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            raw_size: 1024,
            beam_size: 620,
            beam_origins: [[0, 1024 - 620], [1024 - 620, 0]],
            distortion: [
                [[1.0, 0.0], [0.0, DEFAULT_K1]],
                [[1.0, 0.0], [0.0, DEFAULT_K2]],
            ],
            occulter_radius_guess: 226.0,
            field_radius_guess: 297.0,
            occulter_offset: 1.0,
            field_offset: -3.0,
            post_rotation: 0.6,
            post_half_width: 35.0,
            overlap_half_width: 10.0,
            utc_offset_hours: 10.0,
            legacy_divergence_warn: 3.0,
        }
    }
}

impl InstrumentConfig {
    /// Read a configuration from a toml or json file. Fields missing from the
    /// file take their default values.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<InstrumentConfig, ConfigError> {
        let file = file.as_ref();
        debug!("Attempting to parse config file {}", file.display());

        let file_type = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ConfigFileType::from_str(&e).ok());

        let mut contents = String::new();
        match file_type {
            Some(ConfigFileType::Toml) => {
                File::open(file)?.read_to_string(&mut contents)?;
                let config = toml::from_str(&contents).map_err(|e| ConfigError::Decode {
                    file: file.to_path_buf(),
                    err: e.to_string(),
                })?;
                Self::validate(config)
            }
            Some(ConfigFileType::Json) => {
                File::open(file)?.read_to_string(&mut contents)?;
                let config = serde_json::from_str(&contents).map_err(|e| ConfigError::Decode {
                    file: file.to_path_buf(),
                    err: e.to_string(),
                })?;
                Self::validate(config)
            }
            None => Err(ConfigError::UnknownExtension {
                file: file.to_path_buf(),
            }),
        }
    }

    fn validate(config: InstrumentConfig) -> Result<InstrumentConfig, ConfigError> {
        for (i, origin) in config.beam_origins.iter().enumerate() {
            if origin[0] + config.beam_size > config.raw_size
                || origin[1] + config.beam_size > config.raw_size
            {
                return Err(ConfigError::BeamOutsideFrame {
                    beam: i + 1,
                    x: origin[0],
                    y: origin[1],
                    beam_size: config.beam_size,
                    raw_size: config.raw_size,
                });
            }
        }
        for (i, m) in config.distortion.iter().enumerate() {
            let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
            if det.abs() < 1e-12 {
                return Err(ConfigError::SingularDistortion { beam: i + 1 });
            }
        }
        if config.occulter_radius_guess <= 0.0 || config.field_radius_guess <= 0.0 {
            return Err(ConfigError::NonPositiveRadius);
        }
        Ok(config)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file '{file:?}' doesn't have a recognised file extension! Valid extensions are: {}", *CONFIG_FILE_TYPES_COMMA_SEPARATED)]
    UnknownExtension { file: PathBuf },

    #[error("Couldn't decode config from {file:?}:\n{err}")]
    Decode { file: PathBuf, err: String },

    #[error("Beam {beam} sub-image at ({x}, {y}) with size {beam_size} doesn't fit inside a {raw_size}x{raw_size} raw frame")]
    BeamOutsideFrame {
        beam: usize,
        x: usize,
        y: usize,
        beam_size: usize,
        raw_size: usize,
    },

    #[error("The distortion matrix of beam {beam} is singular")]
    SingularDistortion { beam: usize },

    #[error("Radius guesses must be positive")]
    NonPositiveRadius,

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
