// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The coronal emission lines that flats are calibrated for.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::constants::LINE_MATCH_TOLERANCE;

/// The Fe XIII lines observed by CoMP.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum SpectralLine {
    #[strum(serialize = "1074.7")]
    #[serde(rename = "1074.7")]
    Fe1074,

    #[strum(serialize = "1079.8")]
    #[serde(rename = "1079.8")]
    Fe1079,
}

/// The fixed settings used to fit a flat scan of one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFitSetup {
    /// Indices (into the wavelength-sorted scan) of the continuum points of
    /// the observation channel.
    pub observation_continuum: &'static [usize],

    /// Indices of the continuum points of the background channel.
    pub background_continuum: &'static [usize],

    /// Initial offset \[nm\], H2O factor, on-band scale and off-band scale.
    pub initial: [f64; 4],

    /// The lengths of Powell's initial search directions, one per parameter.
    pub steps: [f64; 4],
}

impl SpectralLine {
    /// The rest wavelength of the line \[nm\].
    pub fn centre(self) -> f64 {
        match self {
            SpectralLine::Fe1074 => 1074.7,
            SpectralLine::Fe1079 => 1079.8,
        }
    }

    /// Does a scan with this mean wavelength belong to this line?
    pub fn matches(self, mean_wavelength: f64) -> bool {
        (mean_wavelength - self.centre()).abs() <= LINE_MATCH_TOLERANCE
    }

    pub fn fit_setup(self) -> LineFitSetup {
        match self {
            SpectralLine::Fe1074 => LineFitSetup {
                observation_continuum: &[0, 1, 9, 10],
                background_continuum: &[0, 1, 2, 8, 9, 10],
                initial: [0.0, 0.5, 1.0, 1.0],
                steps: [0.01, 0.1, 0.01, 0.01],
            },
            SpectralLine::Fe1079 => LineFitSetup {
                observation_continuum: &[0, 1, 2, 8, 9, 10],
                background_continuum: &[0, 1, 9, 10],
                initial: [0.0, 0.3, 1.0, 1.0],
                steps: [0.01, 0.1, 0.01, 0.01],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_line_matching() {
        assert!(SpectralLine::Fe1074.matches(1074.62));
        assert!(SpectralLine::Fe1074.matches(1076.6));
        assert!(!SpectralLine::Fe1074.matches(1079.8));
        assert!(SpectralLine::Fe1079.matches(1079.8));
        assert_eq!(SpectralLine::from_str("1079.8").unwrap(), SpectralLine::Fe1079);
        assert_eq!(SpectralLine::Fe1074.to_string(), "1074.7");
    }

    #[test]
    fn test_continuum_indices_are_in_range() {
        for line in [SpectralLine::Fe1074, SpectralLine::Fe1079] {
            let setup = line.fit_setup();
            for &i in setup
                .observation_continuum
                .iter()
                .chain(setup.background_continuum)
            {
                assert!(i < crate::constants::NUM_SCAN_WAVELENGTHS);
            }
            // At least three points for a quadratic.
            assert!(setup.observation_continuum.len() >= 3);
            assert!(setup.background_continuum.len() >= 3);
        }
    }
}
