// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Solar and telluric reference spectra.

use super::WavecalError;
use crate::math::interpolate;

/// Solar and telluric reference spectra on a common uniform wavelength grid.
/// Both are normalised so their continuum is one.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSpectra {
    /// The wavelengths of the grid \[nm\].
    pub lambda: Vec<f64>,

    /// The grid spacing \[nm\].
    pub step: f64,

    pub solar: Vec<f64>,

    /// Telluric transmission.
    pub telluric: Vec<f64>,
}

impl ReferenceSpectra {
    /// Spectra already sampled on a uniform grid starting at `start` with
    /// spacing `step`.
    pub fn new(
        start: f64,
        step: f64,
        solar: Vec<f64>,
        telluric: Vec<f64>,
    ) -> Result<ReferenceSpectra, WavecalError> {
        if step.is_nan() || step <= 0.0 {
            return Err(WavecalError::BadGrid {
                reason: format!("grid step {step} isn't positive"),
            });
        }
        if solar.len() != telluric.len() {
            return Err(WavecalError::BadGrid {
                reason: format!(
                    "{} solar samples but {} telluric samples",
                    solar.len(),
                    telluric.len()
                ),
            });
        }
        if solar.len() < 2 {
            return Err(WavecalError::BadGrid {
                reason: "fewer than 2 samples".to_string(),
            });
        }
        let lambda = (0..solar.len()).map(|i| start + step * i as f64).collect();
        Ok(ReferenceSpectra {
            lambda,
            step,
            solar,
            telluric,
        })
    }

    /// Resample tabulated `(wavelength, intensity)` spectra onto a uniform
    /// grid of spacing `step` covering `centre ± half_width`. The tables must
    /// be sorted by wavelength; points beyond a table take its end value.
    pub fn resample(
        centre: f64,
        half_width: f64,
        step: f64,
        solar: &[(f64, f64)],
        telluric: &[(f64, f64)],
    ) -> Result<ReferenceSpectra, WavecalError> {
        if solar.is_empty() || telluric.is_empty() {
            return Err(WavecalError::BadGrid {
                reason: "empty reference spectrum".to_string(),
            });
        }
        if step.is_nan() || step <= 0.0 {
            return Err(WavecalError::BadGrid {
                reason: format!("grid step {step} isn't positive"),
            });
        }
        for table in [solar, telluric] {
            if table.windows(2).any(|w| w[1].0 < w[0].0) {
                return Err(WavecalError::BadGrid {
                    reason: "reference spectrum isn't sorted by wavelength".to_string(),
                });
            }
        }

        let start = centre - half_width;
        let n = (2.0 * half_width / step).round() as usize + 1;
        let resample_one = |table: &[(f64, f64)]| -> Result<Vec<f64>, WavecalError> {
            let (x, y): (Vec<f64>, Vec<f64>) = table.iter().copied().unzip();
            (0..n)
                .map(|i| interpolate(&x, &y, start + step * i as f64))
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| WavecalError::BadGrid {
                    reason: "empty reference spectrum".to_string(),
                })
        };
        ReferenceSpectra::new(start, step, resample_one(solar)?, resample_one(telluric)?)
    }

    pub fn len(&self) -> usize {
        self.lambda.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lambda.is_empty()
    }
}
