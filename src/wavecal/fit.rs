// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fitting a synthetic spectrum to one beam of a flat scan.

use log::trace;
use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{FilterProfiles, FlatSequence, LineFitSetup, ReferenceSpectra, WavecalError};
use crate::{
    beam::{corrected_beams, Beam},
    constants::{NUM_SCAN_WAVELENGTHS, POWELL_FTOL},
    math::{masked_median, polyfit, powell, shift_uniform},
    InstrumentConfig,
};

/// Median intensities of one beam's half of a flat scan, sorted by
/// wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSamples {
    /// Tuning wavelengths \[nm\].
    pub wavelengths: Vec<f64>,

    /// The on-band light, from the beam being fitted.
    pub observation: Vec<f64>,

    /// The off-band light recorded at the same time in the other beam.
    pub background: Vec<f64>,
}

/// Measure the median intensity of each exposure inside the masks, and sort
/// the results into the two beams' scans. An exposure's on-band light is in
/// the beam given by its `BEAM` keyword; the other beam has the background.
/// Intensities are per unit exposure time.
pub(crate) fn extract_samples(
    sequence: &FlatSequence,
    masks: &[Array2<f32>; 2],
    config: &InstrumentConfig,
) -> Result<[ScanSamples; 2], WavecalError> {
    let measured = sequence
        .exposures
        .par_iter()
        .enumerate()
        .map(|(index, flat)| -> Result<_, WavecalError> {
            let (got_y, got_x) = flat.image.dim();
            if got_y < config.raw_size || got_x < config.raw_size {
                return Err(WavecalError::FrameSize {
                    index,
                    wavelength: flat.wavelength,
                    got_y,
                    got_x,
                    expected: config.raw_size,
                });
            }

            let sub_images = corrected_beams(flat.image.view(), config);
            let on = flat.on_band_beam();
            let off = on.complement();
            let median = |beam: Beam, channel: &'static str| {
                masked_median(
                    sub_images[beam.index()].view(),
                    masks[beam.index()].view(),
                )
                .ok_or(WavecalError::EmptyMask {
                    channel,
                    wavelength: flat.wavelength,
                })
            };
            let scale = if flat.exposure > 0.0 {
                1.0 / flat.exposure
            } else {
                1.0
            };
            Ok((
                on,
                flat.wavelength,
                median(on, "observation")? * scale,
                median(off, "background")? * scale,
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Beam::BOTH.map(|beam| {
        let mut samples: Vec<(f64, f64, f64)> = measured
            .iter()
            .filter(|(on, ..)| *on == beam)
            .map(|&(_, wavelength, obs, bkg)| (wavelength, obs, bkg))
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        ScanSamples {
            wavelengths: samples.iter().map(|s| s.0).collect(),
            observation: samples.iter().map(|s| s.1).collect(),
            background: samples.iter().map(|s| s.2).collect(),
        }
    }))
}

/// Divide `values` by a quadratic fitted through the points at `indices`.
pub(crate) fn normalise_continuum(
    wavelengths: &[f64],
    values: &[f64],
    indices: &[usize],
    channel: &'static str,
) -> Result<Vec<f64>, WavecalError> {
    let (x, y): (Vec<f64>, Vec<f64>) = indices
        .iter()
        .filter_map(|&i| Some((*wavelengths.get(i)?, *values.get(i)?)))
        .unzip();
    let continuum = polyfit(&x, &y, 2).ok_or(WavecalError::Continuum { channel })?;
    let normalised: Vec<f64> = wavelengths
        .iter()
        .zip(values)
        .map(|(&w, &v)| v / continuum.eval(w))
        .collect();
    if normalised.iter().any(|v| !v.is_finite()) {
        return Err(WavecalError::Continuum { channel });
    }
    Ok(normalised)
}

/// The parameters of a synthetic flat spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParameters {
    /// How far the true tuning wavelengths are above the nominal ones \[nm\].
    pub offset: f64,

    /// Scale of the telluric line depths. Negative values act as zero.
    pub h2o_factor: f64,

    pub scale_on: f64,
    pub scale_off: f64,

    /// A separate offset for the telluric spectrum \[nm\]. If `None`, the
    /// telluric spectrum moves with `offset`.
    pub telluric_offset: Option<f64>,
}

impl FitParameters {
    fn from_slice(x: &[f64]) -> FitParameters {
        FitParameters {
            offset: x[0],
            h2o_factor: x[1],
            scale_on: x[2],
            scale_off: x[3],
            telluric_offset: x.get(4).copied(),
        }
    }
}

/// Predicts on-band and off-band intensities at a scan's tuning wavelengths.
/// The filter profiles for each tuning wavelength are computed once.
pub struct SpectrumModel<'a> {
    spectra: &'a ReferenceSpectra,
    on_band: Vec<Vec<f64>>,
    off_band: Vec<Vec<f64>>,
}

impl<'a> SpectrumModel<'a> {
    pub fn new(
        spectra: &'a ReferenceSpectra,
        filter: &dyn FilterProfiles,
        wavelengths: &[f64],
    ) -> SpectrumModel<'a> {
        let (on_band, off_band): (Vec<Vec<f64>>, Vec<Vec<f64>>) = wavelengths
            .iter()
            .map(|&w| filter.profiles(&spectra.lambda, w))
            .unzip();
        SpectrumModel {
            spectra,
            on_band,
            off_band,
        }
    }

    /// The predicted on-band and off-band intensities.
    pub fn predict(&self, params: &FitParameters) -> (Vec<f64>, Vec<f64>) {
        let step = self.spectra.step;
        // out(x) = in(x + offset): the filter sees light from `offset` above
        // its nominal tuning.
        let solar = shift_uniform(&self.spectra.solar, step, -params.offset);
        let telluric = shift_uniform(
            &self.spectra.telluric,
            step,
            -params.telluric_offset.unwrap_or(params.offset),
        );
        let h2o = params.h2o_factor.max(0.0);
        let spectrum: Vec<f64> = solar
            .iter()
            .zip(&telluric)
            .map(|(s, t)| s * (1.0 - h2o * (1.0 - t)))
            .collect();

        let integrate = |profiles: &[Vec<f64>], scale: f64| -> Vec<f64> {
            profiles
                .iter()
                .map(|p| scale * p.iter().zip(&spectrum).map(|(w, s)| w * s).sum::<f64>())
                .collect()
        };
        (
            integrate(&self.on_band, params.scale_on),
            integrate(&self.off_band, params.scale_off),
        )
    }
}

/// The result of fitting one beam of one flat scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavelengthFit {
    /// \[nm\]
    pub offset: f64,
    pub h2o_factor: f64,
    pub continuum_scale_on: f64,
    pub continuum_scale_off: f64,

    /// The minimised sum of squared residuals.
    pub chi_square: f64,

    /// \[nm\]
    pub telluric_offset: Option<f64>,

    /// The tuning wavelengths of the scan \[nm\].
    pub wavelengths: Vec<f64>,

    /// The fitted synthetic on-band spectrum (without the on-band scale) at
    /// each tuning wavelength.
    pub correction: Vec<f64>,
}

/// Fit the model to continuum-normalised on-band (`observation`) and
/// off-band (`background`) intensities by minimising the summed squared
/// residuals with Powell's method. With `fit_telluric_offset`, the telluric
/// spectrum gets its own offset (a fifth parameter).
pub fn fit_spectrum(
    model: &SpectrumModel,
    wavelengths: &[f64],
    observation: &[f64],
    background: &[f64],
    setup: &LineFitSetup,
    fit_telluric_offset: bool,
) -> WavelengthFit {
    let objective = |x: &[f64]| -> f64 {
        let (on, off) = model.predict(&FitParameters::from_slice(x));
        let on_residual: f64 = on
            .iter()
            .zip(observation)
            .map(|(p, o)| (p - o).powi(2))
            .sum();
        let off_residual: f64 = off
            .iter()
            .zip(background)
            .map(|(p, b)| (p - b).powi(2))
            .sum();
        on_residual + off_residual
    };

    let mut x0 = setup.initial.to_vec();
    let mut steps = setup.steps.to_vec();
    if fit_telluric_offset {
        x0.push(setup.initial[0]);
        steps.push(setup.steps[0]);
    }
    let result = powell(objective, &x0, &steps, POWELL_FTOL);
    trace!(
        "Powell: {} iterations, {} evaluations, chi-square {:e}",
        result.iterations,
        result.evaluations,
        result.f
    );

    let best = FitParameters::from_slice(&result.x);
    let (correction, _) = model.predict(&FitParameters {
        scale_on: 1.0,
        ..best
    });
    WavelengthFit {
        offset: best.offset,
        h2o_factor: best.h2o_factor,
        continuum_scale_on: best.scale_on,
        continuum_scale_off: best.scale_off,
        chi_square: result.f,
        telluric_offset: best.telluric_offset,
        wavelengths: wavelengths.to_vec(),
        correction,
    }
}

/// Check that a beam's scan has a sample at every tuning wavelength.
pub(crate) fn check_scan(samples: &ScanSamples, beam: Beam) -> Result<(), WavecalError> {
    if samples.wavelengths.len() == NUM_SCAN_WAVELENGTHS {
        Ok(())
    } else {
        Err(WavecalError::IncompleteScan {
            beam: match beam {
                Beam::One => 1,
                Beam::Two => -1,
            },
            expected: NUM_SCAN_WAVELENGTHS,
            found: samples.wavelengths.len(),
        })
    }
}
