// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Wavelength calibration from flat-field scans.
//!
//! Each day's flats include scans of 11 tuning wavelengths across a line,
//! taken with both beam orderings. Calibration runs in three stages:
//!
//! 1. discover the complete scans ([`discover`]);
//! 2. fit a synthetic spectrum to each beam of each scan
//!    ([`Calibrator::fit_sequence`]);
//! 3. collect the fits into per-day arrays ([`aggregate`]).
//!
//! The results give a correction factor for each flat exposure
//! ([`WavelengthCalibration::correction_for`]).

mod error;
mod filter;
mod fit;
mod line;
mod spectra;
#[cfg(test)]
mod tests;

pub use error::WavecalError;
pub use filter::{FilterProfiles, LyotFilter};
pub use fit::{fit_spectrum, FitParameters, ScanSamples, SpectrumModel, WavelengthFit};
pub use line::{LineFitSetup, SpectralLine};
pub use spectra::ReferenceSpectra;

use hifitime::Epoch;
use log::{debug, info, warn};
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::{
    beam::Beam,
    constants::{FLAT_SEQUENCE_LEN, NUM_SCAN_WAVELENGTHS},
    geometry::ImageGeometry,
    mask::field_valid_mask,
    math::interpolate,
    misc::{epoch_date, make_progress_bar},
    registration::RawExposure,
    InstrumentConfig,
};

/// A single flat-field exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatExposure {
    /// UTC.
    pub time: Epoch,

    /// The tuning wavelength \[nm\].
    pub wavelength: f64,

    /// +1 if the on-band light is in beam 1, -1 if it's in beam 2.
    pub beam: i32,

    /// Exposure time \[ms\].
    pub exposure: f64,

    /// The raw dual-beam frame.
    pub image: Array2<f32>,
}

impl FlatExposure {
    /// Pull the metadata a flat needs out of a raw exposure's header.
    pub fn from_raw(
        index: usize,
        raw: RawExposure,
        config: &InstrumentConfig,
    ) -> Result<FlatExposure, WavecalError> {
        let header_error = |source| WavecalError::Header { index, source };
        Ok(FlatExposure {
            time: raw
                .header
                .observation_epoch(config.utc_offset_hours)
                .map_err(header_error)?,
            wavelength: raw.header.wavelength().map_err(header_error)?,
            beam: raw.header.beam().map_err(header_error)?,
            exposure: raw.header.exposure().map_err(header_error)?,
            image: raw.image,
        })
    }

    /// The beam holding the on-band light.
    pub fn on_band_beam(&self) -> Beam {
        if self.beam < 0 {
            Beam::Two
        } else {
            Beam::One
        }
    }
}

/// The exposures of one complete flat scan.
#[derive(Debug, Clone)]
pub struct FlatSequence<'a> {
    pub time: Epoch,
    pub exposures: Vec<&'a FlatExposure>,
}

impl FlatSequence<'_> {
    pub fn mean_wavelength(&self) -> f64 {
        self.exposures.iter().map(|e| e.wavelength).sum::<f64>() / self.exposures.len() as f64
    }
}

/// Group flats by timestamp and keep the groups that are complete scans of
/// `line`: exactly [`FLAT_SEQUENCE_LEN`] exposures with a mean wavelength
/// near the line centre. Groups keep the order in which their first exposure
/// appears. Anything else is logged and ignored.
pub fn discover(flats: &[FlatExposure], line: SpectralLine) -> Vec<FlatSequence> {
    let mut groups: Vec<FlatSequence> = vec![];
    for flat in flats {
        match groups.iter_mut().find(|g| g.time == flat.time) {
            Some(group) => group.exposures.push(flat),
            None => groups.push(FlatSequence {
                time: flat.time,
                exposures: vec![flat],
            }),
        }
    }

    groups
        .into_iter()
        .filter(|group| {
            let n = group.exposures.len();
            let mean = group.mean_wavelength();
            if n == FLAT_SEQUENCE_LEN && line.matches(mean) {
                debug!("Flat scan at {}: mean wavelength {mean:.3} nm", group.time);
                true
            } else {
                info!(
                    "Flats at {} ({n} exposures, mean wavelength {mean:.3} nm) aren't a complete {line} nm scan",
                    group.time
                );
                false
            }
        })
        .collect()
}

/// Everything needed to fit flat scans of one line.
pub struct Calibrator<'a> {
    pub line: SpectralLine,
    pub spectra: &'a ReferenceSpectra,
    pub filter: &'a dyn FilterProfiles,

    /// The geometry of the flats, used to find the illuminated pixels.
    pub geometry: &'a ImageGeometry,
    pub config: &'a InstrumentConfig,

    /// Fit the telluric spectrum with its own wavelength offset.
    pub fit_telluric_offset: bool,
}

impl Calibrator<'_> {
    fn masks(&self) -> [Array2<f32>; 2] {
        let dim = (self.config.beam_size, self.config.beam_size);
        Beam::BOTH.map(|beam| field_valid_mask(self.geometry.beam(beam), dim, self.config))
    }

    /// Fit both beams of a scan.
    pub fn fit_sequence(&self, sequence: &FlatSequence) -> Result<[WavelengthFit; 2], WavecalError> {
        self.fit_sequence_inner(sequence, &self.masks())
    }

    fn fit_sequence_inner(
        &self,
        sequence: &FlatSequence,
        masks: &[Array2<f32>; 2],
    ) -> Result<[WavelengthFit; 2], WavecalError> {
        let [samples1, samples2] = fit::extract_samples(sequence, masks, self.config)?;
        fit::check_scan(&samples1, Beam::One)?;
        fit::check_scan(&samples2, Beam::Two)?;
        Ok([self.fit_samples(&samples1)?, self.fit_samples(&samples2)?])
    }

    /// Normalise one beam's scan by its continuum and fit the model to it.
    pub fn fit_samples(&self, samples: &ScanSamples) -> Result<WavelengthFit, WavecalError> {
        let setup = self.line.fit_setup();
        let observation = fit::normalise_continuum(
            &samples.wavelengths,
            &samples.observation,
            setup.observation_continuum,
            "observation",
        )?;
        let background = fit::normalise_continuum(
            &samples.wavelengths,
            &samples.background,
            setup.background_continuum,
            "background",
        )?;
        let model = SpectrumModel::new(self.spectra, self.filter, &samples.wavelengths);
        Ok(fit_spectrum(
            &model,
            &samples.wavelengths,
            &observation,
            &background,
            &setup,
            self.fit_telluric_offset,
        ))
    }

    /// Discover, fit and aggregate a day's flats. Scans that can't be fitted
    /// are logged and left out.
    pub fn calibrate_day(&self, flats: &[FlatExposure]) -> WavelengthCalibration {
        let sequences = discover(flats, self.line);
        if sequences.is_empty() {
            info!("No complete {} nm flat scans", self.line);
            return aggregate(self.line, vec![]);
        }
        info!(
            "Fitting {} flat scans at {} nm",
            sequences.len(),
            self.line
        );

        let masks = self.masks();
        let progress = make_progress_bar(sequences.len(), "Fitting flat scans", "scans");
        let fits: Vec<Option<(Epoch, [WavelengthFit; 2])>> = sequences
            .par_iter()
            .enumerate()
            .map(|(i, sequence)| {
                let result = self.fit_sequence_inner(sequence, &masks);
                progress.inc(1);
                match result {
                    Ok(fits) => Some((sequence.time, fits)),
                    Err(e) => {
                        warn!(
                            "Flat scan {i} ({} {}, {} nm) skipped: {e}",
                            epoch_date(sequence.time),
                            sequence.time,
                            self.line
                        );
                        None
                    }
                }
            })
            .collect();
        progress.finish();

        aggregate(self.line, fits.into_iter().flatten().collect())
    }
}

/// Per-day wavelength calibration of one line. The arrays are indexed by
/// `[scan, beam]` (and tuning wavelength, for the last axis of
/// `wavelengths` and `correction`).
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthCalibration {
    pub line: SpectralLine,
    pub times: Vec<Epoch>,
    pub offset: Array2<f64>,
    pub h2o_factor: Array2<f64>,
    pub continuum_scale_on: Array2<f64>,
    pub continuum_scale_off: Array2<f64>,
    pub chi_square: Array2<f64>,

    /// Only present if every scan was fitted with a separate telluric offset.
    pub telluric_offset: Option<Array2<f64>>,
    pub wavelengths: Array3<f64>,
    pub correction: Array3<f64>,
}

/// Collect fits into arrays. No fits give empty arrays.
pub fn aggregate(line: SpectralLine, fits: Vec<(Epoch, [WavelengthFit; 2])>) -> WavelengthCalibration {
    let n = fits.len();
    let scalar = |f: &dyn Fn(&WavelengthFit) -> f64| {
        Array2::from_shape_fn((n, 2), |(i, b)| f(&fits[i].1[b]))
    };
    let curve = |f: &dyn Fn(&WavelengthFit) -> &[f64]| {
        Array3::from_shape_fn((n, 2, NUM_SCAN_WAVELENGTHS), |(i, b, w)| {
            f(&fits[i].1[b]).get(w).copied().unwrap_or(f64::NAN)
        })
    };
    let has_telluric_offset =
        n > 0 && fits.iter().all(|(_, f)| f.iter().all(|f| f.telluric_offset.is_some()));

    WavelengthCalibration {
        line,
        times: fits.iter().map(|(t, _)| *t).collect(),
        offset: scalar(&|f| f.offset),
        h2o_factor: scalar(&|f| f.h2o_factor),
        continuum_scale_on: scalar(&|f| f.continuum_scale_on),
        continuum_scale_off: scalar(&|f| f.continuum_scale_off),
        chi_square: scalar(&|f| f.chi_square),
        telluric_offset: has_telluric_offset
            .then(|| scalar(&|f| f.telluric_offset.unwrap_or(f64::NAN))),
        wavelengths: curve(&|f| f.wavelengths.as_slice()),
        correction: curve(&|f| f.correction.as_slice()),
    }
}

/// The correction of a single flat exposure, and the fit it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatCorrection {
    /// The flat should be divided by this.
    pub factor: f64,
    pub offset: f64,
    pub h2o_factor: f64,
    pub chi_square: f64,

    /// Whether the fit was good enough to be used. If not, `factor` is 1.
    pub applied: bool,
}

impl FlatCorrection {
    /// Header keywords recording this correction.
    pub fn header_cards(&self) -> [(&'static str, f64); 4] {
        [
            ("WAVOFF", self.offset),
            ("H2OFAC", self.h2o_factor),
            ("WAVCHISQ", self.chi_square),
            ("CONTCORR", self.factor),
        ]
    }
}

impl WavelengthCalibration {
    pub fn num_scans(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The index of the scan closest in time to `time`.
    fn nearest_scan(&self, time: Epoch) -> Option<usize> {
        self.times
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (**a - time).abs().to_seconds();
                let db = (**b - time).abs().to_seconds();
                da.total_cmp(&db)
            })
            .map(|(i, _)| i)
    }

    /// The correction for a flat exposure, from the scan nearest in time and
    /// the beam holding the flat's on-band light. `None` if there are no
    /// scans or the scan has no correction curve. If the scan's chi-square is above `chisq_threshold`, the factor
    /// is 1 and the correction isn't marked as applied.
    pub fn flat_correction(&self, flat: &FlatExposure, chisq_threshold: f64) -> Option<FlatCorrection> {
        let scan = self.nearest_scan(flat.time)?;
        let beam = flat.on_band_beam().index();
        let chi_square = self.chi_square[(scan, beam)];
        let offset = self.offset[(scan, beam)];
        let h2o_factor = self.h2o_factor[(scan, beam)];
        if chi_square.is_nan() || chi_square > chisq_threshold {
            info!(
                "Flat at {} ({} nm): chi-square {chi_square:.3e} of {} nm scan {scan} is above {chisq_threshold}; not correcting",
                flat.time, flat.wavelength, self.line
            );
            return Some(FlatCorrection {
                factor: 1.0,
                offset,
                h2o_factor,
                chi_square,
                applied: false,
            });
        }

        let wavelengths = self.wavelengths.slice(s![scan, beam, ..]).to_vec();
        let correction = self.correction.slice(s![scan, beam, ..]).to_vec();
        let factor = interpolate(&wavelengths, &correction, flat.wavelength)?;
        Some(FlatCorrection {
            factor,
            offset,
            h2o_factor,
            chi_square,
            applied: true,
        })
    }

    /// The multiplicative correction for a flat exposure; 1 if there's no
    /// trustworthy fit.
    pub fn correction_for(&self, flat: &FlatExposure, chisq_threshold: f64) -> f64 {
        match self.flat_correction(flat, chisq_threshold) {
            Some(c) if c.applied => c.factor,
            Some(_) => 1.0,
            None => {
                debug!("No {} nm scans to correct the flat at {}", self.line, flat.time);
                1.0
            }
        }
    }

    /// Correct each flat: divide its image by its correction factor. The
    /// corrections are returned so they can be recorded with the flats.
    pub fn apply_corrections(
        &self,
        flats: &mut [FlatExposure],
        chisq_threshold: f64,
    ) -> Vec<Option<FlatCorrection>> {
        flats
            .iter_mut()
            .map(|flat| {
                let correction = self.flat_correction(flat, chisq_threshold);
                if let Some(c) = correction.filter(|c| c.applied && c.factor != 0.0) {
                    let factor = c.factor as f32;
                    flat.image.mapv_inplace(|v| v / factor);
                }
                correction
            })
            .collect()
    }
}
