// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use hifitime::{Duration, Epoch};
use ndarray::prelude::*;

use super::*;
use crate::{constants::DEFAULT_CHISQ_THRESHOLD, geometry::BeamGeometry, Circle, Header};

fn gaussian(x: f64, centre: f64, sigma: f64) -> f64 {
    (-0.5 * ((x - centre) / sigma).powi(2)).exp()
}

/// A solar absorption line just below the line centre and a telluric line
/// above it, on a 2 nm grid.
fn synthetic_spectra(line: SpectralLine) -> ReferenceSpectra {
    let c = line.centre();
    let start = c - 1.0;
    let step = 0.0025;
    let lambda: Vec<f64> = (0..801).map(|i| start + step * i as f64).collect();
    let solar = lambda
        .iter()
        .map(|&l| 1.0 - 0.4 * gaussian(l, c - 0.02, 0.03))
        .collect();
    let telluric = lambda
        .iter()
        .map(|&l| 1.0 - 0.5 * gaussian(l, c + 0.12, 0.02))
        .collect();
    ReferenceSpectra::new(start, step, solar, telluric).unwrap()
}

fn scan_wavelengths(line: SpectralLine) -> Vec<f64> {
    (0..11)
        .map(|i| line.centre() + (i as f64 - 5.0) * 0.05)
        .collect()
}

fn truth() -> FitParameters {
    FitParameters {
        offset: 0.0137,
        h2o_factor: 0.8,
        scale_on: 1.03,
        scale_off: 0.97,
        telluric_offset: None,
    }
}

fn test_recovery(line: SpectralLine) {
    let spectra = synthetic_spectra(line);
    let filter = LyotFilter::default();
    let wavelengths = scan_wavelengths(line);
    let model = SpectrumModel::new(&spectra, &filter, &wavelengths);
    let (observation, background) = model.predict(&truth());

    let fit = fit_spectrum(
        &model,
        &wavelengths,
        &observation,
        &background,
        &line.fit_setup(),
        false,
    );
    assert_abs_diff_eq!(fit.offset, truth().offset, epsilon = 2e-4);
    assert_abs_diff_eq!(fit.h2o_factor, truth().h2o_factor, epsilon = 5e-3);
    assert_abs_diff_eq!(fit.continuum_scale_on, truth().scale_on, epsilon = 5e-4);
    assert_abs_diff_eq!(fit.continuum_scale_off, truth().scale_off, epsilon = 5e-4);
    assert!(fit.chi_square < 1e-8, "chi-square {}", fit.chi_square);
    assert!(fit.telluric_offset.is_none());
    assert_eq!(fit.wavelengths, wavelengths);

    // The correction is the on-band spectrum without the on-band scale.
    let (expected, _) = model.predict(&FitParameters {
        scale_on: 1.0,
        ..truth()
    });
    assert_eq!(fit.correction.len(), 11);
    for (c, e) in fit.correction.iter().zip(&expected) {
        assert_abs_diff_eq!(c, e, epsilon = 2e-4);
    }
}

#[test]
fn test_recovery_1074() {
    test_recovery(SpectralLine::Fe1074);
}

#[test]
fn test_recovery_1079() {
    test_recovery(SpectralLine::Fe1079);
}

#[test]
fn test_recovery_with_telluric_offset() {
    let line = SpectralLine::Fe1074;
    let spectra = synthetic_spectra(line);
    let filter = LyotFilter::default();
    let wavelengths = scan_wavelengths(line);
    let model = SpectrumModel::new(&spectra, &filter, &wavelengths);
    let params = FitParameters {
        telluric_offset: Some(-0.01),
        ..truth()
    };
    let (observation, background) = model.predict(&params);

    let fit = fit_spectrum(
        &model,
        &wavelengths,
        &observation,
        &background,
        &line.fit_setup(),
        true,
    );
    assert_abs_diff_eq!(fit.offset, params.offset, epsilon = 2e-3);
    let telluric_offset = fit.telluric_offset.unwrap();
    assert_abs_diff_eq!(telluric_offset, -0.01, epsilon = 5e-3);
    assert!(fit.chi_square < 1e-5);
}

#[test]
fn test_negative_h2o_factor_acts_as_zero() {
    let line = SpectralLine::Fe1079;
    let spectra = synthetic_spectra(line);
    let filter = LyotFilter::default();
    let wavelengths = scan_wavelengths(line);
    let model = SpectrumModel::new(&spectra, &filter, &wavelengths);
    let negative = model.predict(&FitParameters {
        h2o_factor: -0.3,
        ..truth()
    });
    let zero = model.predict(&FitParameters {
        h2o_factor: 0.0,
        ..truth()
    });
    assert_eq!(negative, zero);
}

#[test]
fn test_normalise_continuum() {
    let wavelengths = scan_wavelengths(SpectralLine::Fe1074);
    let continuum = |w: f64| 2.0 + 0.5 * (w - 1074.7) - 3.0 * (w - 1074.7).powi(2);
    let mut values: Vec<f64> = wavelengths.iter().map(|&w| continuum(w)).collect();
    // A dip in the middle shouldn't affect the continuum.
    values[5] *= 0.6;

    let normalised =
        fit::normalise_continuum(&wavelengths, &values, &[0, 1, 9, 10], "observation").unwrap();
    for (i, n) in normalised.iter().enumerate() {
        let expected = if i == 5 { 0.6 } else { 1.0 };
        assert_abs_diff_eq!(*n, expected, epsilon = 1e-9);
    }

    // Too few continuum points.
    let result = fit::normalise_continuum(&wavelengths, &values, &[0, 10], "background");
    assert_eq!(
        result,
        Err(WavecalError::Continuum {
            channel: "background"
        })
    );
}

fn t0() -> Epoch {
    Epoch::from_gregorian_utc_hms(2014, 3, 21, 20, 0, 0)
}

fn flat(time: Epoch, wavelength: f64, beam: i32) -> FlatExposure {
    FlatExposure {
        time,
        wavelength,
        beam,
        exposure: 250.0,
        image: Array2::zeros((4, 4)),
    }
}

/// The 22 exposures of a scan: the 11 wavelengths with each beam ordering.
fn scan(time: Epoch, line: SpectralLine) -> Vec<FlatExposure> {
    scan_wavelengths(line)
        .into_iter()
        .flat_map(|w| [flat(time, w, 1), flat(time, w, -1)])
        .collect()
}

#[test]
fn test_discover() {
    let t1 = t0() + Duration::from_seconds(1800.0);
    let t2 = t0() + Duration::from_seconds(3600.0);
    let mut flats = scan(t0(), SpectralLine::Fe1074);
    flats.extend(scan(t1, SpectralLine::Fe1074).into_iter().take(10));
    flats.extend(scan(t2, SpectralLine::Fe1079));

    let sequences = discover(&flats, SpectralLine::Fe1074);
    assert_eq!(sequences.len(), 1);
    assert_eq!(sequences[0].time, t0());
    assert_eq!(sequences[0].exposures.len(), 22);
    assert_abs_diff_eq!(sequences[0].mean_wavelength(), 1074.7, epsilon = 1e-9);

    let sequences = discover(&flats, SpectralLine::Fe1079);
    assert_eq!(sequences.len(), 1);
    assert_eq!(sequences[0].time, t2);

    assert!(discover(&[], SpectralLine::Fe1074).is_empty());
}

#[test]
fn test_discover_interleaved() {
    // Groups are by timestamp, not by adjacency.
    let t1 = t0() + Duration::from_seconds(60.0);
    let a = scan(t0(), SpectralLine::Fe1074);
    let b = scan(t1, SpectralLine::Fe1074);
    let flats: Vec<FlatExposure> = a.into_iter().zip(b).flat_map(|(a, b)| [a, b]).collect();
    let sequences = discover(&flats, SpectralLine::Fe1074);
    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0].time, t0());
    assert_eq!(sequences[1].time, t1);
}

#[test]
fn test_flat_from_raw() {
    let header: Header = [
        ("DATE-OBS", "2014-03-21"),
        ("TIME-OBS", "08:00:00"),
        ("WAVELENG", "1074.62"),
        ("BEAM", "-1"),
        ("EXPOSURE", "250.0"),
    ]
    .into_iter()
    .collect();
    let raw = RawExposure {
        header,
        image: Array2::zeros((4, 4)),
    };
    let config = InstrumentConfig::default();
    let flat = FlatExposure::from_raw(3, raw.clone(), &config).unwrap();
    assert_eq!(flat.time, Epoch::from_gregorian_utc_hms(2014, 3, 21, 18, 0, 0));
    assert_eq!(flat.beam, -1);
    assert_eq!(flat.on_band_beam(), Beam::Two);
    assert_abs_diff_eq!(flat.wavelength, 1074.62);

    let mut raw = raw;
    raw.header = [("DATE-OBS", "2014-03-21T08:00:00")].into_iter().collect();
    let result = FlatExposure::from_raw(3, raw, &config);
    assert!(matches!(result, Err(WavecalError::Header { index: 3, .. })));
}

#[test]
fn test_aggregate_empty() {
    let calibration = aggregate(SpectralLine::Fe1079, vec![]);
    assert!(calibration.is_empty());
    assert_eq!(calibration.offset.dim(), (0, 2));
    assert_eq!(calibration.chi_square.dim(), (0, 2));
    assert_eq!(calibration.correction.dim(), (0, 2, 11));
    assert!(calibration.telluric_offset.is_none());
}

fn handmade_fit(offset: f64, chi_square: f64) -> WavelengthFit {
    WavelengthFit {
        offset,
        h2o_factor: 0.5,
        continuum_scale_on: 1.0,
        continuum_scale_off: 1.0,
        chi_square,
        telluric_offset: None,
        wavelengths: scan_wavelengths(SpectralLine::Fe1074),
        correction: (0..11).map(|i| 0.8 + 0.02 * i as f64).collect(),
    }
}

#[test]
fn test_aggregate() {
    let t1 = t0() + Duration::from_seconds(7200.0);
    let calibration = aggregate(
        SpectralLine::Fe1074,
        vec![
            (t0(), [handmade_fit(0.01, 1e-4), handmade_fit(0.02, 2e-4)]),
            (t1, [handmade_fit(0.03, 1.0), handmade_fit(0.04, 2.0)]),
        ],
    );
    assert_eq!(calibration.num_scans(), 2);
    assert_eq!(calibration.times, vec![t0(), t1]);
    assert_eq!(calibration.offset, array![[0.01, 0.02], [0.03, 0.04]]);
    assert_eq!(calibration.chi_square[(1, 1)], 2.0);
    assert_eq!(calibration.wavelengths.dim(), (2, 2, 11));
    assert_abs_diff_eq!(calibration.correction[(1, 0, 10)], 1.0, epsilon = 1e-12);
}

#[test]
fn test_corrections() {
    let t1 = t0() + Duration::from_seconds(7200.0);
    let calibration = aggregate(
        SpectralLine::Fe1074,
        vec![
            (t0(), [handmade_fit(0.01, 1e-4), handmade_fit(0.02, 2e-4)]),
            (t1, [handmade_fit(0.03, 1.0), handmade_fit(0.04, 2.0)]),
        ],
    );

    // Nearest to the first scan, halfway between tuning points 5 and 6.
    let mut near_good = flat(t0() + Duration::from_seconds(600.0), 1074.725, -1);
    near_good.image.fill(9.1);
    let correction = calibration
        .flat_correction(&near_good, DEFAULT_CHISQ_THRESHOLD)
        .unwrap();
    assert!(correction.applied);
    assert_abs_diff_eq!(correction.factor, 0.91, epsilon = 1e-9);
    assert_eq!(correction.offset, 0.02);
    assert_abs_diff_eq!(
        calibration.correction_for(&near_good, DEFAULT_CHISQ_THRESHOLD),
        0.91,
        epsilon = 1e-9
    );

    // Nearest to the second scan, whose fits are too poor.
    let near_bad = flat(t0() + Duration::from_seconds(6600.0), 1074.725, 1);
    assert_eq!(
        calibration.correction_for(&near_bad, DEFAULT_CHISQ_THRESHOLD),
        1.0
    );
    let correction = calibration
        .flat_correction(&near_bad, DEFAULT_CHISQ_THRESHOLD)
        .unwrap();
    assert!(!correction.applied);
    assert_eq!(correction.chi_square, 1.0);

    let mut flats = vec![near_good, near_bad];
    let corrections = calibration.apply_corrections(&mut flats, DEFAULT_CHISQ_THRESHOLD);
    assert_eq!(corrections.len(), 2);
    assert!(flats[0].image.iter().all(|&v| (v - 10.0).abs() < 1e-5));
    assert!(flats[1].image.iter().all(|&v| v == 0.0));

    let cards = corrections[0].unwrap().header_cards();
    assert_eq!(cards[0], ("WAVOFF", 0.02));
    assert_eq!(cards[3].0, "CONTCORR");

    // No scans at all.
    let empty = aggregate(SpectralLine::Fe1074, vec![]);
    assert_eq!(empty.correction_for(&flats[0], DEFAULT_CHISQ_THRESHOLD), 1.0);
    assert!(empty.flat_correction(&flats[0], DEFAULT_CHISQ_THRESHOLD).is_none());
}

/// A small instrument with undistorted beams.
fn small_config() -> InstrumentConfig {
    InstrumentConfig {
        raw_size: 64,
        beam_size: 30,
        beam_origins: [[0, 34], [34, 0]],
        distortion: [[[1.0, 0.0], [0.0, 1.0]]; 2],
        occulter_radius_guess: 5.0,
        field_radius_guess: 13.0,
        ..Default::default()
    }
}

fn small_geometry(config: &InstrumentConfig) -> ImageGeometry {
    let dim = (config.beam_size, config.beam_size);
    let beam = BeamGeometry {
        occulter: Circle::centred(dim, 5.0),
        field: Circle::centred(dim, 13.0),
    };
    ImageGeometry::new(beam, beam)
}

/// Raw flats whose on-band beam holds `observation` and the other beam
/// `background`, scaled by the exposure time.
fn synthetic_flats(
    time: Epoch,
    config: &InstrumentConfig,
    wavelengths: &[f64],
    observation: &[f64],
    background: &[f64],
    beams: &[i32],
) -> Vec<FlatExposure> {
    let n = config.beam_size;
    let mut flats = vec![];
    for (i, &w) in wavelengths.iter().enumerate() {
        for &beam in beams {
            let mut f = flat(time, w, beam);
            f.image = Array2::zeros((config.raw_size, config.raw_size));
            let (on, off) = if beam > 0 { (0, 1) } else { (1, 0) };
            for (b, value) in [(on, observation[i]), (off, background[i])] {
                let [x0, y0] = config.beam_origins[b];
                f.image
                    .slice_mut(s![y0..y0 + n, x0..x0 + n])
                    .fill((value * f.exposure) as f32);
            }
            flats.push(f);
        }
    }
    flats
}

#[test]
fn test_fit_sequence() {
    let line = SpectralLine::Fe1074;
    let config = small_config();
    let geometry = small_geometry(&config);
    let spectra = synthetic_spectra(line);
    let filter = LyotFilter::default();
    let wavelengths = scan_wavelengths(line);
    let model = SpectrumModel::new(&spectra, &filter, &wavelengths);
    let (observation, background) = model.predict(&truth());
    let flats = synthetic_flats(
        t0(),
        &config,
        &wavelengths,
        &observation,
        &background,
        &[1, -1],
    );

    let calibrator = Calibrator {
        line,
        spectra: &spectra,
        filter: &filter,
        geometry: &geometry,
        config: &config,
        fit_telluric_offset: false,
    };
    let sequences = discover(&flats, line);
    assert_eq!(sequences.len(), 1);
    let [fit1, fit2] = calibrator.fit_sequence(&sequences[0]).unwrap();
    // Both beams see the same light.
    assert_abs_diff_eq!(fit1.offset, fit2.offset, epsilon = 1e-9);
    assert_eq!(fit1.wavelengths, wavelengths);

    // The medians measured from the images are the intensities put into them.
    let direct = calibrator
        .fit_samples(&ScanSamples {
            wavelengths: wavelengths.clone(),
            observation,
            background,
        })
        .unwrap();
    assert_abs_diff_eq!(fit1.offset, direct.offset, epsilon = 2e-3);
    assert_abs_diff_eq!(fit1.h2o_factor, direct.h2o_factor, epsilon = 2e-2);

    let calibration = calibrator.calibrate_day(&flats);
    assert_eq!(calibration.num_scans(), 1);
    assert_eq!(calibration.times, vec![t0()]);
    assert_abs_diff_eq!(calibration.offset[(0, 0)], fit1.offset, epsilon = 1e-12);
}

#[test]
fn test_undersized_flat_is_skipped() {
    let line = SpectralLine::Fe1074;
    let config = small_config();
    let geometry = small_geometry(&config);
    let spectra = synthetic_spectra(line);
    let filter = LyotFilter::default();
    let wavelengths = scan_wavelengths(line);
    let model = SpectrumModel::new(&spectra, &filter, &wavelengths);
    let (observation, background) = model.predict(&truth());
    let t1 = t0() + Duration::from_seconds(3600.0);
    let mut flats = synthetic_flats(
        t0(),
        &config,
        &wavelengths,
        &observation,
        &background,
        &[1, -1],
    );
    flats[3].image = Array2::zeros((4, 4));
    flats.extend(synthetic_flats(
        t1,
        &config,
        &wavelengths,
        &observation,
        &background,
        &[1, -1],
    ));

    let calibrator = Calibrator {
        line,
        spectra: &spectra,
        filter: &filter,
        geometry: &geometry,
        config: &config,
        fit_telluric_offset: false,
    };
    let sequences = discover(&flats, line);
    assert_eq!(sequences.len(), 2);
    assert_eq!(
        calibrator.fit_sequence(&sequences[0]),
        Err(WavecalError::FrameSize {
            index: 3,
            wavelength: flats[3].wavelength,
            got_y: 4,
            got_x: 4,
            expected: 64,
        })
    );

    // Only the intact scan is calibrated.
    let calibration = calibrator.calibrate_day(&flats);
    assert_eq!(calibration.num_scans(), 1);
    assert_eq!(calibration.times, vec![t1]);
}

#[test]
fn test_incomplete_scan_is_skipped() {
    let line = SpectralLine::Fe1079;
    let config = small_config();
    let geometry = small_geometry(&config);
    let spectra = synthetic_spectra(line);
    let filter = LyotFilter::default();
    let wavelengths = scan_wavelengths(line);
    let ones = vec![1.0; 11];
    // 22 exposures, but all with the on-band light in beam 1.
    let flats = synthetic_flats(t0(), &config, &wavelengths, &ones, &ones, &[1, 1]);

    let calibrator = Calibrator {
        line,
        spectra: &spectra,
        filter: &filter,
        geometry: &geometry,
        config: &config,
        fit_telluric_offset: false,
    };
    let sequences = discover(&flats, line);
    assert_eq!(sequences.len(), 1);
    let result = calibrator.fit_sequence(&sequences[0]);
    assert_eq!(
        result,
        Err(WavecalError::IncompleteScan {
            beam: 1,
            expected: 11,
            found: 22
        })
    );

    let calibration = calibrator.calibrate_day(&flats);
    assert!(calibration.is_empty());
}
