// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{borrow::Cow, path::PathBuf};

use clap::Parser;
use itertools::Itertools;
use log::{info, warn};
use strum::IntoEnumIterator;

use super::{mean_raw_image, printers::InfoPrinter, PipelineError};
use crate::{
    constants::DEFAULT_CHISQ_THRESHOLD,
    geometry::find_image_geometry,
    io::{
        expand_inputs, load_geometry, read_exposure_files, read_spectrum_table, save_calibration,
        write_fits_array,
    },
    wavecal::{Calibrator, FlatExposure, LyotFilter, ReferenceSpectra, SpectralLine},
    InstrumentConfig,
};

#[derive(Parser, Debug)]
pub(super) struct WavecalArgs {
    /// A day's raw flat-field FITS files. Glob patterns are expanded.
    #[clap(name = "FLAT_FILES", required = true)]
    inputs: Vec<String>,

    /// The solar reference spectrum; a two-column (wavelength [nm],
    /// intensity) text file.
    #[clap(long, parse(from_os_str))]
    solar: PathBuf,

    /// The telluric transmission spectrum; a two-column (wavelength [nm],
    /// transmission) text file.
    #[clap(long, parse(from_os_str))]
    telluric: PathBuf,

    /// The lines to calibrate (1074.7 and/or 1079.8). The default is both.
    #[clap(long)]
    lines: Vec<SpectralLine>,

    /// A geometry file written by the geometry subcommand. If not given, the
    /// geometry is found from the mean of the flats.
    #[clap(long, parse(from_os_str))]
    geometry: Option<PathBuf>,

    /// Fit the telluric spectrum with its own wavelength offset.
    #[clap(long)]
    fit_telluric_offset: bool,

    /// Fits with a chi-square above this don't correct flats.
    #[clap(long)]
    chisq_threshold: Option<f64>,

    /// The spacing of the reference spectrum grid [nm].
    #[clap(long, default_value = "0.001")]
    grid_step: f64,

    /// The reference spectrum grid covers this far either side of the line
    /// centre [nm].
    #[clap(long, default_value = "1.0")]
    grid_half_width: f64,

    /// The FWHM of the filter bandpass [nm].
    #[clap(long)]
    filter_fwhm: Option<f64>,

    /// The FWHM of a Gaussian pre-filter [nm]. There's no pre-filter by
    /// default.
    #[clap(long)]
    prefilter_fwhm: Option<f64>,

    /// The directory to write the calibrations (and corrected flats) to.
    #[clap(short, long, parse(from_os_str), default_value = ".")]
    output_dir: PathBuf,

    /// Also write each flat exposure divided by its correction, with the
    /// correction recorded in its header.
    #[clap(long)]
    write_corrected: bool,
}

impl WavecalArgs {
    pub(super) fn run(self, config: &InstrumentConfig, dry_run: bool) -> Result<(), PipelineError> {
        let files = expand_inputs(&self.inputs)?;
        let lines = if self.lines.is_empty() {
            SpectralLine::iter().collect()
        } else {
            self.lines.clone()
        };
        let chisq_threshold = self.chisq_threshold.unwrap_or(DEFAULT_CHISQ_THRESHOLD);
        let filter = LyotFilter {
            fwhm: self.filter_fwhm.unwrap_or(LyotFilter::default().fwhm),
            prefilter_fwhm: self.prefilter_fwhm,
            ..Default::default()
        };

        let mut printer = InfoPrinter::new("Wavelength calibration inputs".into());
        let mut block: Vec<Cow<'static, str>> = vec![format!("{} flat files", files.len()).into()];
        block.extend(files.iter().map(|f| f.display().to_string().into()));
        printer.push_block(block);
        printer.push_block(vec![
            format!("Solar spectrum: {}", self.solar.display()).into(),
            format!("Telluric spectrum: {}", self.telluric.display()).into(),
            format!(
                "Grid: ±{} nm, step {} nm",
                self.grid_half_width, self.grid_step
            )
            .into(),
        ]);
        printer.push_line(format!("Lines: {}", lines.iter().join(", ")).into());
        printer.push_line(
            format!(
                "Filter: FWHM {} nm, {} stages, pre-filter {}",
                filter.fwhm,
                filter.num_stages,
                filter
                    .prefilter_fwhm
                    .map(|f| format!("{f} nm"))
                    .unwrap_or_else(|| "none".to_string())
            )
            .into(),
        );
        printer.push_line(format!("Chi-square threshold: {chisq_threshold:e}").into());
        if self.fit_telluric_offset {
            printer.push_line("Fitting a separate telluric offset".into());
        }
        printer.display();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let solar = read_spectrum_table(&self.solar)?;
        let telluric = read_spectrum_table(&self.telluric)?;
        let exposures = read_exposure_files(&files)?;
        let geometry = match &self.geometry {
            Some(file) => load_geometry(file)?,
            None => find_image_geometry(mean_raw_image(&exposures, config)?.view(), config),
        };
        let flats = exposures
            .into_iter()
            .enumerate()
            .map(|(i, raw)| FlatExposure::from_raw(i, raw, config))
            .collect::<Result<Vec<_>, _>>()?;

        std::fs::create_dir_all(&self.output_dir)?;
        for line in lines {
            let spectra = ReferenceSpectra::resample(
                line.centre(),
                self.grid_half_width,
                self.grid_step,
                &solar,
                &telluric,
            )?;
            let calibrator = Calibrator {
                line,
                spectra: &spectra,
                filter: &filter,
                geometry: &geometry,
                config,
                fit_telluric_offset: self.fit_telluric_offset,
            };
            let calibration = calibrator.calibrate_day(&flats);
            if calibration.is_empty() {
                warn!("No {line} nm calibration");
                continue;
            }

            let mut printer = InfoPrinter::new(format!("{line} nm calibration").into());
            for (i, time) in calibration.times.iter().enumerate() {
                printer.push_line(
                    format!(
                        "{time}: offsets {:.4}, {:.4} nm; H2O {:.3}, {:.3}; chi-square {:.2e}, {:.2e}",
                        calibration.offset[(i, 0)],
                        calibration.offset[(i, 1)],
                        calibration.h2o_factor[(i, 0)],
                        calibration.h2o_factor[(i, 1)],
                        calibration.chi_square[(i, 0)],
                        calibration.chi_square[(i, 1)],
                    )
                    .into(),
                );
            }
            printer.display();

            let file = self.output_dir.join(format!("wavecal_{line}.json"));
            save_calibration(&file, &calibration)?;
            info!("Wrote the {line} nm calibration to {}", file.display());

            if self.write_corrected {
                let mut line_flats: Vec<FlatExposure> = flats
                    .iter()
                    .filter(|f| line.matches(f.wavelength))
                    .cloned()
                    .collect();
                let corrections = calibration.apply_corrections(&mut line_flats, chisq_threshold);
                for (i, (flat, correction)) in line_flats.iter().zip(corrections).enumerate() {
                    let mut cards = vec![
                        ("WAVELENG", flat.wavelength),
                        ("BEAM", f64::from(flat.beam)),
                        ("EXPOSURE", flat.exposure),
                    ];
                    if let Some(correction) = correction {
                        cards.extend(correction.header_cards());
                    }
                    let file = self
                        .output_dir
                        .join(format!("flat_{line}_{i:03}_{:.2}.fits", flat.wavelength));
                    write_fits_array(&file, flat.image.view(), &cards)?;
                }
                info!(
                    "Wrote {} corrected {line} nm flats to {}",
                    line_flats.len(),
                    self.output_dir.display()
                );
            }
        }
        Ok(())
    }
}
