// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{borrow::Cow, path::PathBuf};

use clap::Parser;
use itertools::{Itertools, MinMaxResult};
use log::info;

use super::{mean_raw_image, printers::InfoPrinter, PipelineError};
use crate::{
    ephemeris::ComputedEphemeris,
    geometry::find_image_geometry,
    io::{expand_inputs, load_geometry, read_exposure_files, read_exposures, write_mask, write_stack},
    mask::build_mask_from_circles,
    registration::extract_and_register,
    Beam, InstrumentConfig,
};

#[derive(Parser, Debug)]
pub(super) struct RegisterArgs {
    /// Raw FITS files to register. Glob patterns are expanded.
    #[clap(name = "INPUT_FILES", required = true)]
    inputs: Vec<String>,

    /// A geometry file written by the geometry subcommand.
    #[clap(long, parse(from_os_str))]
    #[clap(required_unless_present = "flat", conflicts_with = "flat")]
    geometry: Option<PathBuf>,

    /// Find the geometry from this raw flat-field FITS file instead.
    #[clap(long, parse(from_os_str))]
    flat: Option<PathBuf>,

    /// The directory to write the registered stacks to.
    #[clap(short, long, parse(from_os_str), default_value = ".")]
    output_dir: PathBuf,

    /// Also write the mask of each beam's registered images.
    #[clap(long)]
    write_masks: bool,
}

impl RegisterArgs {
    pub(super) fn run(self, config: &InstrumentConfig, dry_run: bool) -> Result<(), PipelineError> {
        let files = expand_inputs(&self.inputs)?;

        let mut printer = InfoPrinter::new("Registration inputs".into());
        let mut block: Vec<Cow<'static, str>> = vec![format!("{} input files", files.len()).into()];
        block.extend(files.iter().map(|f| f.display().to_string().into()));
        printer.push_block(block);
        match (&self.geometry, &self.flat) {
            (Some(g), _) => printer.push_line(format!("Geometry: {}", g.display()).into()),
            (None, Some(f)) => printer.push_line(format!("Geometry from flat: {}", f.display()).into()),
            (None, None) => (),
        }
        printer.push_line(format!("Output directory: {}", self.output_dir.display()).into());
        printer.display();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let geometry = match (self.geometry, self.flat) {
            (Some(file), _) => load_geometry(&file)?,
            (None, Some(file)) => {
                let flats = read_exposures(&file)?;
                find_image_geometry(mean_raw_image(&flats, config)?.view(), config)
            }
            (None, None) => {
                return Err(PipelineError::Input(
                    "Either --geometry or --flat is needed".to_string(),
                ))
            }
        };

        let exposures = read_exposure_files(&files)?;
        let registered = extract_and_register(&exposures, &geometry, &ComputedEphemeris, config)?;
        match registered.sun.iter().map(|s| s.p_angle).minmax() {
            MinMaxResult::OneElement(p) => info!("P angle {p:.3}°"),
            MinMaxResult::MinMax(min, max) => info!("P angles {min:.3}° to {max:.3}°"),
            MinMaxResult::NoElements => (),
        }

        std::fs::create_dir_all(&self.output_dir)?;
        for beam in Beam::BOTH {
            let n = beam.index() + 1;
            let file = self.output_dir.join(format!("registered_beam{n}.fits"));
            write_stack(&file, registered.beam(beam).view())?;
            info!("Wrote {} {beam} images to {}", registered.num_exposures(), file.display());

            if self.write_masks {
                let dim = (config.beam_size, config.beam_size);
                let mask = build_mask_from_circles(geometry.beam(beam), dim, config, 1.0, 1.0);
                let file = self.output_dir.join(format!("mask_beam{n}.fits"));
                write_mask(&file, mask.view())?;
                info!("Wrote the {beam} mask to {}", file.display());
            }
        }
        Ok(())
    }
}
