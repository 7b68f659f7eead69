// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use log::info;

use super::{printers::InfoPrinter, PipelineError};
use crate::{
    io::{load_geometry, read_primary_header, write_mask},
    mask::{build_mask, build_mask_from_circles},
    Beam, GeometrySource, InstrumentConfig,
};

#[derive(Parser, Debug)]
pub(super) struct MaskArgs {
    /// A FITS file whose primary header has the geometry keywords (legacy
    /// per-beam keywords, or modern ones with FRADIUS).
    #[clap(long, parse(from_os_str))]
    #[clap(required_unless_present = "geometry", conflicts_with = "geometry")]
    header: Option<PathBuf>,

    /// A geometry file written by the geometry subcommand.
    #[clap(long, parse(from_os_str))]
    geometry: Option<PathBuf>,

    /// The beam (1 or 2) whose circles are used with --geometry.
    #[clap(long, default_value = "1")]
    beam: u8,

    /// Scale the occulter radius by this before adding the occulter offset.
    #[clap(long, default_value = "1.0")]
    occulter_factor: f64,

    /// Scale the field-stop radius by this before adding the field offset.
    #[clap(long, default_value = "1.0")]
    field_factor: f64,

    /// The FITS file to write the mask to.
    #[clap(short, long, parse(from_os_str))]
    output: PathBuf,
}

impl MaskArgs {
    pub(super) fn run(self, config: &InstrumentConfig, dry_run: bool) -> Result<(), PipelineError> {
        let beam = match self.beam {
            1 => Beam::One,
            2 => Beam::Two,
            b => return Err(PipelineError::Input(format!("There is no beam {b}"))),
        };
        let dim = (config.beam_size, config.beam_size);

        let mut printer = InfoPrinter::new("Mask inputs".into());
        match (&self.header, &self.geometry) {
            (Some(header), _) => {
                printer.push_line(format!("Geometry from header: {}", header.display()).into())
            }
            (None, Some(geometry)) => printer.push_line(
                format!("Geometry from {}, {beam}", geometry.display()).into(),
            ),
            (None, None) => (),
        }
        printer.push_line(
            format!(
                "Factors: occulter {}, field {}",
                self.occulter_factor, self.field_factor
            )
            .into(),
        );
        printer.push_line(format!("Output: {}", self.output.display()).into());
        printer.display();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let mask = match (self.header, self.geometry) {
            (Some(file), _) => {
                let header = read_primary_header(&file)?;
                let source = GeometrySource::from_header(&header)?;
                build_mask(
                    &source,
                    dim,
                    config,
                    self.occulter_factor,
                    self.field_factor,
                )
            }
            (None, Some(file)) => {
                let geometry = load_geometry(&file)?;
                build_mask_from_circles(
                    geometry.beam(beam),
                    dim,
                    config,
                    self.occulter_factor,
                    self.field_factor,
                )
            }
            (None, None) => {
                return Err(PipelineError::Input(
                    "Either --header or --geometry is needed".to_string(),
                ))
            }
        };

        let unmasked = mask.iter().filter(|&&v| v > 0.0).count();
        info!(
            "{unmasked} of {} pixels are unmasked",
            dim.0 * dim.1
        );
        write_mask(&self.output, mask.view())?;
        info!("Wrote mask to {}", self.output.display());
        Ok(())
    }
}
