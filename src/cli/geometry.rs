// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use log::info;

use super::{mean_raw_image, printers::InfoPrinter, PipelineError};
use crate::{
    geometry::find_image_geometry,
    io::{read_exposures, save_geometry},
    Beam, InstrumentConfig,
};

#[derive(Parser, Debug)]
pub(super) struct GeometryArgs {
    /// A raw flat-field FITS file. Its exposures are averaged before the
    /// circles are found.
    #[clap(name = "FLAT_FILE", parse(from_os_str))]
    flat: PathBuf,

    /// Where to write the geometry. The extension must be toml or json. If not
    /// given, the geometry is only printed.
    #[clap(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
}

impl GeometryArgs {
    pub(super) fn run(self, config: &InstrumentConfig, dry_run: bool) -> Result<(), PipelineError> {
        let exposures = read_exposures(&self.flat)?;

        let mut printer = InfoPrinter::new("Geometry inputs".into());
        printer.push_line(format!("Flat: {}", self.flat.display()).into());
        printer.push_line(format!("{} exposures", exposures.len()).into());
        printer.push_line(
            format!(
                "Radius guesses: occulter {}, field stop {}",
                config.occulter_radius_guess, config.field_radius_guess
            )
            .into(),
        );
        if let Some(output) = &self.output {
            printer.push_line(format!("Output: {}", output.display()).into());
        }
        printer.display();

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let flat = mean_raw_image(&exposures, config)?;
        let geometry = find_image_geometry(flat.view(), config);

        let mut printer = InfoPrinter::new("Geometry".into());
        for beam in Beam::BOTH {
            let g = geometry.beam(beam);
            let (dx, dy) = g.field_offset();
            printer.push_block(vec![
                format!("{beam}").into(),
                format!("occulter {}", g.occulter).into(),
                format!("field    {}", g.field).into(),
                format!("field offset ({dx:.2}, {dy:.2})").into(),
            ]);
        }
        let (dx, dy) = geometry.beam_offset();
        printer.push_line(format!("Beam offset ({dx:.2}, {dy:.2})").into());
        printer.display();

        if let Some(output) = self.output {
            save_geometry(&output, &geometry)?;
            info!("Wrote geometry to {}", output.display());
        }
        Ok(())
    }
}
