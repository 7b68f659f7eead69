// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for subcommands are
//! contained in modules.
//!
//! Only 3 things should be public in this module: `Comp`, `Comp::run`, and
//! `PipelineError`.

mod error;
mod geometry;
mod mask;
mod printers;
mod register;
mod wavecal;

pub use error::PipelineError;

use std::path::PathBuf;

use clap::{AppSettings, Args, Parser, Subcommand};
use is_terminal::IsTerminal;
use log::{debug, info};
use ndarray::prelude::*;

use crate::{registration::RawExposure, InstrumentConfig, PROGRESS_BARS};

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = "Geometric and wavelength calibration for the CoMP solar coronagraph"
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Comp {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that arguments were correctly ingested and print out
    /// high-level information.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// A toml or json file describing the instrument. Anything not in the file
    /// takes its default value.
    #[clap(long, parse(from_os_str))]
    #[clap(global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(alias = "find-geometry")]
    #[clap(about = "Find the occulter and field-stop circles of both beams in a flat.")]
    Geometry(geometry::GeometryArgs),

    #[clap(about = "Build the mask of a centred single-beam image.")]
    Mask(mask::MaskArgs),

    #[clap(
        about = "Extract both beams of raw exposures, correct their distortion, rotate them to solar north and centre the occulter."
    )]
    Register(register::RegisterArgs),

    #[clap(alias = "wavelength-calibrate")]
    #[clap(about = "Fit the wavelength scans of a day's flats and work out their corrections.")]
    Wavecal(wavecal::WavecalArgs),
}

impl Comp {
    pub fn run(self) -> Result<(), PipelineError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
            config,
        } = self.global_opts;
        setup_logging(verbosity)?;
        // Enable progress bars if the user didn't say "no progress bars" and
        // there's somewhere to draw them.
        if !no_progress_bars && std::io::stdout().is_terminal() {
            PROGRESS_BARS.store(true);
        }

        let sub_command = match &self.command {
            Command::Geometry(_) => "geometry",
            Command::Mask(_) => "mask",
            Command::Register(_) => "register",
            Command::Wavecal(_) => "wavecal",
        };
        info!("comp {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        let config = match config {
            Some(file) => {
                info!("Using instrument config {}", file.display());
                InstrumentConfig::from_file(file)?
            }
            None => {
                debug!("Using the default instrument config");
                InstrumentConfig::default()
            }
        };

        match self.command {
            Command::Geometry(args) => args.run(&config, dry_run)?,
            Command::Mask(args) => args.run(&config, dry_run)?,
            Command::Register(args) => args.run(&config, dry_run)?,
            Command::Wavecal(args) => args.run(&config, dry_run)?,
        }

        info!("comp {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}

/// The pixel-wise mean of exposures' images. All images must have the
/// instrument's raw frame size.
fn mean_raw_image(
    exposures: &[RawExposure],
    config: &InstrumentConfig,
) -> Result<Array2<f32>, PipelineError> {
    let dim = (config.raw_size, config.raw_size);
    if exposures.is_empty() {
        return Err(PipelineError::Input("No exposures to average".to_string()));
    }
    let mut sum = Array2::<f64>::zeros(dim);
    for (i, exposure) in exposures.iter().enumerate() {
        if exposure.image.dim() != dim {
            let (ny, nx) = exposure.image.dim();
            return Err(PipelineError::Input(format!(
                "Exposure {i} is {nx}x{ny}, but raw frames are {0}x{0}",
                config.raw_size
            )));
        }
        sum.zip_mut_with(&exposure.image, |s, &v| *s += f64::from(v));
    }
    let n = exposures.len() as f64;
    Ok(sum.mapv(|s| (s / n) as f32))
}
