//! Command-line argument definitions for the BGC processor
//!
//! The binary is thin glue over the library: `save` normalizes every
//! configured provider into range files, `match` compares saved observations
//! with a model archive provider.

use crate::config::Verbosity;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the BGC processor
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bgc_processor",
    version,
    about = "Normalize biogeochemical ocean observations and match them against model archives",
    long_about = "Loads in-situ observations and model outputs from heterogeneous providers \
                  (delimited text, NetCDF profiles, HYCOM .a/.b archives) into one normalized \
                  schema, removes duplicated measurements and saves fixed-width files split by \
                  date range. Saved observations can then be matched to their nearest model \
                  cells and interpolated in depth."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Suppress output except errors"
    )]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Load every configured provider, remove duplicates and save by date range
    Save(SaveArgs),
    /// Match saved observations against an ABFile provider and interpolate in depth
    Match(MatchArgs),
}

/// Arguments for the save command
#[derive(Debug, Clone, Parser)]
pub struct SaveArgs {
    /// TOML run configuration
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Overrides the configured saving directory
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Restrict the run to these configured providers
    #[arg(
        short = 'p',
        long = "providers",
        value_name = "NAMES",
        value_delimiter = ','
    )]
    pub providers: Option<Vec<String>>,
}

/// Arguments for the match command
#[derive(Debug, Clone, Parser)]
pub struct MatchArgs {
    /// Directory holding saved observation files
    #[arg(long = "observations", value_name = "DIR")]
    pub observations: PathBuf,

    /// TOML run configuration declaring the model provider
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Configured ABFile provider to match against
    #[arg(short = 'p', long = "provider", value_name = "NAME")]
    pub provider: String,

    /// Directory receiving the interpolated output
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: PathBuf,
}

impl Args {
    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Library verbosity matching the command-line flags
    pub fn verbosity(&self) -> Verbosity {
        match (self.quiet, self.verbose) {
            (true, _) => Verbosity::Quiet,
            (false, 0 | 1) => Verbosity::Normal,
            (false, _) => Verbosity::Detailed,
        }
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}
