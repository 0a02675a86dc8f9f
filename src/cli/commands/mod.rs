//! Command implementations for the BGC processor CLI
//!
//! Each subcommand lives in its own module:
//! - `save`: load every configured provider, remove duplicates and save by date range
//! - `matching`: match saved observations against a model archive provider

pub mod matching;
pub mod save;
pub mod shared;

pub use shared::RunSummary;

use crate::cli::args::{Args, Commands};
use anyhow::Result;

/// Main command runner: installs logging and dispatches to the subcommand
pub async fn run(args: Args) -> Result<RunSummary> {
    shared::setup_logging(&args)?;
    match &args.command {
        Commands::Save(save_args) => save::run_save(&args, save_args).await,
        Commands::Match(match_args) => matching::run_match(&args, match_args).await,
    }
}
