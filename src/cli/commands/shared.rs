//! Shared components for CLI commands
//!
//! Logging setup, configuration loading, progress bars and the final
//! summary used by both subcommands.

use crate::cli::args::Args;
use crate::config::RunConfig;
use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Statistics reported at the end of a command
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Providers whose files were loaded
    pub providers_loaded: usize,
    /// Rows loaded before duplicate removal
    pub rows_loaded: usize,
    /// Rows written to disk
    pub rows_saved: usize,
    /// Files written
    pub files_written: Vec<PathBuf>,
    /// Wall time of the command
    pub processing_time: Duration,
}

impl RunSummary {
    /// Rows removed between loading and saving
    pub fn rows_removed(&self) -> usize {
        self.rows_loaded.saturating_sub(self.rows_saved)
    }
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bgc_processor={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to install the log subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to install the log subscriber")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Read the run configuration, command-line verbosity taking precedence
pub fn load_configuration(path: &Path, args: &Args) -> Result<RunConfig> {
    info!("Loading configuration from {}", path.display());
    let config = RunConfig::from_file(path)
        .with_context(|| format!("Invalid run configuration '{}'", path.display()))?;
    Ok(config.with_verbosity(args.verbosity()))
}

/// Create a progress bar with appropriate styling
pub fn create_progress_bar(total: u64, message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress template is valid")
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Print the human-readable end-of-run report
pub fn print_summary(title: &str, summary: &RunSummary) {
    println!("\n{}", title.bright_green().bold());
    println!(
        "  {} {}",
        "Providers loaded:".bright_cyan(),
        summary.providers_loaded.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Rows loaded:".bright_cyan(),
        summary.rows_loaded.to_string().bright_white().bold()
    );
    println!(
        "  {} {} ({} removed)",
        "Rows saved:".bright_cyan(),
        summary.rows_saved.to_string().bright_white().bold(),
        summary.rows_removed()
    );
    println!(
        "  {} {}",
        "Processing time:".bright_cyan(),
        HumanDuration(summary.processing_time)
    );
    if !summary.files_written.is_empty() {
        println!("\n{}", "Output files:".bright_yellow());
        for path in &summary.files_written {
            println!("  • {}", path.display());
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_rows_removed_never_underflows() {
        let summary = RunSummary {
            rows_loaded: 3,
            rows_saved: 5,
            ..Default::default()
        };
        assert_eq!(summary.rows_removed(), 0);
    }

    #[test]
    fn test_load_configuration_overrides_verbosity() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.toml");
        std::fs::write(&path, "date_min = \"2010-01-01\"\ndate_max = \"2010-01-31\"\n").unwrap();
        let args = Args::parse_from(["bgc_processor", "-q", "save", "-c", "run.toml"]);

        let config = load_configuration(&path, &args).unwrap();
        assert_eq!(config.verbosity, crate::config::Verbosity::Quiet);

        let missing = load_configuration(&temp_dir.path().join("absent.toml"), &args);
        assert!(missing.is_err());
    }

    #[test]
    fn test_hidden_progress_bar() {
        let pb = create_progress_bar(3, "Loading providers", false);
        assert!(pb.is_hidden());
    }
}
