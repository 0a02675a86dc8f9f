//! Match command: compare saved observations with a model archive provider

use super::shared::{RunSummary, load_configuration, print_summary};
use crate::cli::args::{Args, MatchArgs};
use crate::config::Verbosity;
use crate::constraints::Constraints;
use crate::data_source::selective_loader;
use crate::interpolation::Interpolator;
use crate::io::{Reader, StorerSaver};
use crate::loaders::SelectiveABFileLoader;
use crate::matching::SelectiveDataSource;
use crate::providers;
use crate::storer::Storer;
use anyhow::{Context, Result, anyhow, bail};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;
use tracing::info;

/// Run the match command
pub async fn run_match(args: &Args, match_args: &MatchArgs) -> Result<RunSummary> {
    let start = Instant::now();
    let config = load_configuration(&match_args.config, args)?;
    let provider_config = config.provider(&match_args.provider)?.clone();
    let variables = providers::definition(&match_args.provider)?.variables()?;
    let loader = selective_loader(
        &match_args.provider,
        &provider_config,
        variables,
        config.verbosity,
    )?;

    let output = match_args
        .output
        .join(format!("{}_matched.txt", match_args.provider));
    if output.exists() {
        bail!(
            "Output file '{}' already exists, refusing to append to it",
            output.display()
        );
    }
    let paths = observation_files(&match_args.observations)?;
    info!(
        "Matching {} observation files against {}",
        paths.len(),
        match_args.provider
    );

    let constraints = config.constraints();
    let verbosity = config.verbosity;
    let target = output.clone();
    let (rows_loaded, rows_saved) = task::spawn_blocking(move || -> Result<(usize, usize)> {
        let observations = Reader::new(paths, verbosity)
            .read()
            .context("Failed to read the observations")?;
        let interpolated = match_observations(loader, &observations, &constraints, verbosity)?;
        StorerSaver::new(true, verbosity).save_all_storer(&interpolated, &target)?;
        Ok((observations.height(), interpolated.height()))
    })
    .await
    .map_err(|e| anyhow!("Matching task panicked: {}", e))??;

    let summary = RunSummary {
        providers_loaded: 1,
        rows_loaded,
        rows_saved,
        files_written: if rows_saved > 0 { vec![output] } else { Vec::new() },
        processing_time: start.elapsed(),
    };
    if args.show_progress() {
        print_summary("Match complete", &summary);
    }
    Ok(summary)
}

/// Load the model cells nearest to `observations` and interpolate them to the observed depths
pub fn match_observations(
    loader: SelectiveABFileLoader,
    observations: &Storer,
    constraints: &Constraints,
    verbosity: Verbosity,
) -> Result<Storer> {
    let source = SelectiveDataSource::new(loader, observations, verbosity);
    let simulations = source
        .load_all(constraints)
        .context("Failed to load the matched model cells")?;
    let interpolated = Interpolator::new(verbosity)
        .interpolate(observations, &simulations)
        .context("Failed to interpolate the model cells")?;
    Ok(interpolated)
}

/// Saved files under `dir`, sorted
fn observation_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Observation directory '{}' does not exist", dir.display());
    }
    let pattern = dir.join("**").join("*.*");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow!("Non UTF-8 path '{}'", dir.display()))?;
    let mut paths: Vec<PathBuf> = glob::glob(pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == "txt" || ext == "csv")
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("No saved observation file under '{}'", dir.display());
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_observation_files_are_recursive_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("ARGO");
        std::fs::create_dir_all(&nested).unwrap();
        for path in [
            temp_dir.path().join("bgc_in_situ_b.txt"),
            temp_dir.path().join("notes.md"),
            nested.join("nutrients_ARGO_a.csv"),
        ] {
            std::fs::write(path, "").unwrap();
        }
        let files = observation_files(temp_dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                nested.join("nutrients_ARGO_a.csv"),
                temp_dir.path().join("bgc_in_situ_b.txt"),
            ]
        );
    }

    #[test]
    fn test_missing_observation_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(observation_files(&temp_dir.path().join("absent")).is_err());
        assert!(observation_files(temp_dir.path()).is_err());
    }
}
