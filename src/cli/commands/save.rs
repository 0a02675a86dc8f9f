//! Save command: load every configured provider and write range files

use super::shared::{RunSummary, create_progress_bar, load_configuration, print_summary};
use crate::cli::args::{Args, SaveArgs};
use crate::config::{ProviderConfig, RunConfig};
use crate::data_source::DataSource;
use crate::io::StorerSaver;
use crate::storer::{Storer, StorerView};
use anyhow::{Context, Result, anyhow};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::task;
use tracing::{info, warn};

/// Run the save command
pub async fn run_save(args: &Args, save_args: &SaveArgs) -> Result<RunSummary> {
    let start = Instant::now();
    let config = load_configuration(&save_args.config, args)?;
    let providers = selected_providers(&config, save_args.providers.as_deref())?;
    if providers.is_empty() {
        warn!("No provider configured, nothing to save");
        return Ok(RunSummary::default());
    }
    let saving_dir = save_args
        .output
        .clone()
        .unwrap_or_else(|| config.saving_dir.clone());
    let generator = config.date_ranges()?;

    let storers = load_providers(&config, providers, args.show_progress()).await?;
    let mut summary = RunSummary {
        providers_loaded: storers.len(),
        rows_loaded: storers.iter().map(Storer::height).sum(),
        ..Default::default()
    };

    let saver = StorerSaver::new(config.aggregate, config.verbosity);
    for (category, group) in group_by_category(storers) {
        let Some(mut storer) = Storer::concat(group)? else {
            continue;
        };
        storer
            .remove_duplicates(&config.priority)
            .with_context(|| format!("Failed to remove duplicates of category '{}'", category))?;
        if !config.variables.is_empty() {
            storer.set_saving_order(&config.variables)?;
        }
        summary.rows_saved += storer.height();
        let written = saver
            .save_from_daterange(&storer, &generator, &saving_dir)
            .with_context(|| format!("Failed to save category '{}'", category))?;
        info!("Category '{}': {} files written", category, written.len());
        summary.files_written.extend(written);
    }

    summary.processing_time = start.elapsed();
    if args.show_progress() {
        print_summary("Save complete", &summary);
    }
    Ok(summary)
}

/// Configured providers, optionally restricted to `names`
fn selected_providers(
    config: &RunConfig,
    names: Option<&[String]>,
) -> Result<Vec<(String, ProviderConfig)>> {
    match names {
        None => Ok(config
            .providers
            .iter()
            .map(|(name, provider)| (name.clone(), provider.clone()))
            .collect()),
        Some(names) => names
            .iter()
            .map(|name| Ok((name.clone(), config.provider(name)?.clone())))
            .collect(),
    }
}

/// Load every provider on the blocking pool, at most one per core at a time
async fn load_providers(
    config: &RunConfig,
    providers: Vec<(String, ProviderConfig)>,
    show_progress: bool,
) -> Result<Vec<Storer>> {
    let pb = create_progress_bar(providers.len() as u64, "Loading providers", show_progress);
    let constraints = config.constraints();
    let verbosity = config.verbosity;
    let concurrency = num_cpus::get().max(1);

    let results: Vec<Result<Storer>> = stream::iter(providers)
        .map(|(name, provider)| {
            let constraints = constraints.clone();
            async move {
                let loaded = task::spawn_blocking(move || -> Result<Storer> {
                    let source = DataSource::for_provider(&name, &provider, verbosity)
                        .with_context(|| format!("Invalid provider '{}'", name))?;
                    source
                        .load_all(&constraints)
                        .with_context(|| format!("Failed to load provider '{}'", name))
                })
                .await;
                match loaded {
                    Ok(result) => result,
                    Err(e) => Err(anyhow!("Loading task panicked: {}", e)),
                }
            }
        })
        .buffer_unordered(concurrency)
        .inspect(|_| pb.inc(1))
        .collect()
        .await;
    pb.finish_with_message("Providers loaded");

    results.into_iter().collect()
}

/// Storers sharing a category, which are the only ones that can be summed
fn group_by_category(storers: Vec<Storer>) -> BTreeMap<String, Vec<Storer>> {
    let mut groups: BTreeMap<String, Vec<Storer>> = BTreeMap::new();
    for storer in storers {
        groups
            .entry(storer.category().to_string())
            .or_default()
            .push(storer);
    }
    groups
}
