//! Duplicate collapsing.
//!
//! Two passes over the identity key (provider, expocode, date, calendar
//! fields and position, restricted to the labels present in the ensemble):
//!
//! 1. rows of one provider sharing the whole key are averaged into one row
//!    (float columns only, NaN ignored; other columns keep the first row);
//! 2. rows of different providers sharing the key without provider and date
//!    are reduced to the row of the preferred provider.
//!
//! Providers listed in the priority come first, in list order. Unlisted
//! providers follow in lexicographic order, and rows of one provider keep
//! their table order. Running the procedure twice equals running it once.

use super::Storer;
use crate::constants::{DUPLICATE_KEY, names};
use crate::error::Result;
use crate::frame;
use crate::progress;
use polars::prelude::{DataFrame, DataType};
use std::collections::HashMap;

impl Storer {
    /// Collapse duplicated rows, preferring providers in `priority` order
    pub fn remove_duplicates(&mut self, priority: &[String]) -> Result<()> {
        let before = self.data.height();
        let key = self.identity_key();
        let averaged = average_groups(&self.data, &key)?;

        let cross_key: Vec<String> = key
            .iter()
            .filter(|k| k.as_str() != names::PROVIDER && k.as_str() != names::DATE)
            .cloned()
            .collect();
        self.data = if frame::has_column(&averaged, names::PROVIDER) && !cross_key.is_empty() {
            keep_preferred_provider(&averaged, &cross_key, priority)?
        } else {
            averaged
        };
        progress!(
            self.verbosity.is_verbose(),
            "Removed {} duplicated rows ({} remaining)",
            before - self.data.height(),
            self.data.height()
        );
        Ok(())
    }

    fn identity_key(&self) -> Vec<String> {
        DUPLICATE_KEY
            .iter()
            .filter(|name| self.variables.has_name(name))
            .filter_map(|name| self.variables.label_of(name).ok())
            .filter(|label| frame::has_column(&self.data, label))
            .collect()
    }
}

/// Group row positions by key, groups ordered by first occurrence
fn group_rows(df: &DataFrame, key: &[String]) -> Result<Vec<Vec<usize>>> {
    let keys = frame::row_keys(df, key)?;
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (row, k) in keys.iter().enumerate() {
        match positions.get(k.as_str()) {
            Some(&group) => groups[group].push(row),
            None => {
                positions.insert(k.as_str(), groups.len());
                groups.push(vec![row]);
            }
        }
    }
    Ok(groups)
}

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

fn average_groups(df: &DataFrame, key: &[String]) -> Result<DataFrame> {
    if key.is_empty() || df.height() == 0 {
        return Ok(df.clone());
    }
    let groups = group_rows(df, key)?;
    if groups.len() == df.height() {
        return Ok(df.clone());
    }
    let first_rows: Vec<usize> = groups.iter().map(|g| g[0]).collect();
    let mut collapsed = frame::take_rows(df, &first_rows)?;

    for name in frame::column_names(df) {
        if key.contains(&name) || frame::dtype_of(df, &name)? != DataType::Float64 {
            continue;
        }
        let values = frame::float_values(df, &name)?;
        let means: Vec<f64> = groups
            .iter()
            .map(|group| {
                if group.len() == 1 {
                    values[group[0]]
                } else {
                    nan_mean(group.iter().map(|&row| values[row]))
                }
            })
            .collect();
        frame::set_column(&mut collapsed, frame::float_column(&name, means))?;
    }
    Ok(collapsed)
}

/// Rank of a provider: listed providers by position, then the others by name
fn provider_rank(provider: &str, priority: &[String]) -> (usize, String) {
    match priority.iter().position(|p| p == provider) {
        Some(position) => (position, String::new()),
        None => (priority.len(), provider.to_string()),
    }
}

fn keep_preferred_provider(
    df: &DataFrame,
    key: &[String],
    priority: &[String],
) -> Result<DataFrame> {
    let groups = group_rows(df, key)?;
    if groups.len() == df.height() {
        return Ok(df.clone());
    }
    let providers = frame::str_values(df, names::PROVIDER)?;
    let provider_of = |row: usize| providers[row].as_deref().unwrap_or_default();
    let mut kept: Vec<usize> = Vec::with_capacity(df.height());
    for group in &groups {
        // rows of a single provider differ by date and were kept by the first pass
        let first = provider_of(group[0]);
        if group.iter().all(|&row| provider_of(row) == first) {
            kept.extend_from_slice(group);
            continue;
        }
        if let Some(best) = group
            .iter()
            .copied()
            .min_by_key(|&row| (provider_rank(provider_of(row), priority), row))
        {
            kept.push(best);
        }
    }
    kept.sort_unstable();
    frame::take_rows(df, &kept)
}
