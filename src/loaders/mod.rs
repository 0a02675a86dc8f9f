//! Provider file loaders.
//!
//! Every loader turns one raw provider file into a table whose columns are
//! the labels of the provider's loading variables (every non-feature
//! variable of its ensemble), then the shared [`Loader::load_all`] wraps
//! each file into a [`Storer`], computes the features and sums the storers.
//!
//! # Architecture
//!
//! - [`patterns`] - Year-restricted file name patterns
//! - [`csv`] - Delimited text files
//! - [`netcdf`] - Gridded binary files behind the [`netcdf::GriddedSource`] seam
//! - [`abfile`] - HYCOM `.a`/`.b` archives, full-grid and mask-restricted

pub mod abfile;
pub mod csv;
pub mod netcdf;
pub mod patterns;

#[cfg(test)]
pub mod tests;

pub use abfile::{ABFileLoader, SelectiveABFileLoader};
pub use csv::CsvLoader;
pub use netcdf::NetCDFLoader;
pub use patterns::FileNamePattern;

use crate::config::Verbosity;
use crate::constants::names;
use crate::constraints::Constraints;
use crate::error::Result;
use crate::frame;
use crate::io::{DateRangeGenerator, StorerSaver};
use crate::progress;
use crate::storer::Storer;
use crate::variables::{VarType, Variable, VariableEnsemble};
use chrono::{Datelike, NaiveDateTime, Timelike};
use polars::prelude::DataFrame;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// State shared by every loader
#[derive(Debug, Clone)]
pub struct LoaderBase {
    pub provider: String,
    pub dirin: PathBuf,
    pub category: String,
    pub exclude: Vec<String>,
    pub files_pattern: FileNamePattern,
    variables: VariableEnsemble,
    loading: VariableEnsemble,
    pub verbosity: Verbosity,
}

impl LoaderBase {
    /// Fails when the ensemble features cannot be resolved from its variables
    pub fn new(
        provider: impl Into<String>,
        dirin: impl Into<PathBuf>,
        category: impl Into<String>,
        exclude: Vec<String>,
        files_pattern: FileNamePattern,
        variables: VariableEnsemble,
        verbosity: Verbosity,
    ) -> Result<Self> {
        let loading = variables.loading_variables()?;
        Ok(Self {
            provider: provider.into(),
            dirin: dirin.into(),
            category: category.into(),
            exclude,
            files_pattern,
            variables,
            loading,
            verbosity,
        })
    }

    /// Full ensemble, features included
    pub fn variables(&self) -> &VariableEnsemble {
        &self.variables
    }

    /// Variables materialized by `load`
    pub fn loading_variables(&self) -> &VariableEnsemble {
        &self.loading
    }

    /// Label of the date variable, if the ensemble has one
    pub fn date_label(&self) -> Option<String> {
        self.variables.label_of(names::DATE).ok()
    }

    /// Files of the input directory matching the pattern for the active date constraint
    pub fn select_files(&self, constraints: &Constraints) -> Result<Vec<PathBuf>> {
        let parameters = match self.date_label() {
            Some(label) => constraints.get_constraint_parameters(&label),
            None => Default::default(),
        };
        self.files_pattern
            .with_years(&parameters)?
            .select_matching_filepath(&self.dirin, &self.exclude)
    }

    /// Storer of one loaded table
    pub fn storer(&self, data: DataFrame) -> Storer {
        Storer::new(
            data,
            self.category.clone(),
            vec![self.provider.clone()],
            self.variables.clone(),
            self.verbosity,
        )
    }

    /// Zero-row storer of the full ensemble
    pub fn empty_storer(&self) -> Result<Storer> {
        Storer::empty(
            self.category.clone(),
            vec![self.provider.clone()],
            self.variables.clone(),
            self.verbosity,
        )
    }

    /// Shared tail of every `load`: missing columns, types, defaults,
    /// corrections, column order, constraints and NaN-row policy
    pub fn finalize(&self, df: DataFrame, constraints: &Constraints) -> Result<DataFrame> {
        self.finalize_keeping(df, constraints, &[])
    }

    /// [`LoaderBase::finalize`], keeping the `extra` columns after the variables
    pub fn finalize_keeping(
        &self,
        mut df: DataFrame,
        constraints: &Constraints,
        extra: &[&str],
    ) -> Result<DataFrame> {
        fill_missing_columns(&mut df, &self.loading, &self.provider)?;
        for var in self.loading.iter() {
            frame::cast_to_type(&mut df, var)?;
        }
        apply_defaults(&mut df, &self.loading)?;
        correct(&mut df, &self.loading)?;
        let mut labels = self.loading.labels();
        labels.extend(extra.iter().map(|e| e.to_string()));
        let df = frame::select_columns(&df, &labels)?;
        let df = constraints.apply(&df)?;
        remove_nan_rows(&df, &self.loading)
    }
}

/// Reads a provider's files into normalized tables
pub trait Loader: Send + Sync + fmt::Debug {
    fn base(&self) -> &LoaderBase;

    /// Load one file into a table of the loading variables
    fn load(&self, path: &Path, constraints: &Constraints) -> Result<DataFrame>;

    /// Files to load for the given constraints
    fn select_files(&self, constraints: &Constraints) -> Result<Vec<PathBuf>> {
        self.base().select_files(constraints)
    }

    fn provider(&self) -> &str {
        &self.base().provider
    }

    fn category(&self) -> &str {
        &self.base().category
    }

    fn variables(&self) -> &VariableEnsemble {
        self.base().variables()
    }

    fn verbosity(&self) -> Verbosity {
        self.base().verbosity
    }

    /// Load one file into a storer with its features computed
    fn load_storer(&self, path: &Path, constraints: &Constraints) -> Result<Storer> {
        let data = self.load(path, constraints)?;
        progress!(
            self.verbosity().is_detailed(),
            "{}: {} rows from {}",
            self.provider(),
            data.height(),
            path.display()
        );
        let mut storer = self.base().storer(data);
        storer.insert_features()?;
        Ok(storer)
    }

    /// Load and sum every selected file; an empty storer when none matched
    fn load_all(&self, constraints: &Constraints) -> Result<Storer> {
        let files = self.select_files(constraints)?;
        progress!(
            self.verbosity().is_verbose(),
            "{}: loading {} files",
            self.provider(),
            files.len()
        );
        let storers = files
            .iter()
            .map(|path| self.load_storer(path, constraints))
            .collect::<Result<Vec<_>>>()?;
        match Storer::concat(storers)? {
            Some(storer) => Ok(storer),
            None => self.base().empty_storer(),
        }
    }

    /// Load every selected file and save it right away, file by file
    fn load_and_save(
        &self,
        saver: &StorerSaver,
        generator: &DateRangeGenerator,
        dir: &Path,
        constraints: &Constraints,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for path in self.select_files(constraints)? {
            let storer = self.load_storer(&path, constraints)?;
            for saved in saver.save_from_daterange(&storer, generator, dir)? {
                if !written.contains(&saved) {
                    written.push(saved);
                }
            }
        }
        Ok(written)
    }
}

/// Add a default-valued column for every variable the table lacks.
///
/// The provider column is filled with the provider name unless the
/// variable carries its own non-empty default.
pub fn fill_missing_columns(
    df: &mut DataFrame,
    variables: &VariableEnsemble,
    provider: &str,
) -> Result<()> {
    let height = df.height();
    for var in variables.iter() {
        if frame::has_column(df, var.label()) {
            continue;
        }
        let column = if var.name() == names::PROVIDER
            && var.default_value().as_string().is_none_or(|s| s.is_empty())
        {
            frame::str_column(var.label(), vec![Some(provider.to_string()); height])
        } else {
            frame::default_column(var, height)?
        };
        frame::set_column(df, column)?;
    }
    Ok(())
}

/// Replace missing values with each variable's default
pub fn apply_defaults(df: &mut DataFrame, variables: &VariableEnsemble) -> Result<()> {
    for var in variables.iter() {
        let label = var.label();
        if !frame::has_column(df, label) {
            continue;
        }
        let default = var.default_value();
        match var.var_type() {
            VarType::Float => {
                let fill = default.as_f64();
                if fill.is_nan() {
                    continue;
                }
                let values = frame::float_values(df, label)?
                    .into_iter()
                    .map(|v| if v.is_nan() { fill } else { v })
                    .collect();
                frame::set_column(df, frame::float_column(label, values))?;
            }
            VarType::Int => {
                let Some(fill) = default.as_i64() else {
                    continue;
                };
                let values = frame::int_values(df, label)?
                    .into_iter()
                    .map(|v| v.or(Some(fill)))
                    .collect();
                frame::set_column(df, frame::int_column(label, values))?;
            }
            VarType::Str => {
                let Some(fill) = default.as_string().filter(|s| !s.is_empty()) else {
                    continue;
                };
                let values = frame::str_values(df, label)?
                    .into_iter()
                    .map(|v| match v {
                        Some(s) if !s.is_empty() => Some(s),
                        _ => Some(fill.clone()),
                    })
                    .collect();
                frame::set_column(df, frame::str_column(label, values))?;
            }
            VarType::Datetime => {}
        }
    }
    Ok(())
}

/// Apply every variable correction; NaN stays NaN
pub fn correct(df: &mut DataFrame, variables: &VariableEnsemble) -> Result<()> {
    for (label, correction) in variables.corrections() {
        if !frame::has_column(df, &label) {
            continue;
        }
        let values = frame::float_values(df, &label)?
            .into_iter()
            .map(|v| if v.is_nan() { v } else { correction(v) })
            .collect();
        frame::set_column(df, frame::float_column(&label, values))?;
    }
    Ok(())
}

fn missing_mask(df: &DataFrame, var: &Variable) -> Result<Vec<bool>> {
    let label = var.label();
    Ok(match var.var_type() {
        VarType::Float => frame::float_values(df, label)?
            .iter()
            .map(|v| v.is_nan())
            .collect(),
        VarType::Int => frame::int_values(df, label)?
            .iter()
            .map(Option::is_none)
            .collect(),
        VarType::Str => frame::str_values(df, label)?
            .iter()
            .map(|v| v.as_deref().is_none_or(str::is_empty))
            .collect(),
        VarType::Datetime => frame::datetime_values(df, label)?
            .iter()
            .map(Option::is_none)
            .collect(),
    })
}

/// Drop rows where any "any" variable is missing or every "all" variable is missing
pub fn remove_nan_rows(df: &DataFrame, variables: &VariableEnsemble) -> Result<DataFrame> {
    let height = df.height();
    let mut keep = vec![true; height];

    for var in variables.iter().filter(|v| v.remove_if_nan()) {
        if !frame::has_column(df, var.label()) {
            continue;
        }
        for (k, missing) in keep.iter_mut().zip(missing_mask(df, var)?) {
            *k = *k && !missing;
        }
    }

    let all_vars: Vec<&Variable> = variables
        .iter()
        .filter(|v| v.remove_if_all_nan() && frame::has_column(df, v.label()))
        .collect();
    if !all_vars.is_empty() {
        let mut all_missing = vec![true; height];
        for var in all_vars {
            for (a, missing) in all_missing.iter_mut().zip(missing_mask(df, var)?) {
                *a = *a && missing;
            }
        }
        for (k, missing) in keep.iter_mut().zip(all_missing) {
            *k = *k && !missing;
        }
    }

    let kept = frame::filter_rows(df, &keep)?;
    if kept.height() != height {
        debug!("Removed {} rows with missing values", height - kept.height());
    }
    Ok(kept)
}

/// Set DATE and the calendar columns the ensemble declares from parsed dates
pub fn set_calendar_columns(
    df: &mut DataFrame,
    variables: &VariableEnsemble,
    dates: &[Option<NaiveDateTime>],
) -> Result<()> {
    if let Ok(label) = variables.label_of(names::DATE) {
        frame::set_column(df, frame::datetime_column(&label, dates)?)?;
    }
    let parts: [(&str, fn(&NaiveDateTime) -> i64); 4] = [
        (names::YEAR, |d| d.year() as i64),
        (names::MONTH, |d| d.month() as i64),
        (names::DAY, |d| d.day() as i64),
        (names::HOUR, |d| d.hour() as i64),
    ];
    for (name, part) in parts {
        let Ok(label) = variables.label_of(name) else {
            continue;
        };
        let values = dates.iter().map(|d| d.as_ref().map(part)).collect();
        frame::set_column(df, frame::int_column(&label, values))?;
    }
    Ok(())
}
