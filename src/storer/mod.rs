//! Normalized, provider-tagged datasets.
//!
//! A [`Storer`] owns a table whose columns are the labels of its
//! [`VariableEnsemble`], plus the category and the providers that produced
//! it. Storers grow by concatenation ([`Storer::add`], [`Storer::concat`]),
//! shrink through constraints or date slicing, and are mutated in place
//! only by feature insertion and duplicate removal.
//!
//! # Architecture
//!
//! - [`slice`] - Row-index views over a storer
//! - [`dedup`] - Within- and across-provider duplicate collapsing

pub mod dedup;
pub mod slice;

#[cfg(test)]
pub mod tests;

pub use slice::Slice;

use crate::config::Verbosity;
use crate::constants::names;
use crate::constraints::Constraints;
use crate::error::{BgcError, Result};
use crate::frame;
use crate::variables::{Variable, VariableEnsemble};
use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use tracing::debug;

/// Read-only view shared by storers and slices
pub trait StorerView {
    /// Materialized rows of the view
    fn data(&self) -> Result<DataFrame>;
    fn variables(&self) -> &VariableEnsemble;
    fn category(&self) -> &str;
    fn providers(&self) -> &[String];
}

/// Normalized dataset with its schema, category and providers
#[derive(Debug, Clone)]
pub struct Storer {
    data: DataFrame,
    category: String,
    providers: Vec<String>,
    variables: VariableEnsemble,
    verbosity: Verbosity,
}

impl Storer {
    pub fn new(
        data: DataFrame,
        category: impl Into<String>,
        providers: Vec<String>,
        variables: VariableEnsemble,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            data,
            category: category.into(),
            providers,
            variables,
            verbosity,
        }
    }

    /// Zero-row storer with one typed column per variable
    pub fn empty(
        category: impl Into<String>,
        providers: Vec<String>,
        variables: VariableEnsemble,
        verbosity: Verbosity,
    ) -> Result<Self> {
        let data = frame::empty_frame(&variables)?;
        Ok(Self::new(data, category, providers, variables, verbosity))
    }

    /// Storer restricted to the rows satisfying `constraints`
    pub fn from_constraints(storer: &Storer, constraints: &Constraints) -> Result<Self> {
        Ok(Self {
            data: constraints.apply(&storer.data)?,
            ..storer.clone()
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.data
    }

    pub fn into_frame(self) -> DataFrame {
        self.data
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Concatenate two storers sharing the same schema and category
    pub fn add(self, other: Storer) -> Result<Storer> {
        if self.variables != other.variables {
            return Err(BgcError::incompatible_storers(format!(
                "variables differ ({:?} vs {:?})",
                self.variables.names(),
                other.variables.names()
            )));
        }
        if self.category != other.category {
            return Err(BgcError::incompatible_storers(format!(
                "categories differ ('{}' vs '{}')",
                self.category, other.category
            )));
        }
        let mut providers = self.providers;
        for provider in other.providers {
            if !providers.contains(&provider) {
                providers.push(provider);
            }
        }
        let labels = self.variables.labels();
        let data = frame::select_columns(&self.data, &labels)?;
        let other_data = frame::select_columns(&other.data, &labels)?;
        let data = frame::concat_frames(vec![data, other_data])?.unwrap_or_default();
        Ok(Storer {
            data,
            category: self.category,
            providers,
            variables: self.variables,
            verbosity: self.verbosity.max(other.verbosity),
        })
    }

    /// Sum every storer, `None` when the iterator is empty
    pub fn concat(storers: impl IntoIterator<Item = Storer>) -> Result<Option<Storer>> {
        let mut total: Option<Storer> = None;
        for storer in storers {
            total = Some(match total {
                Some(acc) => acc.add(storer)?,
                None => storer,
            });
        }
        Ok(total)
    }

    /// Rows dated within `[start, end]`, both ends included
    pub fn slice_on_dates(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Slice<'_>> {
        let dates = frame::datetime_values(&self.data, names::DATE)?;
        let index = dates
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_some_and(|d| d >= start && d <= end))
            .map(|(i, _)| i)
            .collect();
        Ok(Slice::new(self, index))
    }

    /// Rows with the given positions
    pub fn slice_using_index(&self, index: Vec<usize>) -> Slice<'_> {
        Slice::new(self, index)
    }

    /// Rows whose provider column equals `provider`
    pub fn slice_on_provider(&self, provider: &str) -> Result<Slice<'_>> {
        let values = frame::str_values(&self.data, names::PROVIDER)?;
        let index = values
            .iter()
            .enumerate()
            .filter(|(_, p)| p.as_deref() == Some(provider))
            .map(|(i, _)| i)
            .collect();
        Ok(Slice::new(self, index))
    }

    /// Append (or replace) a computed column described by `variable`
    pub fn add_feature(&mut self, variable: Variable, values: Vec<f64>) -> Result<()> {
        if values.len() != self.data.height() {
            return Err(BgcError::ShapeMismatch {
                expected: vec![self.data.height()],
                found: vec![values.len()],
            });
        }
        frame::set_column(&mut self.data, frame::float_column(variable.label(), values))?;
        if !self.variables.has_name(variable.name()) {
            self.variables.add_var(variable)?;
        }
        Ok(())
    }

    /// Compute every feature of the ensemble whose column is not yet present
    pub fn insert_features(&mut self) -> Result<()> {
        let available = frame::column_names(&self.data);
        let features: Vec<Variable> = self
            .variables
            .constructible_features(&available)?
            .cloned()
            .collect();
        for variable in features {
            if frame::has_column(&self.data, variable.label()) {
                continue;
            }
            let Some(feature) = variable.feature().cloned() else {
                continue;
            };
            let inputs = feature
                .required_vars()
                .iter()
                .map(|name| frame::float_values(&self.data, &self.variables.label_of(name)?))
                .collect::<Result<Vec<_>>>()?;
            let values = feature.compute(&inputs);
            debug!("Inserted feature {} ({} rows)", variable.name(), values.len());
            self.add_feature(variable, values)?;
        }
        Ok(())
    }

    /// Drop a variable from both the schema and the table
    pub fn remove_variable(&mut self, name: &str) -> Result<()> {
        let removed = self.variables.remove_var(name)?;
        self.data = frame::drop_column(&self.data, removed.label())?;
        Ok(())
    }

    pub fn set_saving_order(&mut self, var_names: &[String]) -> Result<()> {
        self.variables.set_saving_order(var_names)
    }
}

impl StorerView for Storer {
    fn data(&self) -> Result<DataFrame> {
        Ok(self.data.clone())
    }

    fn variables(&self) -> &VariableEnsemble {
        &self.variables
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn providers(&self) -> &[String] {
        &self.providers
    }
}
