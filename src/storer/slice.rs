//! Row-index views over a storer.

use super::{Storer, StorerView};
use crate::error::{BgcError, Result};
use crate::frame;
use crate::variables::VariableEnsemble;
use polars::prelude::DataFrame;
use std::collections::BTreeSet;

/// Subset of a storer's rows, materialized on demand
#[derive(Debug, Clone)]
pub struct Slice<'a> {
    storer: &'a Storer,
    index: Vec<usize>,
}

impl<'a> Slice<'a> {
    pub fn new(storer: &'a Storer, index: Vec<usize>) -> Self {
        Self { storer, index }
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Union of two slices of the same storer, in row order
    pub fn add(&self, other: &Slice<'a>) -> Result<Slice<'a>> {
        if !std::ptr::eq(self.storer, other.storer) {
            return Err(BgcError::incompatible_storers(
                "slices come from different storers",
            ));
        }
        let union: BTreeSet<usize> = self.index.iter().chain(&other.index).copied().collect();
        Ok(Slice::new(self.storer, union.into_iter().collect()))
    }

    /// Owned storer holding the sliced rows
    pub fn to_storer(&self) -> Result<Storer> {
        Ok(Storer::new(
            self.data()?,
            self.storer.category(),
            self.storer.providers().to_vec(),
            self.storer.variables().clone(),
            self.storer.verbosity(),
        ))
    }
}

impl StorerView for Slice<'_> {
    fn data(&self) -> Result<DataFrame> {
        frame::take_rows(self.storer.frame(), &self.index)
    }

    fn variables(&self) -> &VariableEnsemble {
        self.storer.variables()
    }

    fn category(&self) -> &str {
        self.storer.category()
    }

    fn providers(&self) -> &[String] {
        self.storer.providers()
    }
}
