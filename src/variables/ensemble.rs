//! Ordered, uniquely-named collections of variables.

use super::descriptor::{Correction, Variable};
use crate::constants::names;
use crate::error::{BgcError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Ordered set of variables keyed by name
#[derive(Debug, Clone, Default)]
pub struct VariableEnsemble {
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
    saving_order: Vec<String>,
}

impl VariableEnsemble {
    /// Build an ensemble, failing on duplicated names
    pub fn new(variables: impl IntoIterator<Item = Variable>) -> Result<Self> {
        let mut ensemble = Self::default();
        for var in variables {
            ensemble.add_var(var)?;
        }
        Ok(ensemble)
    }

    /// Append a variable, failing if its name is already used
    pub fn add_var(&mut self, var: Variable) -> Result<()> {
        if self.index.contains_key(var.name()) {
            return Err(BgcError::DuplicateVariable {
                name: var.name().to_string(),
            });
        }
        self.index.insert(var.name().to_string(), self.variables.len());
        self.variables.push(var);
        Ok(())
    }

    /// Remove a variable by name and return it
    pub fn remove_var(&mut self, name: &str) -> Result<Variable> {
        let position = self.position(name)?;
        let removed = self.variables.remove(position);
        self.index = self
            .variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name().to_string(), i))
            .collect();
        self.saving_order.retain(|n| n != name);
        Ok(removed)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| BgcError::UnknownVariable {
                name: name.to_string(),
                valid: self.names().join(", "),
            })
    }

    /// Variable with the given name
    pub fn get(&self, name: &str) -> Result<&Variable> {
        Ok(&self.variables[self.position(name)?])
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.variables.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name().to_string()).collect()
    }

    /// Column labels, in ensemble order
    pub fn labels(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|v| v.label().to_string())
            .collect()
    }

    /// Label of a variable, by name
    pub fn label_of(&self, name: &str) -> Result<String> {
        Ok(self.get(name)?.label().to_string())
    }

    /// Variables read from the source files
    pub fn in_dset(&self) -> Vec<&Variable> {
        self.variables.iter().filter(|v| v.is_in_file()).collect()
    }

    /// Variables synthesized with their default value
    pub fn not_in_dset(&self) -> Vec<&Variable> {
        self.variables
            .iter()
            .filter(|v| !v.is_in_file() && v.feature().is_none())
            .collect()
    }

    /// Variables computed from other variables
    pub fn features(&self) -> Vec<&Variable> {
        self.variables
            .iter()
            .filter(|v| v.feature().is_some())
            .collect()
    }

    /// Corrections to apply, keyed by label
    pub fn corrections(&self) -> Vec<(String, Correction)> {
        self.variables
            .iter()
            .filter_map(|v| v.correction().map(|c| (v.label().to_string(), c.clone())))
            .collect()
    }

    /// Labels whose NaN values remove the row
    pub fn to_remove_if_any_nan(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|v| v.remove_if_nan())
            .map(|v| v.label().to_string())
            .collect()
    }

    /// Labels whose simultaneous NaN values remove the row
    pub fn to_remove_if_all_nan(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|v| v.remove_if_all_nan())
            .map(|v| v.label().to_string())
            .collect()
    }

    pub fn has_provider(&self) -> bool {
        self.has_name(names::PROVIDER)
    }

    pub fn has_hour(&self) -> bool {
        self.has_name(names::HOUR)
    }

    /// Restrict and order the variables written by savers
    pub fn set_saving_order(&mut self, var_names: &[String]) -> Result<()> {
        for name in var_names {
            self.position(name)?;
        }
        self.saving_order = var_names.to_vec();
        Ok(())
    }

    /// Variables to save, in saving order (every variable when unset)
    pub fn save_variables(&self) -> Vec<&Variable> {
        if self.saving_order.is_empty() {
            return self.variables.iter().collect();
        }
        self.saving_order
            .iter()
            .filter_map(|name| self.index.get(name).map(|&i| &self.variables[i]))
            .collect()
    }

    pub fn save_labels(&self) -> Vec<String> {
        self.save_variables()
            .iter()
            .map(|v| v.label().to_string())
            .collect()
    }

    /// Space-joined name formats of the saved variables
    pub fn name_save_format(&self) -> String {
        self.save_variables()
            .iter()
            .map(|v| v.name_format())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Space-joined value formats of the saved variables
    pub fn value_save_format(&self) -> String {
        self.save_variables()
            .iter()
            .map(|v| v.value_format())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Variables a loader must materialize: every non-feature variable.
    ///
    /// Feature requirements must be resolvable from this set (possibly
    /// through other features), otherwise the ensemble is unusable.
    pub fn loading_variables(&self) -> Result<VariableEnsemble> {
        let base: Vec<Variable> = self
            .variables
            .iter()
            .filter(|v| v.feature().is_none())
            .cloned()
            .collect();
        let available: Vec<String> = base.iter().map(|v| v.label().to_string()).collect();
        self.feature_order(&available)?;
        VariableEnsemble::new(base)
    }

    /// Features in an order where each one's inputs are available beforehand.
    ///
    /// `available` lists the labels already present in the table. Every
    /// produced feature is assumed available for the following ones. Fails
    /// with the unresolved set on a cycle or a missing input.
    pub fn constructible_features(
        &self,
        available: &[String],
    ) -> Result<std::vec::IntoIter<&Variable>> {
        Ok(self.feature_order(available)?.into_iter())
    }

    fn feature_order(&self, available: &[String]) -> Result<Vec<&Variable>> {
        let features = self.features();
        let feature_names: HashSet<&str> = features.iter().map(|f| f.name()).collect();
        let available: HashSet<&str> = available.iter().map(String::as_str).collect();

        let mut pending: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut blocked: HashSet<&str> = HashSet::new();
        for feature in &features {
            let Some(definition) = feature.feature() else {
                continue;
            };
            let mut count = 0;
            for required in definition.required_vars() {
                if available.contains(required.as_str()) {
                    continue;
                }
                if feature_names.contains(required.as_str()) {
                    count += 1;
                    dependents
                        .entry(required.as_str())
                        .or_default()
                        .push(feature.name());
                } else {
                    blocked.insert(feature.name());
                }
            }
            pending.insert(feature.name(), count);
        }

        let mut ready: VecDeque<&str> = features
            .iter()
            .map(|f| f.name())
            .filter(|name| pending.get(name) == Some(&0) && !blocked.contains(name))
            .collect();
        let mut ordered = Vec::with_capacity(features.len());
        while let Some(name) = ready.pop_front() {
            if let Some(next) = dependents.get(name) {
                for dependent in next {
                    if let Some(count) = pending.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 && !blocked.contains(dependent) {
                            ready.push_back(*dependent);
                        }
                    }
                }
            }
            ordered.push(name);
        }

        if ordered.len() != features.len() {
            let done: HashSet<&str> = ordered.iter().copied().collect();
            let unresolved: Vec<&str> = features
                .iter()
                .map(|f| f.name())
                .filter(|n| !done.contains(n))
                .collect();
            return Err(BgcError::UnresolvedFeatures {
                unresolved: unresolved.join(", "),
            });
        }
        debug!("Feature construction order: {:?}", ordered);
        ordered.into_iter().map(|name| self.get(name)).collect()
    }
}

impl PartialEq for VariableEnsemble {
    fn eq(&self, other: &Self) -> bool {
        self.variables.len() == other.variables.len()
            && self
                .variables
                .iter()
                .zip(&other.variables)
                .all(|(a, b)| a == b)
    }
}

impl<'a> IntoIterator for &'a VariableEnsemble {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.iter()
    }
}
