//! Variable descriptors, ensembles and derived features.
//!
//! # Architecture
//!
//! - [`descriptor`] - Templates, provider-bound variables and aliases
//! - [`ensemble`] - Uniquely-named ordered collections with feature ordering
//! - [`features`] - Derived variables (pressure, potential temperature, sigma-t)
//! - [`units`] - Unit conversions usable as corrections
//! - [`defaults`] - Templates of the normalized schema

pub mod defaults;
pub mod descriptor;
pub mod ensemble;
pub mod features;
pub mod units;

#[cfg(test)]
pub mod tests;

pub use descriptor::{Alias, Correction, Origin, TemplateVar, Value, VarType, Variable};
pub use ensemble::VariableEnsemble;
pub use features::{Feature, PotentialTemperature, Pressure, SigmaT};
