//! Tests for variable descriptors, ensembles and features

pub mod ensemble_tests;

use super::{Alias, TemplateVar, VarType, Variable};

/// Helper to build a float variable read from a column of the same name
pub fn float_in_file(name: &str) -> Variable {
    TemplateVar::new(name, "[]", VarType::Float).in_file_as([name])
}

/// Helper to build a flagged float variable
pub fn flagged_in_file(name: &str, column: &str, flag: &str, accepted: &[i64]) -> Variable {
    TemplateVar::new(name, "[]", VarType::Float).in_file_as([Alias::flagged(column, flag, accepted)])
}
