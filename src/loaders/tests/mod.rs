//! Tests for the provider loaders

pub mod abfile_tests;
pub mod csv_tests;

use crate::config::Verbosity;
use crate::constants::names;
use crate::loaders::{FileNamePattern, LoaderBase};
use crate::variables::defaults::template;
use crate::variables::{Alias, VariableEnsemble};
use std::fs;
use std::path::{Path, PathBuf};

/// Helper to build a loader base over `dir`
pub fn base(dir: &Path, provider: &str, pattern: &str, variables: VariableEnsemble) -> LoaderBase {
    LoaderBase::new(
        provider,
        dir,
        "in_situ",
        Vec::new(),
        FileNamePattern::new(pattern),
        variables,
        Verbosity::Quiet,
    )
    .unwrap()
}

pub fn write_text(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Ensemble reading a bottle file with a flagged salinity
pub fn bottle_ensemble() -> VariableEnsemble {
    VariableEnsemble::new([
        template(names::PROVIDER).unwrap().not_in_file(),
        template(names::EXPOCODE).unwrap().in_file_as(["EXPOCODE"]),
        template(names::DATE).unwrap().not_in_file(),
        template(names::YEAR).unwrap().in_file_as(["YEAR"]),
        template(names::MONTH).unwrap().in_file_as(["MONTH"]),
        template(names::DAY).unwrap().in_file_as(["DAY"]),
        template(names::HOUR).unwrap().not_in_file(),
        template(names::LATITUDE).unwrap().in_file_as(["LATITUDE"]),
        template(names::LONGITUDE).unwrap().in_file_as(["LONGITUDE"]),
        template(names::DEPTH)
            .unwrap()
            .in_file_as(["DEPTH"])
            .remove_when_nan()
            .correct_with(|x| -x),
        template(names::SALINITY)
            .unwrap()
            .in_file_as([Alias::flagged("SALNTY", "SALNTY_FLAG", &[2])]),
        template(names::NITRATE)
            .unwrap()
            .in_file_as(["NITRAT"])
            .remove_when_all_nan(),
        template(names::PHOSPHATE)
            .unwrap()
            .in_file_as(["PHSPHT"])
            .remove_when_all_nan(),
        template(names::CHLOROPHYLL).unwrap().not_in_file(),
    ])
    .unwrap()
}
