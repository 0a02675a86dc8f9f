//! File name patterns restricted by date constraints.
//!
//! A provider pattern is a regex template holding a `{years}` placeholder,
//! e.g. `glodapv2_({years}).csv`. Before listing a directory, the
//! placeholder is replaced by the alternation of the years an active date
//! constraint allows, so archives of other years are never opened.

use crate::constants::{ANY_YEAR_PATTERN, YEARS_PLACEHOLDER};
use crate::constraints::{ConstraintParameters, ConstraintValue};
use crate::error::{BgcError, Result};
use chrono::{Datelike, NaiveDateTime};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Regex template of a provider's file names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNamePattern {
    template: String,
}

impl FileNamePattern {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Matcher for the years allowed by a date constraint
    pub fn with_years(&self, date_constraint: &ConstraintParameters) -> Result<PatternMatcher> {
        let years = match allowed_years(date_constraint)? {
            Some(years) if !years.is_empty() => format!(
                "({})",
                years
                    .iter()
                    .map(i32::to_string)
                    .collect::<Vec<_>>()
                    .join("|")
            ),
            Some(_) => {
                // The constraint excludes every year: nothing can match
                return PatternMatcher::new(r"[^\s\S]");
            }
            None => ANY_YEAR_PATTERN.to_string(),
        };
        PatternMatcher::new(&self.template.replace(YEARS_PLACEHOLDER, &years))
    }
}

fn as_date(value: &ConstraintValue, side: &str) -> Result<NaiveDateTime> {
    value.as_date().ok_or_else(|| {
        BgcError::invalid_date_constraint(format!(
            "{} bound {:?} is not a date",
            side, value
        ))
    })
}

/// Years allowed by the constraint, `None` when every year is allowed
fn allowed_years(constraint: &ConstraintParameters) -> Result<Option<BTreeSet<i32>>> {
    let range = match &constraint.boundary {
        Some(boundary) => {
            let min = boundary.min.as_ref().map(|v| as_date(v, "min")).transpose()?;
            let max = boundary.max.as_ref().map(|v| as_date(v, "max")).transpose()?;
            match (min, max) {
                (Some(min), Some(max)) => Some((min.year(), max.year())),
                _ => None,
            }
        }
        None => None,
    };
    let superset = constraint
        .superset
        .as_ref()
        .map(|values| {
            values
                .iter()
                .map(|v| as_date(v, "superset").map(|d| d.year()))
                .collect::<Result<BTreeSet<i32>>>()
        })
        .transpose()?;

    Ok(match (range, superset) {
        (Some((start, end)), Some(years)) => Some(
            years
                .into_iter()
                .filter(|y| (start..=end).contains(y))
                .collect(),
        ),
        (Some((start, end)), None) => Some((start..=end).collect()),
        (None, Some(years)) => Some(years),
        (None, None) => None,
    })
}

/// Compiled pattern matching whole file names
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(&format!("^(?:{})$", pattern))?,
        })
    }

    /// Whether the whole file name matches
    pub fn matches(&self, filename: &str) -> bool {
        self.regex.is_match(filename)
    }

    /// Matching, non-excluded files of `dir`, sorted
    pub fn select_matching_filepath(&self, dir: &Path, exclude: &[String]) -> Result<Vec<PathBuf>> {
        let pattern = dir.join("*.*");
        let mut selected = Vec::new();
        for entry in glob::glob(&pattern.to_string_lossy())? {
            let Ok(path) = entry else {
                continue;
            };
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !self.matches(&name) || is_excluded(&path, exclude) {
                continue;
            }
            selected.push(path);
        }
        selected.sort();
        debug!(
            "{} files matching {} in {}",
            selected.len(),
            self.regex.as_str(),
            dir.display()
        );
        Ok(selected)
    }
}

/// Excluded by full path, file name or file stem
pub fn is_excluded(path: &Path, exclude: &[String]) -> bool {
    let full = path.to_string_lossy();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    exclude
        .iter()
        .any(|e| e == full.as_ref() || e == name.as_ref() || e == stem.as_ref())
}
