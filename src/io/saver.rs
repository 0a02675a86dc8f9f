//! Fixed-width text export of storers.
//!
//! A saved file holds the variable names on its first line, their units on
//! the second, then one line per row. Every field is rendered with the
//! printf-style format of its variable and fields are separated by a single
//! space, so files can be read back by splitting on whitespace.

use super::dateranges::{DateRange, DateRangeGenerator};
use super::format::FieldFormat;
use crate::config::Verbosity;
use crate::constants::{SAVED_DATE_FORMAT, names};
use crate::error::Result;
use crate::frame;
use crate::progress;
use crate::storer::{Storer, StorerView};
use crate::variables::{VarType, Variable};
use polars::prelude::DataFrame;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Column rendered to text
enum Rendered {
    Float(Vec<f64>),
    Int(Vec<Option<i64>>),
    Text(Vec<Option<String>>),
}

/// Writes storers to fixed-width text files
#[derive(Debug, Clone)]
pub struct StorerSaver {
    aggregate: bool,
    verbosity: Verbosity,
}

impl StorerSaver {
    /// `aggregate` writes one file per date range instead of one per provider
    pub fn new(aggregate: bool, verbosity: Verbosity) -> Self {
        Self {
            aggregate,
            verbosity,
        }
    }

    /// Save every date range of `generator` under `dir`, skipping empty ranges
    pub fn save_from_daterange(
        &self,
        storer: &Storer,
        generator: &DateRangeGenerator,
        dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for range in generator.ranges() {
            let slice = storer.slice_on_dates(range.start, range.end)?;
            if slice.is_empty() {
                debug!("No data between {} and {}", range.start, range.end);
                continue;
            }
            if self.aggregate {
                let path = dir.join(aggregated_filename(storer.category(), &range));
                self.save_all_storer(&slice, &path)?;
                written.push(path);
            } else {
                let slice_storer = slice.to_storer()?;
                for provider in self.providers_of(&slice_storer)? {
                    let rows = slice_storer.slice_on_provider(&provider)?;
                    if rows.is_empty() {
                        continue;
                    }
                    let path = dir
                        .join(&provider)
                        .join(provider_filename(&provider, &range));
                    self.save_all_storer(&rows, &path)?;
                    written.push(path);
                }
            }
        }
        Ok(written)
    }

    fn providers_of(&self, storer: &Storer) -> Result<Vec<String>> {
        if !frame::has_column(storer.frame(), names::PROVIDER) {
            return Ok(storer.providers().to_vec());
        }
        let mut providers: Vec<String> = frame::str_values(storer.frame(), names::PROVIDER)?
            .into_iter()
            .flatten()
            .collect();
        providers.sort();
        providers.dedup();
        Ok(providers)
    }

    /// Append every row of `storer` to `path`, writing the header if the file is new or empty
    pub fn save_all_storer(&self, storer: &impl StorerView, path: &Path) -> Result<()> {
        let data = storer.data()?;
        if data.height() == 0 {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let variables = storer.variables().save_variables();
        let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);

        if needs_header {
            let names: Vec<&str> = variables.iter().map(|v| v.name()).collect();
            let units: Vec<&str> = variables.iter().map(|v| v.unit()).collect();
            writeln!(writer, "{}", header_line(&variables, &names)?)?;
            writeln!(writer, "{}", header_line(&variables, &units)?)?;
        }
        let lines = render_rows(&data, &variables)?;
        for line in &lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        progress!(
            self.verbosity.is_verbose(),
            "Saved {} rows to {}",
            lines.len(),
            path.display()
        );
        Ok(())
    }
}

/// File name of an aggregated save
pub fn aggregated_filename(category: &str, range: &DateRange) -> String {
    format!("bgc_{}_{}.txt", category, range.as_str())
}

/// File name of a per-provider save
pub fn provider_filename(provider: &str, range: &DateRange) -> String {
    format!("nutrients_{}_{}.csv", provider, range.as_str())
}

fn header_line(variables: &[&Variable], texts: &[&str]) -> Result<String> {
    let fields = variables
        .iter()
        .zip(texts)
        .map(|(var, text)| Ok(var.name_format().parse::<FieldFormat>()?.pad(text)))
        .collect::<Result<Vec<_>>>()?;
    Ok(fields.join(" "))
}

fn render_column(data: &DataFrame, var: &Variable) -> Result<Rendered> {
    let label = var.label();
    if !frame::has_column(data, label) {
        return Ok(Rendered::Text(vec![None; data.height()]));
    }
    Ok(match var.var_type() {
        VarType::Float => Rendered::Float(frame::float_values(data, label)?),
        VarType::Int => Rendered::Int(frame::int_values(data, label)?),
        VarType::Str => Rendered::Text(frame::str_values(data, label)?),
        VarType::Datetime => Rendered::Text(
            frame::datetime_values(data, label)?
                .into_iter()
                .map(|d| d.map(|d| d.format(SAVED_DATE_FORMAT).to_string()))
                .collect(),
        ),
    })
}

fn render_rows(data: &DataFrame, variables: &[&Variable]) -> Result<Vec<String>> {
    let columns = variables
        .iter()
        .map(|var| {
            let format: FieldFormat = var.value_format().parse()?;
            Ok((format, render_column(data, var)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let lines = (0..data.height())
        .map(|row| {
            columns
                .iter()
                .map(|(format, column)| match column {
                    Rendered::Float(values) => format.format_float(values[row]),
                    Rendered::Int(values) => format.format_int(values[row]),
                    Rendered::Text(values) => format.format_str(values[row].as_deref()),
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    Ok(lines)
}
