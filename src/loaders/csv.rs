//! Delimited text loader.

use super::{Loader, LoaderBase, set_calendar_columns};
use crate::constants::names;
use crate::constraints::Constraints;
use crate::error::{BgcError, Result};
use crate::frame;
use crate::variables::{VarType, Variable};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Layouts accepted for a date column holding full timestamps
const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y%m%d%H%M%S",
];

/// Layouts accepted for a date column holding days only
const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"];

const MISSING_TOKENS: &[&str] = &["", "nan", "na", "n/a", "null", "none"];

/// Loader for CSV-like provider files
#[derive(Debug, Clone)]
pub struct CsvLoader {
    base: LoaderBase,
    separator: u8,
    units_row: bool,
}

impl CsvLoader {
    /// `units_row` skips a line of physical units right after the header
    pub fn new(base: LoaderBase, separator: char, units_row: bool) -> Result<Self> {
        if !separator.is_ascii() {
            return Err(BgcError::configuration(format!(
                "separator '{}' is not a single-byte character",
                separator
            )));
        }
        Ok(Self {
            base,
            separator: separator as u8,
            units_row,
        })
    }

    /// Raw file content, every column as text
    fn read(&self, path: &Path) -> Result<DataFrame> {
        if !path.exists() {
            return Err(BgcError::file_not_found(path));
        }
        if fs::metadata(path)?.len() == 0 {
            debug!("Empty file {}", path.display());
            return Ok(DataFrame::empty());
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_skip_rows_after_header(usize::from(self.units_row))
            .with_infer_schema_length(Some(0))
            .with_parse_options(CsvParseOptions::default().with_separator(self.separator))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }
}

impl Loader for CsvLoader {
    fn base(&self) -> &LoaderBase {
        &self.base
    }

    fn load(&self, path: &Path, constraints: &Constraints) -> Result<DataFrame> {
        let raw = self.read(path)?;
        let height = raw.height();
        let loading = self.base.loading_variables();

        let mut keep = vec![true; height];
        let mut columns: Vec<Column> = Vec::new();
        let mut date_tokens: Option<Vec<Option<String>>> = None;
        for var in loading.in_dset() {
            let Some(tokens) = resolve_aliases(&raw, var)? else {
                debug!("{} absent from {}", var.name(), path.display());
                continue;
            };
            if var.var_type() == VarType::Datetime {
                date_tokens = Some(tokens);
                continue;
            }
            columns.push(parse_tokens(var, &tokens, &mut keep));
        }

        let mut df = DataFrame::new(columns)?;
        if df.width() == 0 {
            df = DataFrame::empty_with_height(height);
        }
        let dates = match date_tokens {
            Some(tokens) => tokens.iter().map(|t| parse_date(t.as_deref())).collect(),
            None => dates_from_columns(&df, &self.base)?,
        };
        set_calendar_columns(&mut df, loading, &dates)?;

        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            warn!(
                "Dropped {} rows with non-numeric values in {}",
                dropped,
                path.display()
            );
        }
        let df = frame::filter_rows(&df, &keep)?;
        self.base.finalize(df, constraints)
    }
}

/// Values of the first alias present in the file, flag-filtered when the flag column exists
fn resolve_aliases(raw: &DataFrame, var: &Variable) -> Result<Option<Vec<Option<String>>>> {
    for alias in var.aliases() {
        if !frame::has_column(raw, &alias.column) {
            continue;
        }
        let values = frame::str_values(raw, &alias.column)?;
        let Some(flag) = alias.flag.as_deref().filter(|f| frame::has_column(raw, f)) else {
            return Ok(Some(values));
        };
        let flags = frame::str_values(raw, flag)?;
        let filtered = values
            .into_iter()
            .zip(flags)
            .map(|(value, flag)| {
                if alias.accepts_str(flag.as_deref()) {
                    value
                } else {
                    None
                }
            })
            .collect();
        return Ok(Some(filtered));
    }
    Ok(None)
}

fn is_missing(token: &str) -> bool {
    MISSING_TOKENS.contains(&token.to_ascii_lowercase().as_str())
}

/// Parse a numeric token; `Err(())` when the token is text and the row must go
fn parse_number(token: Option<&str>) -> std::result::Result<f64, ()> {
    let Some(token) = token.map(str::trim) else {
        return Ok(f64::NAN);
    };
    if is_missing(token) {
        return Ok(f64::NAN);
    }
    let token = token.strip_prefix('<').unwrap_or(token).trim();
    match token.parse::<f64>() {
        Ok(value) => Ok(value),
        Err(_) if token.chars().all(char::is_alphabetic) => Err(()),
        Err(_) => Ok(f64::NAN),
    }
}

fn parse_tokens(var: &Variable, tokens: &[Option<String>], keep: &mut [bool]) -> Column {
    let label = var.label();
    match var.var_type() {
        VarType::Float | VarType::Int => {
            let values: Vec<f64> = tokens
                .iter()
                .zip(keep.iter_mut())
                .map(|(token, keep)| {
                    parse_number(token.as_deref()).unwrap_or_else(|()| {
                        *keep = false;
                        f64::NAN
                    })
                })
                .collect();
            if var.var_type() == VarType::Int {
                frame::int_column(
                    label,
                    values
                        .into_iter()
                        .map(|v| v.is_finite().then_some(v as i64))
                        .collect(),
                )
            } else {
                frame::float_column(label, values)
            }
        }
        VarType::Str | VarType::Datetime => frame::str_column(
            label,
            tokens
                .iter()
                .map(|t| t.as_deref().map(|s| s.trim().to_string()))
                .collect(),
        ),
    }
}

/// Parse a date token with the accepted layouts
pub fn parse_date(token: Option<&str>) -> Option<NaiveDateTime> {
    let token = token?.trim();
    if is_missing(token) {
        return None;
    }
    DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(token, layout).ok())
        .or_else(|| {
            DATE_LAYOUTS.iter().find_map(|layout| {
                NaiveDate::parse_from_str(token, layout)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
}

/// Dates from the year, month, day and optional hour columns
fn dates_from_columns(df: &DataFrame, base: &LoaderBase) -> Result<Vec<Option<NaiveDateTime>>> {
    let variables = base.loading_variables();
    let part = |name: &str| -> Result<Option<Vec<Option<i64>>>> {
        match variables.label_of(name) {
            Ok(label) if frame::has_column(df, &label) => Ok(Some(frame::int_values(df, &label)?)),
            _ => Ok(None),
        }
    };
    let (Some(years), Some(months), Some(days)) =
        (part(names::YEAR)?, part(names::MONTH)?, part(names::DAY)?)
    else {
        return Ok(vec![None; df.height()]);
    };
    let hours = part(names::HOUR)?;
    Ok((0..df.height())
        .map(|row| {
            let date = NaiveDate::from_ymd_opt(
                i32::try_from(years[row]?).ok()?,
                u32::try_from(months[row]?).ok()?,
                u32::try_from(days[row]?).ok()?,
            )?;
            let hour = hours
                .as_ref()
                .and_then(|h| h[row])
                .and_then(|h| u32::try_from(h).ok())
                .unwrap_or(0);
            date.and_hms_opt(hour, 0, 0)
        })
        .collect())
}
