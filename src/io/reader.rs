//! Reading saved fixed-width files back into storers.

use crate::config::Verbosity;
use crate::constants::{DEFAULT_CATEGORY, DEFAULT_READ_COLUMNS, SAVED_DATE_FORMAT, names};
use crate::error::{BgcError, Result};
use crate::frame;
use crate::progress;
use crate::storer::Storer;
use crate::variables::defaults::template;
use crate::variables::{VarType, Variable, VariableEnsemble};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataFrame};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

const MISSING_TOKEN: &str = "nan";

/// Reader of files written by [`crate::io::saver::StorerSaver`]
#[derive(Debug, Clone)]
pub struct Reader {
    paths: Vec<PathBuf>,
    category: String,
    columns: Option<Vec<String>>,
    verbosity: Verbosity,
}

impl Reader {
    pub fn new(paths: Vec<PathBuf>, verbosity: Verbosity) -> Self {
        Self {
            paths,
            category: DEFAULT_CATEGORY.to_string(),
            columns: None,
            verbosity,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Only read these columns, on top of the identity columns
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Read and concatenate every file
    pub fn read(&self) -> Result<Storer> {
        let mut storers = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            if let Some(storer) = self.read_file(path)? {
                storers.push(storer);
            }
        }
        Storer::concat(storers)?.ok_or_else(|| {
            BgcError::configuration(format!(
                "no readable data among {} files",
                self.paths.len()
            ))
        })
    }

    fn wanted(&self, name: &str) -> bool {
        match &self.columns {
            None => true,
            Some(columns) => {
                DEFAULT_READ_COLUMNS.contains(&name) || columns.iter().any(|c| c == name)
            }
        }
    }

    /// Parse one file, `None` when it holds nothing at all
    fn read_file(&self, path: &Path) -> Result<Option<Storer>> {
        if !path.exists() {
            return Err(BgcError::file_not_found(path));
        }
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();
        let Some(header) = lines.next().transpose()? else {
            debug!("Skipping empty file {}", path.display());
            return Ok(None);
        };
        let header: Vec<String> = header.split_whitespace().map(str::to_uppercase).collect();
        let units: Vec<String> = match lines.next().transpose()? {
            Some(line) => line.split_whitespace().map(str::to_string).collect(),
            None => Vec::new(),
        };

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); header.len()];
        for (number, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != header.len() {
                return Err(BgcError::invalid_format(
                    path,
                    format!(
                        "line {} has {} fields, expected {}",
                        number + 3,
                        tokens.len(),
                        header.len()
                    ),
                ));
            }
            for (column, token) in raw.iter_mut().zip(tokens) {
                column.push(token.to_string());
            }
        }

        let mut variables = Vec::new();
        let mut columns: Vec<Column> = Vec::new();
        for (i, name) in header.iter().enumerate() {
            if !self.wanted(name) {
                continue;
            }
            let unit = units.get(i).map(String::as_str).unwrap_or("[]");
            let var_type = infer_type(name, &raw[i]);
            columns.push(parse_column(name, var_type, &raw[i], path)?);
            variables.push(describe(name, unit, var_type));
        }

        let mut data = DataFrame::new(columns)?;
        if !header.iter().any(|h| h == names::DATE) {
            if let Some(dates) = dates_from_calendar(&data)? {
                frame::set_column(&mut data, frame::datetime_column(names::DATE, &dates)?)?;
                variables.push(describe(names::DATE, "[]", VarType::Datetime));
            }
        }
        let ensemble = VariableEnsemble::new(variables)?;

        let providers = if frame::has_column(&data, names::PROVIDER) {
            let mut providers: Vec<String> = frame::str_values(&data, names::PROVIDER)?
                .into_iter()
                .flatten()
                .filter(|p| !p.is_empty())
                .collect();
            providers.sort();
            providers.dedup();
            providers
        } else {
            Vec::new()
        };
        progress!(
            self.verbosity.is_detailed(),
            "Read {} rows from {}",
            data.height(),
            path.display()
        );
        Ok(Some(Storer::new(
            data,
            self.category.clone(),
            providers,
            ensemble,
            self.verbosity,
        )))
    }
}

/// Read several saved files into one in-situ storer
pub fn read_files(paths: Vec<PathBuf>, verbosity: Verbosity) -> Result<Storer> {
    Reader::new(paths, verbosity).read()
}

/// Descriptor for a saved column, reusing the default template when one matches
fn describe(name: &str, unit: &str, var_type: VarType) -> Variable {
    match template(name) {
        Ok(known) => {
            let var = known.in_file_as([name]);
            if var.var_type() == var_type && var.unit() == unit {
                var
            } else {
                Variable::parsed(name, unit, var_type)
            }
        }
        Err(_) => Variable::parsed(name, unit, var_type),
    }
}

fn infer_type(name: &str, tokens: &[String]) -> VarType {
    match name {
        names::DATE => VarType::Datetime,
        names::PROVIDER | names::EXPOCODE => VarType::Str,
        names::YEAR | names::MONTH | names::DAY | names::HOUR => VarType::Int,
        _ => {
            let numeric = tokens
                .iter()
                .all(|t| t == MISSING_TOKEN || t.parse::<f64>().is_ok());
            if numeric { VarType::Float } else { VarType::Str }
        }
    }
}

fn parse_column(name: &str, var_type: VarType, tokens: &[String], path: &Path) -> Result<Column> {
    let missing = |t: &String| t == MISSING_TOKEN;
    Ok(match var_type {
        VarType::Float => frame::float_column(
            name,
            tokens
                .iter()
                .map(|t| t.parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        ),
        VarType::Int => frame::int_column(
            name,
            tokens
                .iter()
                .map(|t| {
                    if missing(t) {
                        None
                    } else {
                        t.parse::<i64>()
                            .ok()
                            .or_else(|| t.parse::<f64>().ok().map(|v| v as i64))
                    }
                })
                .collect(),
        ),
        VarType::Str => frame::str_column(
            name,
            tokens
                .iter()
                .map(|t| Some(if missing(t) { String::new() } else { t.clone() }))
                .collect(),
        ),
        VarType::Datetime => {
            let dates = tokens
                .iter()
                .map(|t| {
                    if missing(t) {
                        Ok(None)
                    } else {
                        NaiveDateTime::parse_from_str(t, SAVED_DATE_FORMAT)
                            .map(Some)
                            .map_err(|e| {
                                BgcError::invalid_format(path, format!("bad date '{}': {}", t, e))
                            })
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            frame::datetime_column(name, &dates)?
        }
    })
}

/// Dates rebuilt from YEAR/MONTH/DAY and the optional HOUR
pub fn dates_from_calendar(df: &DataFrame) -> Result<Option<Vec<Option<NaiveDateTime>>>> {
    if ![names::YEAR, names::MONTH, names::DAY]
        .iter()
        .all(|c| frame::has_column(df, c))
    {
        return Ok(None);
    }
    let years = frame::int_values(df, names::YEAR)?;
    let months = frame::int_values(df, names::MONTH)?;
    let days = frame::int_values(df, names::DAY)?;
    let hours = if frame::has_column(df, names::HOUR) {
        frame::int_values(df, names::HOUR)?
    } else {
        vec![Some(0); df.height()]
    };
    let dates = (0..df.height())
        .map(|i| {
            let (y, m, d) = (years[i]?, months[i]?, days[i]?);
            let date = NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)?;
            date.and_hms_opt(hours[i].unwrap_or(0) as u32, 0, 0)
        })
        .collect();
    Ok(Some(dates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::saver::StorerSaver;
    use crate::storer::StorerView;
    use crate::storer::tests::sample_storer;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.txt");
        let storer = sample_storer(&[
            ("GLODAPv2", "06AQ2010", 1, 10.5, -5.25, -10.0, 12.125),
            ("ARGO", "6901", 2, -11.0, 6.0, -20.5, f64::NAN),
        ]);
        StorerSaver::new(true, Verbosity::Quiet)
            .save_all_storer(&storer, &path)
            .unwrap();

        let read = read_files(vec![path], Verbosity::Quiet).unwrap();
        assert_eq!(read.variables(), storer.variables());
        assert_eq!(read.height(), 2);
        assert_eq!(read.providers(), ["ARGO", "GLODAPv2"]);
        for name in [names::LATITUDE, names::LONGITUDE, names::DEPTH, names::TEMPERATURE] {
            let before = frame::float_values(storer.frame(), name).unwrap();
            let after = frame::float_values(read.frame(), name).unwrap();
            for (b, a) in before.iter().zip(&after) {
                assert!((b.is_nan() && a.is_nan()) || (b - a).abs() < 1e-3, "{}", name);
            }
        }
        assert_eq!(
            frame::datetime_values(read.frame(), names::DATE).unwrap(),
            frame::datetime_values(storer.frame(), names::DATE).unwrap()
        );
        assert_eq!(
            frame::str_values(read.frame(), names::EXPOCODE).unwrap(),
            frame::str_values(storer.frame(), names::EXPOCODE).unwrap()
        );
    }

    #[test]
    fn test_date_built_from_calendar_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calendar.txt");
        std::fs::write(
            &path,
            "YEAR MONTH DAY HOUR latitude TEMP\n[] [] [] [] [deg_N] [deg_C]\n2010 1 15 6 10.0 nan\n2011 2 1 nan 12.0 3.5\n",
        )
        .unwrap();
        let read = Reader::new(vec![path], Verbosity::Quiet)
            .with_category("float")
            .read()
            .unwrap();
        assert_eq!(read.category(), "float");
        assert!(read.variables().has_name(names::LATITUDE));
        let dates = frame::datetime_values(read.frame(), names::DATE).unwrap();
        assert_eq!(
            dates[0],
            NaiveDate::from_ymd_opt(2010, 1, 15).unwrap().and_hms_opt(6, 0, 0)
        );
        assert_eq!(
            dates[1],
            NaiveDate::from_ymd_opt(2011, 2, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_column_selection_and_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cols.txt");
        std::fs::write(&path, "LATITUDE TEMP PSAL\n[deg_N] [deg_C] [psu]\n1.0 2.0 3.0\n").unwrap();
        let read = Reader::new(vec![path.clone()], Verbosity::Quiet)
            .with_columns(vec!["PSAL".to_string()])
            .read()
            .unwrap();
        assert_eq!(read.variables().names(), ["LATITUDE", "PSAL"]);

        let broken = dir.path().join("broken.txt");
        std::fs::write(&broken, "LATITUDE TEMP\n[] []\n1.0\n").unwrap();
        assert!(matches!(
            read_files(vec![broken], Verbosity::Quiet),
            Err(BgcError::InvalidFormat { .. })
        ));
        assert!(matches!(
            read_files(vec![dir.path().join("missing.txt")], Verbosity::Quiet),
            Err(BgcError::FileNotFound { .. })
        ));
    }
}
