//! Tests for storers, slices and duplicate removal

pub mod storer_tests;

use crate::config::Verbosity;
use crate::constants::names;
use crate::frame;
use crate::storer::Storer;
use crate::variables::VariableEnsemble;
use crate::variables::defaults::template;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::DataFrame;

/// One observation row: provider, expocode, day of January 2010, lat, lon, depth, temperature
pub type Row<'a> = (&'a str, &'a str, u32, f64, f64, f64, f64);

pub fn jan(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2010, 1, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Ensemble of the columns built by [`sample_storer`]
pub fn sample_ensemble() -> VariableEnsemble {
    let names = [
        names::PROVIDER,
        names::EXPOCODE,
        names::DATE,
        names::LATITUDE,
        names::LONGITUDE,
        names::DEPTH,
        names::TEMPERATURE,
    ];
    VariableEnsemble::new(
        names
            .iter()
            .map(|name| template(name).unwrap().in_file_as([*name])),
    )
    .unwrap()
}

pub fn sample_frame(rows: &[Row]) -> DataFrame {
    let dates: Vec<Option<NaiveDateTime>> = rows.iter().map(|r| Some(jan(r.2))).collect();
    DataFrame::new(vec![
        frame::str_column(
            names::PROVIDER,
            rows.iter().map(|r| Some(r.0.to_string())).collect(),
        ),
        frame::str_column(
            names::EXPOCODE,
            rows.iter().map(|r| Some(r.1.to_string())).collect(),
        ),
        frame::datetime_column(names::DATE, &dates).unwrap(),
        frame::float_column(names::LATITUDE, rows.iter().map(|r| r.3).collect()),
        frame::float_column(names::LONGITUDE, rows.iter().map(|r| r.4).collect()),
        frame::float_column(names::DEPTH, rows.iter().map(|r| r.5).collect()),
        frame::float_column(names::TEMPERATURE, rows.iter().map(|r| r.6).collect()),
    ])
    .unwrap()
}

/// Helper to build an in-situ storer from rows
pub fn sample_storer(rows: &[Row]) -> Storer {
    let mut providers: Vec<String> = Vec::new();
    for row in rows {
        if !providers.iter().any(|p| p == row.0) {
            providers.push(row.0.to_string());
        }
    }
    Storer::new(
        sample_frame(rows),
        "in_situ",
        providers,
        sample_ensemble(),
        Verbosity::Quiet,
    )
}
