//! Typed access to polars data frames.
//!
//! Every component reads and writes its tables through these helpers so
//! that dtype handling (NaN for missing floats, millisecond datetimes,
//! trimmed strings) stays consistent across loaders, storers and savers.

use crate::error::{BgcError, Result};
use crate::variables::{VarType, Variable, VariableEnsemble};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

/// Extract a column as `f64`, mapping nulls and unparsable values to NaN
pub fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df.column(name)?.as_materialized_series();
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Extract a column as `i64`, nulls become `None`
pub fn int_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = df.column(name)?.as_materialized_series();
    let casted = series.cast(&DataType::Int64)?;
    Ok(casted.i64()?.into_iter().collect())
}

/// Extract a column as strings
pub fn str_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.as_materialized_series();
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Extract a datetime column
pub fn datetime_values(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    let series = df.column(name)?.as_materialized_series();
    let millis = match series.dtype() {
        DataType::Datetime(TimeUnit::Milliseconds, _) => series.cast(&DataType::Int64)?,
        DataType::Datetime(_, _) => series
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
            .cast(&DataType::Int64)?,
        other => {
            return Err(BgcError::parse(format!(
                "column '{}' is not a datetime column ({})",
                name, other
            )));
        }
    };
    Ok(millis
        .i64()?
        .into_iter()
        .map(|v| v.and_then(millis_to_datetime))
        .collect())
}

/// Build a `Float64` column
pub fn float_column(name: &str, values: Vec<f64>) -> Column {
    Column::new(name.into(), values)
}

/// Build an `Int64` column
pub fn int_column(name: &str, values: Vec<Option<i64>>) -> Column {
    Column::new(name.into(), values)
}

/// Build a `String` column
pub fn str_column(name: &str, values: Vec<Option<String>>) -> Column {
    Column::new(name.into(), values)
}

/// Build a millisecond `Datetime` column
pub fn datetime_column(name: &str, values: &[Option<NaiveDateTime>]) -> Result<Column> {
    let millis: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.map(|d| d.and_utc().timestamp_millis()))
        .collect();
    let series = Series::new(name.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    Ok(Column::from(series))
}

/// Convert epoch milliseconds to a naive UTC datetime
pub fn millis_to_datetime(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|d| d.naive_utc())
}

/// Keep the rows where `keep` is true
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), keep);
    Ok(df.filter(&mask)?)
}

/// Gather rows by position, in the given order (repetitions allowed)
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let indices: Vec<IdxSize> = rows.iter().map(|&r| r as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), indices);
    Ok(df.take(&idx)?)
}

/// Replace or append a column
pub fn set_column(df: &mut DataFrame, column: Column) -> Result<()> {
    df.with_column(column)?;
    Ok(())
}

/// Whether the frame holds a column with this name
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Column names as owned strings
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|c| c.as_str().to_string())
        .collect()
}

/// Select columns in the given order
pub fn select_columns(df: &DataFrame, names: &[String]) -> Result<DataFrame> {
    Ok(df.select(names.iter().map(String::as_str))?)
}

/// Drop a column if present
pub fn drop_column(df: &DataFrame, name: &str) -> Result<DataFrame> {
    if has_column(df, name) {
        Ok(df.drop(name)?)
    } else {
        Ok(df.clone())
    }
}

/// Stack frames vertically, aligning column order on the first frame
pub fn concat_frames(frames: Vec<DataFrame>) -> Result<Option<DataFrame>> {
    let mut iter = frames.into_iter();
    let Some(mut stacked) = iter.next() else {
        return Ok(None);
    };
    let names = column_names(&stacked);
    for frame in iter {
        let aligned = select_columns(&frame, &names)?;
        stacked.vstack_mut(&aligned)?;
    }
    Ok(Some(stacked))
}

/// Render each row of the given columns as a single grouping key
pub fn row_keys(df: &DataFrame, names: &[String]) -> Result<Vec<String>> {
    let mut keys = vec![String::new(); df.height()];
    for name in names {
        let values = str_values(df, name)?;
        for (key, value) in keys.iter_mut().zip(values) {
            key.push_str(value.as_deref().unwrap_or("\u{0}null"));
            key.push('\u{1f}');
        }
    }
    Ok(keys)
}

/// Whether the dtype holds plain numbers
pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Whether the dtype holds datetimes
pub fn is_datetime(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _))
}

/// Dtype of a column
pub fn dtype_of(df: &DataFrame, name: &str) -> Result<DataType> {
    Ok(df.column(name)?.dtype().clone())
}

/// Column of `height` default values for a variable
pub fn default_column(var: &Variable, height: usize) -> Result<Column> {
    let default = var.default_value();
    Ok(match var.var_type() {
        VarType::Float => float_column(var.label(), vec![default.as_f64(); height]),
        VarType::Int => int_column(var.label(), vec![default.as_i64(); height]),
        VarType::Str => str_column(var.label(), vec![default.as_string(); height]),
        VarType::Datetime => datetime_column(var.label(), &vec![None; height])?,
    })
}

/// Zero-row frame with one typed column per variable
pub fn empty_frame(ensemble: &VariableEnsemble) -> Result<DataFrame> {
    let columns = ensemble
        .iter()
        .map(|var| default_column(var, 0))
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// Cast a column to the storage dtype of its variable
pub fn cast_to_type(df: &mut DataFrame, var: &Variable) -> Result<()> {
    let target = match var.var_type() {
        VarType::Float => DataType::Float64,
        VarType::Int => DataType::Int64,
        VarType::Str => DataType::String,
        VarType::Datetime => DataType::Datetime(TimeUnit::Milliseconds, None),
    };
    let series = df.column(var.label())?.as_materialized_series();
    if series.dtype() != &target {
        let casted = series.cast(&target)?;
        set_column(df, Column::from(casted))?;
    }
    Ok(())
}
