//! Row constraints applied to normalized tables.
//!
//! Three predicate families are supported: value boundaries, set membership
//! and polygon containment. A row survives [`Constraints::apply`] only if it
//! satisfies every registered predicate; each family is evaluated on its own
//! as a boolean column and the results are combined with AND.

use crate::error::{BgcError, Result};
use crate::frame;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Value used as a boundary or superset member
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintValue {
    Float(f64),
    Str(String),
    Date(NaiveDateTime),
}

impl ConstraintValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstraintValue::Float(v) => Some(*v),
            ConstraintValue::Str(s) => s.trim().parse().ok(),
            ConstraintValue::Date(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            ConstraintValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            ConstraintValue::Float(v) => v.to_string(),
            ConstraintValue::Str(s) => s.trim().to_string(),
            ConstraintValue::Date(d) => d.to_string(),
        }
    }
}

impl From<f64> for ConstraintValue {
    fn from(value: f64) -> Self {
        ConstraintValue::Float(value)
    }
}

impl From<i32> for ConstraintValue {
    fn from(value: i32) -> Self {
        ConstraintValue::Float(value as f64)
    }
}

impl From<&str> for ConstraintValue {
    fn from(value: &str) -> Self {
        ConstraintValue::Str(value.to_string())
    }
}

impl From<String> for ConstraintValue {
    fn from(value: String) -> Self {
        ConstraintValue::Str(value)
    }
}

impl From<NaiveDateTime> for ConstraintValue {
    fn from(value: NaiveDateTime) -> Self {
        ConstraintValue::Date(value)
    }
}

impl From<NaiveDate> for ConstraintValue {
    fn from(value: NaiveDate) -> Self {
        ConstraintValue::Date(value.and_time(chrono::NaiveTime::MIN))
    }
}

/// Inclusive `[min, max]` boundary, either side optional
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    pub min: Option<ConstraintValue>,
    pub max: Option<ConstraintValue>,
}

/// Closed polygon over (longitude, latitude) vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<(f64, f64)>,
}

impl Polygon {
    /// Polygon from (lon, lat) vertices, the closing edge is implicit
    pub fn new(vertices: Vec<(f64, f64)>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(BgcError::configuration(format!(
                "a polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        Ok(Self { vertices })
    }

    /// Axis-aligned rectangle
    pub fn rectangle(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        Self {
            vertices: vec![
                (lon_min, lat_min),
                (lon_max, lat_min),
                (lon_max, lat_max),
                (lon_min, lat_max),
            ],
        }
    }

    /// Even-odd containment test; NaN coordinates are outside
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !lon.is_finite() || !lat.is_finite() {
            return false;
        }
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if (yi > lat) != (yj > lat) {
                let x_cross = xi + (lat - yi) * (xj - xi) / (yj - yi);
                if lon < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PolygonConstraint {
    latitude_label: String,
    longitude_label: String,
    polygon: Polygon,
}

/// Parameters registered for a single label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintParameters {
    pub boundary: Option<Boundary>,
    pub superset: Option<Vec<ConstraintValue>>,
}

/// Conjunctive set of row predicates
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    boundaries: BTreeMap<String, Boundary>,
    supersets: BTreeMap<String, Vec<ConstraintValue>>,
    polygons: Vec<PolygonConstraint>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `label` to `[min, max]`; no-op when both bounds are unset
    pub fn add_boundary_constraint(
        &mut self,
        label: &str,
        min: Option<ConstraintValue>,
        max: Option<ConstraintValue>,
    ) {
        if min.is_none() && max.is_none() {
            return;
        }
        self.boundaries
            .insert(label.to_string(), Boundary { min, max });
    }

    /// Restrict `label` to the given values; no-op when the set is empty
    pub fn add_superset_constraint(&mut self, label: &str, values: Vec<ConstraintValue>) {
        if values.is_empty() {
            return;
        }
        self.supersets.insert(label.to_string(), values);
    }

    /// Keep rows whose (lon, lat) lies inside the polygon
    pub fn add_polygon_constraint(
        &mut self,
        latitude_label: &str,
        longitude_label: &str,
        polygon: Polygon,
    ) {
        self.polygons.push(PolygonConstraint {
            latitude_label: latitude_label.to_string(),
            longitude_label: longitude_label.to_string(),
            polygon,
        });
    }

    /// Whether any boundary or superset applies to this label
    pub fn is_constrained(&self, label: &str) -> bool {
        self.boundaries.contains_key(label) || self.supersets.contains_key(label)
    }

    pub fn get_constraint_parameters(&self, label: &str) -> ConstraintParameters {
        ConstraintParameters {
            boundary: self.boundaries.get(label).cloned(),
            superset: self.supersets.get(label).cloned(),
        }
    }

    /// Numeric boundary of a label, defaulting each missing side
    pub fn get_extremes(&self, label: &str, default_min: f64, default_max: f64) -> (f64, f64) {
        match self.boundaries.get(label) {
            Some(boundary) => (
                boundary
                    .min
                    .as_ref()
                    .and_then(ConstraintValue::as_f64)
                    .unwrap_or(default_min),
                boundary
                    .max
                    .as_ref()
                    .and_then(ConstraintValue::as_f64)
                    .unwrap_or(default_max),
            ),
            None => (default_min, default_max),
        }
    }

    /// Rows satisfying every registered predicate
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let keep = self.mask(df)?;
        let kept = frame::filter_rows(df, &keep)?;
        debug!(
            "Constraints kept {} of {} rows",
            kept.height(),
            df.height()
        );
        Ok(kept)
    }

    /// Rows satisfying the boundary and superset registered for one label
    pub fn apply_specific_constraint(&self, label: &str, df: &DataFrame) -> Result<DataFrame> {
        let mut keep = vec![true; df.height()];
        if let Some(boundary) = self.boundaries.get(label) {
            and_in_place(&mut keep, &boundary_mask(df, label, boundary)?);
        }
        if let Some(values) = self.supersets.get(label) {
            and_in_place(&mut keep, &superset_mask(df, label, values)?);
        }
        frame::filter_rows(df, &keep)
    }

    /// Boolean row mask: AND of the boundary, superset and polygon families
    pub fn mask(&self, df: &DataFrame) -> Result<Vec<bool>> {
        let mut boundaries = vec![true; df.height()];
        for (label, boundary) in &self.boundaries {
            and_in_place(&mut boundaries, &boundary_mask(df, label, boundary)?);
        }
        let mut supersets = vec![true; df.height()];
        for (label, values) in &self.supersets {
            and_in_place(&mut supersets, &superset_mask(df, label, values)?);
        }
        let mut polygons = vec![true; df.height()];
        for constraint in &self.polygons {
            let lat = frame::float_values(df, &constraint.latitude_label)?;
            let lon = frame::float_values(df, &constraint.longitude_label)?;
            let inside: Vec<bool> = lon
                .iter()
                .zip(&lat)
                .map(|(&x, &y)| constraint.polygon.contains(x, y))
                .collect();
            and_in_place(&mut polygons, &inside);
        }
        and_in_place(&mut boundaries, &supersets);
        and_in_place(&mut boundaries, &polygons);
        Ok(boundaries)
    }
}

fn and_in_place(acc: &mut [bool], other: &[bool]) {
    for (a, b) in acc.iter_mut().zip(other) {
        *a = *a && *b;
    }
}

fn boundary_mask(df: &DataFrame, label: &str, boundary: &Boundary) -> Result<Vec<bool>> {
    let dtype = frame::dtype_of(df, label)?;
    if frame::is_datetime(&dtype) {
        let min = date_bound(label, boundary.min.as_ref())?;
        let max = date_bound(label, boundary.max.as_ref())?;
        let values = frame::datetime_values(df, label)?;
        return Ok(values
            .iter()
            .map(|v| match v {
                Some(d) => min.is_none_or(|m| *d >= m) && max.is_none_or(|m| *d <= m),
                None => false,
            })
            .collect());
    }
    let min = float_bound(label, boundary.min.as_ref())?;
    let max = float_bound(label, boundary.max.as_ref())?;
    let values = frame::float_values(df, label)?;
    Ok(values
        .iter()
        .map(|&v| min.is_none_or(|m| v >= m) && max.is_none_or(|m| v <= m))
        .collect())
}

fn date_bound(label: &str, value: Option<&ConstraintValue>) -> Result<Option<NaiveDateTime>> {
    value
        .map(|v| {
            v.as_date().ok_or_else(|| {
                BgcError::configuration(format!("boundary on '{}' must be a date", label))
            })
        })
        .transpose()
}

fn float_bound(label: &str, value: Option<&ConstraintValue>) -> Result<Option<f64>> {
    value
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                BgcError::configuration(format!("boundary on '{}' must be numeric", label))
            })
        })
        .transpose()
}

fn superset_mask(df: &DataFrame, label: &str, values: &[ConstraintValue]) -> Result<Vec<bool>> {
    let dtype = frame::dtype_of(df, label)?;
    if frame::is_datetime(&dtype) {
        let allowed: HashSet<NaiveDateTime> =
            values.iter().filter_map(ConstraintValue::as_date).collect();
        let column = frame::datetime_values(df, label)?;
        return Ok(column
            .iter()
            .map(|v| v.is_some_and(|d| allowed.contains(&d)))
            .collect());
    }
    if frame::is_numeric(&dtype) {
        let allowed: Vec<f64> = values.iter().filter_map(ConstraintValue::as_f64).collect();
        let column = frame::float_values(df, label)?;
        return Ok(column.iter().map(|v| allowed.contains(v)).collect());
    }
    let allowed: HashSet<String> = values.iter().map(ConstraintValue::as_text).collect();
    let column = frame::str_values(df, label)?;
    Ok(column
        .iter()
        .map(|v| v.as_ref().is_some_and(|s| allowed.contains(s.trim())))
        .collect())
}
