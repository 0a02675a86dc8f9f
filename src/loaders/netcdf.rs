//! Gridded binary (NetCDF) loader.
//!
//! Files are read through the [`GriddedSource`] seam so the flattening
//! logic does not depend on the native library: the `netcdf` cargo feature
//! provides [`NetcdfOpener`], tests plug in-memory sources.
//!
//! Every in-file variable becomes a flat column. Arrays are laid out on a
//! common `(n, m)` grid: single values are broadcast, 1-D arrays of length
//! `n` are repeated along the second dimension and 2-D arrays must match
//! `(n, m)` exactly.

use super::{Loader, LoaderBase, set_calendar_columns};
use crate::constants::{FILL_VALUE_THRESHOLD, NETCDF_TIME_ORIGIN, names};
use crate::constraints::Constraints;
use crate::error::{BgcError, Result};
use crate::frame;
use crate::variables::{VarType, Variable};
use chrono::{Duration, NaiveDateTime};
use polars::prelude::{Column, DataFrame};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Numeric array with its missing-value mask
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
    pub mask: Vec<bool>,
}

impl MaskedArray {
    /// Array whose NaN and fill-magnitude values are masked
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        let mask = values
            .iter()
            .map(|v| v.is_nan() || v.abs() >= FILL_VALUE_THRESHOLD)
            .collect();
        Self::with_mask(shape, values, mask)
    }

    /// Array with an explicit mask, combined with the fill-magnitude rule
    pub fn with_mask(shape: Vec<usize>, values: Vec<f64>, mask: Vec<bool>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if values.len() != expected || mask.len() != expected {
            return Err(BgcError::ShapeMismatch {
                expected: shape,
                found: vec![values.len()],
            });
        }
        let mask = mask
            .into_iter()
            .zip(&values)
            .map(|(m, v)| m || v.abs() >= FILL_VALUE_THRESHOLD)
            .collect();
        Ok(Self {
            shape,
            values,
            mask,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values with masked cells replaced by `fill`
    pub fn filled(&self, fill: f64) -> Vec<f64> {
        self.values
            .iter()
            .zip(&self.mask)
            .map(|(&v, &m)| if m { fill } else { v })
            .collect()
    }
}

/// Opened gridded file
pub trait GriddedSource {
    fn has_variable(&self, name: &str) -> bool;
    fn read_variable(&self, name: &str) -> Result<MaskedArray>;
}

/// Opens gridded files
pub trait GriddedOpener: Send + Sync + fmt::Debug {
    fn open(&self, path: &Path) -> Result<Box<dyn GriddedSource>>;
}

/// Opener backed by the netcdf C library
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfOpener;

#[cfg(feature = "netcdf")]
mod native {
    use super::{GriddedOpener, GriddedSource, MaskedArray, NetcdfOpener};
    use crate::error::{BgcError, Result};
    use std::path::{Path, PathBuf};

    struct NetcdfFile {
        file: netcdf::File,
        path: PathBuf,
    }

    fn attr_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
        var.attribute_value(name)
            .and_then(|r| r.ok())
            .and_then(|v| match v {
                netcdf::AttributeValue::Double(d) => Some(d),
                netcdf::AttributeValue::Float(f) => Some(f as f64),
                netcdf::AttributeValue::Int(i) => Some(i as f64),
                netcdf::AttributeValue::Short(s) => Some(s as f64),
                netcdf::AttributeValue::Schar(c) => Some(c as f64),
                _ => None,
            })
    }

    impl NetcdfFile {
        fn error(&self, name: &str, error: impl std::fmt::Display) -> BgcError {
            BgcError::invalid_format(&self.path, format!("variable {}: {}", name, error))
        }
    }

    impl GriddedSource for NetcdfFile {
        fn has_variable(&self, name: &str) -> bool {
            self.file.variable(name).is_some()
        }

        fn read_variable(&self, name: &str) -> Result<MaskedArray> {
            let var = self
                .file
                .variable(name)
                .ok_or_else(|| self.error(name, "not found"))?;
            let mut shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

            let (values, mask) = match var.get_values::<f64, _>(..) {
                Ok(values) => {
                    let fill = attr_f64(&var, "_FillValue");
                    let mask: Vec<bool> = values.iter().map(|v| Some(*v) == fill).collect();
                    let scale = attr_f64(&var, "scale_factor").unwrap_or(1.0);
                    let offset = attr_f64(&var, "add_offset").unwrap_or(0.0);
                    let values = values.into_iter().map(|v| v * scale + offset).collect();
                    (values, mask)
                }
                Err(_) => {
                    // Character arrays (QC flags) hold one ASCII digit per cell
                    let raw = var.get_raw_values(..).map_err(|e| self.error(name, e))?;
                    let values: Vec<f64> = raw
                        .iter()
                        .map(|b| match b {
                            b'0'..=b'9' => f64::from(b - b'0'),
                            _ => f64::NAN,
                        })
                        .collect();
                    let mask = values.iter().map(|v| v.is_nan()).collect();
                    (values, mask)
                }
            };
            if shape.is_empty() {
                shape.push(1);
            }
            MaskedArray::with_mask(shape, values, mask)
        }
    }

    impl GriddedOpener for NetcdfOpener {
        fn open(&self, path: &Path) -> Result<Box<dyn GriddedSource>> {
            let file = netcdf::open(path)
                .map_err(|e| BgcError::invalid_format(path, e.to_string()))?;
            Ok(Box::new(NetcdfFile {
                file,
                path: path.to_path_buf(),
            }))
        }
    }
}

#[cfg(not(feature = "netcdf"))]
impl GriddedOpener for NetcdfOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn GriddedSource>> {
        Err(BgcError::UnsupportedFormat {
            format: format!(
                "netcdf ({}): rebuild with the `netcdf` feature",
                path.display()
            ),
        })
    }
}

/// Loader of gridded provider files
#[derive(Debug, Clone)]
pub struct NetCDFLoader {
    base: LoaderBase,
    opener: Arc<dyn GriddedOpener>,
}

/// Flattened in-file variable
struct Loaded<'a> {
    var: &'a Variable,
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl NetCDFLoader {
    pub fn new(base: LoaderBase) -> Self {
        Self::with_opener(base, Arc::new(NetcdfOpener))
    }

    pub fn with_opener(base: LoaderBase, opener: Arc<dyn GriddedOpener>) -> Self {
        Self { base, opener }
    }

    /// Values of the first alias present, masked and flag-rejected cells set to NaN
    fn read_aliases(
        &self,
        source: &dyn GriddedSource,
        var: &Variable,
        path: &Path,
    ) -> Result<Option<(Vec<usize>, Vec<f64>)>> {
        for alias in var.aliases() {
            if !source.has_variable(&alias.column) {
                continue;
            }
            let array = source.read_variable(&alias.column)?;
            let mut values = array.filled(f64::NAN);
            if let Some(flag) = alias.flag.as_deref().filter(|f| source.has_variable(f)) {
                let flags = source.read_variable(flag)?;
                if flags.len() != array.len() {
                    return Err(BgcError::InconsistentShapes {
                        path: path.to_path_buf(),
                        reason: format!(
                            "{} has shape {:?} but its flag {} has shape {:?}",
                            alias.column, array.shape, flag, flags.shape
                        ),
                    });
                }
                // Masked flags never match an accepted code
                for (value, flag_value) in values.iter_mut().zip(flags.filled(-1.0)) {
                    if !alias.accepts(flag_value) {
                        *value = f64::NAN;
                    }
                }
            }
            return Ok(Some((array.shape, values)));
        }
        Ok(None)
    }
}

/// Common `(n, m)` grid of the loaded variables
fn common_shape(path: &Path, loaded: &[Loaded]) -> Result<(usize, usize)> {
    let inconsistent = |reason: String| BgcError::InconsistentShapes {
        path: path.to_path_buf(),
        reason,
    };
    let mut first: Option<usize> = None;
    let mut second: Option<usize> = None;
    for item in loaded {
        if item.shape.len() > 2 {
            return Err(inconsistent(format!(
                "{} has {} dimensions",
                item.var.name(),
                item.shape.len()
            )));
        }
        let n = item.shape.first().copied().unwrap_or(1);
        if n > 1 {
            match first {
                Some(expected) if expected != n => {
                    return Err(inconsistent(format!(
                        "first dimension of {} is {}, expected {}",
                        item.var.name(),
                        n,
                        expected
                    )));
                }
                _ => first = Some(n),
            }
        }
        if let Some(&m) = item.shape.get(1) {
            match second {
                Some(expected) if expected != m => {
                    return Err(inconsistent(format!(
                        "second dimension of {} is {}, expected {}",
                        item.var.name(),
                        m,
                        expected
                    )));
                }
                _ => second = Some(m),
            }
        }
    }
    Ok((first.unwrap_or(1), second.unwrap_or(1)))
}

/// Lay a variable out on the `(n, m)` grid, row-major
fn flatten(path: &Path, item: &Loaded, n: usize, m: usize) -> Result<Vec<f64>> {
    if item.values.len() == 1 {
        return Ok(vec![item.values[0]; n * m]);
    }
    if item.shape.len() == 2 {
        if item.shape != [n, m] {
            return Err(BgcError::InconsistentShapes {
                path: path.to_path_buf(),
                reason: format!(
                    "{} has shape {:?}, expected {:?}",
                    item.var.name(),
                    item.shape,
                    [n, m]
                ),
            });
        }
        return Ok(item.values.clone());
    }
    Ok(item
        .values
        .iter()
        .flat_map(|&v| std::iter::repeat_n(v, m))
        .collect())
}

/// Dates from a days-since-origin axis
pub fn decode_days(values: &[f64]) -> Result<Vec<Option<NaiveDateTime>>> {
    let origin = NaiveDateTime::parse_from_str(NETCDF_TIME_ORIGIN, "%Y-%m-%dT%H:%M:%S")?;
    Ok(values
        .iter()
        .map(|&days| {
            if !days.is_finite() {
                return None;
            }
            let millis = (days * 86_400_000.0).round() as i64;
            origin.checked_add_signed(Duration::try_milliseconds(millis)?)
        })
        .collect())
}

/// Identifier used as expocode: fourth `_` token of the file stem, or the stem
pub fn file_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split('_')
        .nth(3)
        .map(|token| token.split('.').next().unwrap_or(token).to_string())
        .unwrap_or(stem)
}

impl Loader for NetCDFLoader {
    fn base(&self) -> &LoaderBase {
        &self.base
    }

    fn load(&self, path: &Path, constraints: &Constraints) -> Result<DataFrame> {
        if !path.exists() {
            return Err(BgcError::file_not_found(path));
        }
        let source = self.opener.open(path)?;
        let loading = self.base.loading_variables();

        let mut loaded = Vec::new();
        for var in loading.in_dset() {
            match self.read_aliases(source.as_ref(), var, path)? {
                Some((shape, values)) => loaded.push(Loaded { var, shape, values }),
                None => debug!("{} absent from {}", var.name(), path.display()),
            }
        }
        if loaded.is_empty() {
            return Err(BgcError::AllVariablesMissing {
                path: path.to_path_buf(),
            });
        }
        let (n, m) = common_shape(path, &loaded)?;

        let mut columns: Vec<Column> = Vec::new();
        let mut dates = None;
        for item in &loaded {
            let values = flatten(path, item, n, m)?;
            if item.var.var_type() == VarType::Datetime {
                dates = Some(decode_days(&values)?);
            } else {
                columns.push(frame::float_column(item.var.label(), values));
            }
        }
        let mut df = if columns.is_empty() {
            DataFrame::empty_with_height(n * m)
        } else {
            DataFrame::new(columns)?
        };
        if let Some(dates) = dates {
            set_calendar_columns(&mut df, loading, &dates)?;
            if let Some(label) = self.base.date_label() {
                if constraints.is_constrained(&label) {
                    df = constraints.apply_specific_constraint(&label, &df)?;
                }
            }
        }
        if let Ok(label) = loading.label_of(names::EXPOCODE) {
            let id = file_id(path);
            let height = df.height();
            frame::set_column(&mut df, frame::str_column(&label, vec![Some(id); height]))?;
        }
        self.base.finalize(df, constraints)
    }
}
