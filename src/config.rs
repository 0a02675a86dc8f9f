//! Run configuration and validation.
//!
//! A run is described by a TOML file: the date window and its splitting
//! interval, the spatial bounds, the saving options and one table per
//! provider. Everything is validated once when the file is loaded so that
//! loaders never see an inconsistent configuration.

use crate::constants::names;
use crate::constraints::{ConstraintValue, Constraints};
use crate::error::{BgcError, Result};
use crate::io::dateranges::{DateRangeGenerator, Interval};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Amount of progress reporting a component emits
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Progress events only at debug level
    Quiet,
    /// One info event per provider and per saved file
    #[default]
    Normal,
    /// One info event per loaded file
    Detailed,
}

impl Verbosity {
    pub fn is_verbose(&self) -> bool {
        *self >= Verbosity::Normal
    }

    pub fn is_detailed(&self) -> bool {
        *self >= Verbosity::Detailed
    }
}

/// Report progress at info level when `verbose`, at debug level otherwise
#[macro_export]
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// Raw file format of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Csv,
    Netcdf,
    Abfiles,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Netcdf => "netcdf",
            DataFormat::Abfiles => "abfiles",
        }
    }
}

impl FromStr for DataFormat {
    type Err = BgcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(DataFormat::Csv),
            "netcdf" | "nc" => Ok(DataFormat::Netcdf),
            "abfiles" | "abfile" => Ok(DataFormat::Abfiles),
            other => Err(BgcError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// Per-provider loading settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Directory holding the provider's files
    pub path: PathBuf,
    pub category: String,
    /// File names (with or without extension) never loaded
    pub exclude: Vec<String>,
    pub format: DataFormat,
    /// File name regex, `{years}` is replaced by the constrained years
    pub files_pattern: Option<String>,
    /// Basename of the `regional.grid` pair for ABFile providers
    pub grid_basename: Option<String>,
    pub separator: char,
    /// Whether a units row follows the CSV header
    pub units_row: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            category: crate::constants::DEFAULT_CATEGORY.to_string(),
            exclude: Vec::new(),
            format: DataFormat::Csv,
            files_pattern: None,
            grid_basename: None,
            separator: ',',
            units_row: false,
        }
    }
}

/// Complete configuration of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
    pub interval: Interval,
    /// Range length in days when `interval = "custom"`
    pub custom_interval: u32,

    pub latitude_min: Option<f64>,
    pub latitude_max: Option<f64>,
    pub longitude_min: Option<f64>,
    pub longitude_max: Option<f64>,
    pub depth_min: Option<f64>,
    pub depth_max: Option<f64>,
    pub expocodes: Vec<String>,

    /// Saving order of the normalized variables (all variables when empty)
    pub variables: Vec<String>,
    /// Provider order used to break cross-provider duplicates
    pub priority: Vec<String>,
    pub saving_dir: PathBuf,
    /// Write one aggregated file per range instead of one per provider
    pub aggregate: bool,
    pub verbosity: Verbosity,

    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            date_min: None,
            date_max: None,
            interval: Interval::Day,
            custom_interval: 1,
            latitude_min: None,
            latitude_max: None,
            longitude_min: None,
            longitude_max: None,
            depth_min: None,
            depth_max: None,
            expocodes: Vec::new(),
            variables: Vec::new(),
            priority: Vec::new(),
            saving_dir: PathBuf::from("output"),
            aggregate: true,
            verbosity: Verbosity::Normal,
            providers: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    /// Read and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        debug!("Loaded configuration file: {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.date_min, self.date_max) {
            if min > max {
                return Err(BgcError::configuration(format!(
                    "date_min ({}) is after date_max ({})",
                    min, max
                )));
            }
        }
        if self.interval == Interval::Custom && self.custom_interval == 0 {
            return Err(BgcError::configuration(
                "custom_interval must be positive with a custom interval",
            ));
        }
        for (pair, (min, max)) in [
            ("latitude", (self.latitude_min, self.latitude_max)),
            ("longitude", (self.longitude_min, self.longitude_max)),
            ("depth", (self.depth_min, self.depth_max)),
        ] {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(BgcError::configuration(format!(
                        "{}_min ({}) is greater than {}_max ({})",
                        pair, min, pair, max
                    )));
                }
            }
        }
        for (name, provider) in &self.providers {
            if provider.path.as_os_str().is_empty() {
                return Err(BgcError::configuration(format!(
                    "provider '{}' has no path",
                    name
                )));
            }
            if provider.format == DataFormat::Abfiles && provider.grid_basename.is_none() {
                return Err(BgcError::configuration(format!(
                    "provider '{}' reads ABFiles but has no grid_basename",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Row constraints implied by the configured bounds
    pub fn constraints(&self) -> Constraints {
        let mut constraints = Constraints::new();
        constraints.add_boundary_constraint(
            names::DATE,
            self.date_min.map(ConstraintValue::from),
            self.date_max
                .and_then(|d| d.and_hms_opt(23, 59, 59))
                .map(ConstraintValue::from),
        );
        for (label, min, max) in [
            (names::LATITUDE, self.latitude_min, self.latitude_max),
            (names::LONGITUDE, self.longitude_min, self.longitude_max),
            (names::DEPTH, self.depth_min, self.depth_max),
        ] {
            constraints.add_boundary_constraint(
                label,
                min.map(ConstraintValue::from),
                max.map(ConstraintValue::from),
            );
        }
        constraints.add_superset_constraint(
            names::EXPOCODE,
            self.expocodes
                .iter()
                .map(|e| ConstraintValue::from(e.as_str()))
                .collect(),
        );
        constraints
    }

    /// Date range generator over the configured window
    pub fn date_ranges(&self) -> Result<DateRangeGenerator> {
        let (Some(start), Some(end)) = (self.date_min, self.date_max) else {
            return Err(BgcError::configuration(
                "date_min and date_max are required to split the run into ranges",
            ));
        };
        DateRangeGenerator::new(start, end, self.interval, self.custom_interval)
    }

    pub fn provider(&self, name: &str) -> Result<&ProviderConfig> {
        self.providers.get(name).ok_or_else(|| {
            BgcError::configuration(format!("provider '{}' is not configured", name))
        })
    }
}
