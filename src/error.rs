//! Error handling for biogeochemical data processing.
//!
//! Separates configuration errors (raised immediately, never retried) from
//! file-integrity errors (fatal for the offending file). Data-quality
//! conditions such as rejected flags are not errors and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BgcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Date parsing error: {0}")]
    DateParsing(#[from] chrono::ParseError),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Duplicate variable name: {name}")]
    DuplicateVariable { name: String },

    #[error("Unknown variable '{name}'. Valid names are: {valid}")]
    UnknownVariable { name: String, valid: String },

    #[error("Features cannot be constructed, unresolved: {unresolved}")]
    UnresolvedFeatures { unresolved: String },

    #[error("Invalid date constraint: {reason}")]
    InvalidDateConstraint { reason: String },

    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Storers cannot be combined: {reason}")]
    IncompatibleStorers { reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Inconsistent variable shapes in {path}: {reason}")]
    InconsistentShapes { path: PathBuf, reason: String },

    #[error("Empty data for all variables to consider in {path}")]
    AllVariablesMissing { path: PathBuf },

    #[error("Invalid file format: {path} - {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Unsupported data format: {format}")]
    UnsupportedFormat { format: String },
}

impl BgcError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a file format error for the given path
    pub fn invalid_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a file not found error
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a value parsing error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an invalid date constraint error
    pub fn invalid_date_constraint(reason: impl Into<String>) -> Self {
        Self::InvalidDateConstraint {
            reason: reason.into(),
        }
    }

    /// Create an incompatible storers error
    pub fn incompatible_storers(reason: impl Into<String>) -> Self {
        Self::IncompatibleStorers {
            reason: reason.into(),
        }
    }

    /// Whether the error invalidates the whole run rather than a single file
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::ConfigFile(_)
                | Self::DuplicateVariable { .. }
                | Self::UnknownVariable { .. }
                | Self::UnresolvedFeatures { .. }
                | Self::InvalidDateConstraint { .. }
                | Self::ShapeMismatch { .. }
                | Self::IncompatibleStorers { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BgcError>;
