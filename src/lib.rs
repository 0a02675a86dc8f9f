//! BGC Processor Library
//!
//! A Rust library for normalizing biogeochemical ocean observations from
//! heterogeneous providers and comparing them with ocean-model archives.
//!
//! This library provides tools for:
//! - Describing provider variables with aliases, quality flags and corrections
//! - Loading delimited text, NetCDF and HYCOM `.a`/`.b` archives into one schema
//! - Filtering rows with boundary, superset and polygon constraints
//! - Collapsing duplicated measurements within and across providers
//! - Saving and reading the fixed-width normalized format, range by range
//! - Matching observations to their nearest model cells and interpolating in depth

pub mod config;
pub mod constants;
pub mod constraints;
pub mod data_source;
pub mod error;
pub mod frame;
pub mod interpolation;
pub mod io;
pub mod loaders;
pub mod matching;
pub mod providers;
pub mod storer;
pub mod variables;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{DataFormat, ProviderConfig, RunConfig, Verbosity};
pub use constraints::Constraints;
pub use data_source::DataSource;
pub use error::{BgcError, Result};
pub use interpolation::Interpolator;
pub use matching::{Mask, Match, NearestNeighborIndex, SelectiveDataSource};
pub use storer::{Slice, Storer, StorerView};
pub use variables::{TemplateVar, Variable, VariableEnsemble};
