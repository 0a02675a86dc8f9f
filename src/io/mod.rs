//! Saving and reading normalized datasets.
//!
//! # Architecture
//!
//! - [`format`] - Printf-style field formats
//! - [`dateranges`] - Splitting a run window into date ranges
//! - [`saver`] - Fixed-width export, aggregated or per provider
//! - [`reader`] - Reading exported files back into storers

pub mod dateranges;
pub mod format;
pub mod reader;
pub mod saver;

pub use dateranges::{DateRange, DateRangeGenerator, Interval};
pub use format::FieldFormat;
pub use reader::{Reader, read_files};
pub use saver::StorerSaver;
