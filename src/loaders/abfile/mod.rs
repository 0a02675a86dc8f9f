//! HYCOM archive loading.
//!
//! - [`format`] - `.a`/`.b` pair reader (and fixture writer)
//! - [`loader`] - Full-grid and mask-restricted loaders

pub mod format;
pub mod loader;

pub use format::{ABFile, ABKind, FieldData, FieldRecord, write_abfile};
pub use loader::{
    ABFileLoader, GridCoordinates, SelectiveABFileLoader, date_from_basename, depth_from_thickness,
};
