//! Application constants for the BGC processor
//!
//! Column names, physical constants, file-format markers and default
//! formats shared by the loaders, the storer and the savers.

// =============================================================================
// Canonical Variable Names
// =============================================================================

/// Canonical names of the variables every normalized dataset is built around
pub mod names {
    pub const PROVIDER: &str = "PROVIDER";
    pub const EXPOCODE: &str = "EXPOCODE";
    pub const DATE: &str = "DATE";
    pub const YEAR: &str = "YEAR";
    pub const MONTH: &str = "MONTH";
    pub const DAY: &str = "DAY";
    pub const HOUR: &str = "HOUR";
    pub const LATITUDE: &str = "LATITUDE";
    pub const LONGITUDE: &str = "LONGITUDE";
    pub const DEPTH: &str = "DEPH";
    pub const TEMPERATURE: &str = "TEMP";
    pub const SALINITY: &str = "PSAL";
    pub const OXYGEN: &str = "DOX2";
    pub const PHOSPHATE: &str = "PHOS";
    pub const NITRATE: &str = "NTRA";
    pub const SILICATE: &str = "SLCA";
    pub const CHLOROPHYLL: &str = "CPHL";
    pub const PRESSURE: &str = "PRES";
    pub const POTENTIAL_TEMPERATURE: &str = "PTEMP";
    pub const SIGMA_T: &str = "SIGT";
}

/// Columns read back from saved files when no explicit list is given
pub const DEFAULT_READ_COLUMNS: &[&str] = &[
    names::PROVIDER,
    names::EXPOCODE,
    names::DATE,
    names::YEAR,
    names::MONTH,
    names::DAY,
    names::HOUR,
    names::LATITUDE,
    names::LONGITUDE,
    names::DEPTH,
];

/// Identity key used when collapsing duplicated rows
pub const DUPLICATE_KEY: &[&str] = &[
    names::PROVIDER,
    names::EXPOCODE,
    names::DATE,
    names::YEAR,
    names::MONTH,
    names::DAY,
    names::HOUR,
    names::LATITUDE,
    names::LONGITUDE,
    names::DEPTH,
];

/// Category assigned to data read back from saved files
pub const DEFAULT_CATEGORY: &str = "in_situ";

// =============================================================================
// Temporary Columns
// =============================================================================

/// Flat grid-cell index attached to rows loaded through a mask
pub const GRID_INDEX_COLUMN: &str = "GRID_INDEX";

/// Observation row identity attached to matched simulation rows
pub const OBS_INDEX_COLUMN: &str = "OBS_INDEX";

// =============================================================================
// Physical Constants
// =============================================================================

/// Pressure (Pa) exerted by one meter of seawater
pub const PASCAL_BY_SEAWATER_METER: f64 = 9806.0;

/// Seawater reference density (kg/m3) used for unit conversions
pub const SEAWATER_DENSITY_KG_BY_M3: f64 = 1025.0;

/// Millimoles of dissolved oxygen per millilitre
pub const OXYGEN_MMOL_BY_ML: f64 = 44.6608009;

/// Values at or beyond this magnitude are fill values in binary archives
pub const FILL_VALUE_THRESHOLD: f64 = 1e30;

// =============================================================================
// File Formats
// =============================================================================

/// Placeholder substituted with the year alternation in file name patterns
pub const YEARS_PLACEHOLDER: &str = "{years}";

/// Regex matching any year when no date constraint is active
pub const ANY_YEAR_PATTERN: &str = "....";

/// Record size granularity (in 4-byte words) of ABFile `.a` data files
pub const ABFILE_RECORD_BLOCK: usize = 4096;

/// Date layout of the ABFile basename suffix
pub const ABFILE_DATE_FORMAT: &str = "%Y_%j_%H";

/// Reference epoch of NetCDF relative time axes (days since)
pub const NETCDF_TIME_ORIGIN: &str = "1950-01-01T00:00:00";

/// Default column-width formats for fixed-width export
pub const DEFAULT_NAME_FORMAT: &str = "%-15s";
pub const DEFAULT_VALUE_FORMAT: &str = "%15s";

/// Date layout used when writing datetimes to fixed-width files
pub const SAVED_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Date layout used in saved file names
pub const FILENAME_DATE_FORMAT: &str = "%Y%m%d";
