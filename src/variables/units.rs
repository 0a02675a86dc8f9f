//! Unit conversions used as variable corrections.

use crate::constants::{OXYGEN_MMOL_BY_ML, SEAWATER_DENSITY_KG_BY_M3};

/// umol/kg to mmol/m3
pub fn umol_by_kg_to_mmol_by_m3(value: f64) -> f64 {
    value * 1e-3 * SEAWATER_DENSITY_KG_BY_M3
}

/// Dissolved oxygen mL/L to mmol/m3
pub fn doxy_ml_by_l_to_mmol_by_m3(value: f64) -> f64 {
    value * OXYGEN_MMOL_BY_ML
}
