//! Derived variables.
//!
//! A [`Feature`] computes a new column from columns already present in a
//! normalized table. The seawater features implement the EOS-80 formulas:
//! pressure from depth (Saunders 1981), density at the surface (UNESCO 1983)
//! and potential temperature (Bryden 1973 lapse rate, Runge-Kutta integrated).

use super::descriptor::{TemplateVar, VarType};
use crate::constants::names;
use std::fmt;

/// Computation of a derived variable from other variables
pub trait Feature: Send + Sync + fmt::Debug {
    /// Description of the produced variable
    fn template(&self) -> TemplateVar;

    /// Names of the variables the feature reads, in `compute` argument order
    fn required_vars(&self) -> &[String];

    /// Compute the feature row by row; `inputs[i]` holds `required_vars()[i]`
    fn compute(&self, inputs: &[Vec<f64>]) -> Vec<f64>;
}

fn feature_template(name: &str, unit: &str) -> TemplateVar {
    TemplateVar::new(name, unit, VarType::Float).with_formats("%-10s", "%10.3f")
}

/// Sea pressure (dbar) from depth and latitude
#[derive(Debug, Clone)]
pub struct Pressure {
    required: Vec<String>,
}

impl Pressure {
    pub fn new(depth: &str, latitude: &str) -> Self {
        Self {
            required: vec![depth.to_string(), latitude.to_string()],
        }
    }
}

impl Default for Pressure {
    fn default() -> Self {
        Self::new(names::DEPTH, names::LATITUDE)
    }
}

impl Feature for Pressure {
    fn template(&self) -> TemplateVar {
        feature_template(names::PRESSURE, "[dbars]")
    }

    fn required_vars(&self) -> &[String] {
        &self.required
    }

    fn compute(&self, inputs: &[Vec<f64>]) -> Vec<f64> {
        inputs[0]
            .iter()
            .zip(&inputs[1])
            .map(|(&depth, &lat)| pressure_from_depth(depth.abs(), lat))
            .collect()
    }
}

/// Potential temperature (deg C) referenced to the surface
#[derive(Debug, Clone)]
pub struct PotentialTemperature {
    required: Vec<String>,
}

impl PotentialTemperature {
    pub fn new(salinity: &str, temperature: &str, pressure: &str) -> Self {
        Self {
            required: vec![
                salinity.to_string(),
                temperature.to_string(),
                pressure.to_string(),
            ],
        }
    }
}

impl Default for PotentialTemperature {
    fn default() -> Self {
        Self::new(names::SALINITY, names::TEMPERATURE, names::PRESSURE)
    }
}

impl Feature for PotentialTemperature {
    fn template(&self) -> TemplateVar {
        feature_template(names::POTENTIAL_TEMPERATURE, "[deg_C]")
    }

    fn required_vars(&self) -> &[String] {
        &self.required
    }

    fn compute(&self, inputs: &[Vec<f64>]) -> Vec<f64> {
        inputs[0]
            .iter()
            .zip(&inputs[1])
            .zip(&inputs[2])
            .map(|((&s, &t), &p)| potential_temperature(s, t, p, 0.0))
            .collect()
    }
}

/// Sigma-t (kg/m3): surface density minus 1000
#[derive(Debug, Clone)]
pub struct SigmaT {
    required: Vec<String>,
}

impl SigmaT {
    pub fn new(salinity: &str, temperature: &str) -> Self {
        Self {
            required: vec![salinity.to_string(), temperature.to_string()],
        }
    }
}

impl Default for SigmaT {
    fn default() -> Self {
        Self::new(names::SALINITY, names::TEMPERATURE)
    }
}

impl Feature for SigmaT {
    fn template(&self) -> TemplateVar {
        feature_template(names::SIGMA_T, "[kg/m3]")
    }

    fn required_vars(&self) -> &[String] {
        &self.required
    }

    fn compute(&self, inputs: &[Vec<f64>]) -> Vec<f64> {
        inputs[0]
            .iter()
            .zip(&inputs[1])
            .map(|(&s, &t)| density_at_surface(s, t) - 1000.0)
            .collect()
    }
}

const T68_FACTOR: f64 = 1.00024;

/// Pressure (dbar) at `depth` meters for a given latitude (degrees)
pub fn pressure_from_depth(depth: f64, latitude: f64) -> f64 {
    let x = latitude.abs().to_radians().sin();
    let c1 = 5.92e-3 + x * x * 5.25e-3;
    ((1.0 - c1) - ((1.0 - c1).powi(2) - 8.84e-6 * depth).sqrt()) / 4.42e-6
}

/// Density (kg/m3) of seawater at zero pressure
pub fn density_at_surface(salinity: f64, temperature: f64) -> f64 {
    let t68 = temperature * T68_FACTOR;
    let s = salinity;
    let smow = 999.842594
        + (6.793952e-2 + (-9.095290e-3 + (1.001685e-4 + (-1.120083e-6 + 6.536332e-9 * t68) * t68) * t68) * t68)
            * t68;
    let b = 8.24493e-1 + (-4.0899e-3 + (7.6438e-5 + (-8.2467e-7 + 5.3875e-9 * t68) * t68) * t68) * t68;
    let c = -5.72466e-3 + (1.0227e-4 - 1.6546e-6 * t68) * t68;
    let d = 4.8314e-4;
    smow + b * s + c * s * s.sqrt() + d * s * s
}

/// Adiabatic temperature gradient (deg C / dbar)
fn adiabatic_gradient(salinity: f64, temperature: f64, pressure: f64) -> f64 {
    let t68 = temperature * T68_FACTOR;
    let ds = salinity - 35.0;
    let p = pressure;
    3.5803e-5
        + (8.5258e-6 + (-6.836e-8 + 6.6228e-10 * t68) * t68) * t68
        + (1.8932e-6 - 4.2393e-8 * t68) * ds
        + ((1.8741e-8 + (-6.7795e-10 + (8.733e-12 - 5.4481e-14 * t68) * t68) * t68)
            + (-1.1351e-10 + 2.7759e-12 * t68) * ds)
            * p
        + (-4.6206e-13 + (1.8676e-14 - 2.1687e-16 * t68) * t68) * p * p
}

/// Potential temperature of a parcel moved from `pressure` to `reference`
pub fn potential_temperature(salinity: f64, temperature: f64, pressure: f64, reference: f64) -> f64 {
    let sqrt2 = std::f64::consts::SQRT_2;
    let del_p = reference - pressure;
    let mut del_th = del_p * adiabatic_gradient(salinity, temperature, pressure);
    let mut th = temperature * T68_FACTOR + 0.5 * del_th;
    let mut q = del_th;

    del_th = del_p * adiabatic_gradient(salinity, th / T68_FACTOR, pressure + 0.5 * del_p);
    th += (1.0 - 1.0 / sqrt2) * (del_th - q);
    q = (2.0 - sqrt2) * del_th + (-2.0 + 3.0 / sqrt2) * q;

    del_th = del_p * adiabatic_gradient(salinity, th / T68_FACTOR, pressure + 0.5 * del_p);
    th += (1.0 + 1.0 / sqrt2) * (del_th - q);
    q = (2.0 + sqrt2) * del_th + (-2.0 - 3.0 / sqrt2) * q;

    del_th = del_p * adiabatic_gradient(salinity, th / T68_FACTOR, pressure + del_p);
    (th + (del_th - 2.0 * q) / 6.0) / T68_FACTOR
}
