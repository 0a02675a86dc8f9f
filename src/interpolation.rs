//! Vertical interpolation of matched simulations onto observation depths.
//!
//! Matched simulations hold every level of the cell nearest to each
//! observation (tagged by `OBS_INDEX`). The interpolator collapses each
//! group into one row at the observation's depth. Values outside the
//! simulated depth range are clamped to the nearest level.

use crate::config::Verbosity;
use crate::constants::{OBS_INDEX_COLUMN, names};
use crate::error::Result;
use crate::frame;
use crate::progress;
use crate::storer::{Storer, StorerView};
use crate::variables::VarType;
use std::collections::BTreeMap;

/// Linear interpolation over `(depth, value)` levels sorted by depth,
/// clamped at both ends. NaN when `target` is NaN or there is no level.
pub fn interpolate_at(levels: &[(f64, f64)], target: f64) -> f64 {
    let (Some(first), Some(last)) = (levels.first(), levels.last()) else {
        return f64::NAN;
    };
    if target.is_nan() {
        return f64::NAN;
    }
    if target <= first.0 {
        return first.1;
    }
    if target >= last.0 {
        return last.1;
    }
    let upper = levels.partition_point(|(depth, _)| *depth < target);
    let (d1, v1) = levels[upper];
    if d1 == target {
        return v1;
    }
    let (d0, v0) = levels[upper - 1];
    v0 + (v1 - v0) * (target - d0) / (d1 - d0)
}

/// The shared value of a column whose non-NaN entries are all equal, NaN when all are NaN
fn constant_value(values: &[f64]) -> Option<f64> {
    let mut valid = values.iter().copied().filter(|v| !v.is_nan());
    match valid.next() {
        None => Some(f64::NAN),
        Some(first) => valid.all(|v| v == first).then_some(first),
    }
}

/// Collapses matched simulation levels onto observation depths
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpolator {
    verbosity: Verbosity,
}

impl Interpolator {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// One row per observation with matched simulation rows, in
    /// observation order.
    ///
    /// Float columns varying along the levels are interpolated at the
    /// observation depth; constant and non-float columns keep the value of
    /// the group's first row. The output depth is the observation depth and
    /// the `OBS_INDEX` column is dropped.
    pub fn interpolate(&self, observations: &Storer, simulations: &Storer) -> Result<Storer> {
        let obs_depth = frame::float_values(
            observations.frame(),
            &observations.variables().label_of(names::DEPTH)?,
        )?;

        let mut variables = simulations.variables().clone();
        variables.remove_var(OBS_INDEX_COLUMN)?;
        let depth_label = variables.label_of(names::DEPTH)?;

        let sims = simulations.frame();
        let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (row, obs) in frame::int_values(sims, OBS_INDEX_COLUMN)?.into_iter().enumerate() {
            if let Some(obs) = obs.filter(|&o| o >= 0 && (o as usize) < obs_depth.len()) {
                groups.entry(obs).or_default().push(row);
            }
        }

        let sim_depth = frame::float_values(sims, &depth_label)?;
        let targets: Vec<f64> = groups.keys().map(|&o| obs_depth[o as usize]).collect();
        let first_rows: Vec<usize> = groups.values().map(|rows| rows[0]).collect();
        let mut data = frame::take_rows(sims, &first_rows)?;
        data = frame::select_columns(&data, &variables.labels())?;

        for var in variables.iter().filter(|v| v.var_type() == VarType::Float) {
            let label = var.label();
            if label == depth_label {
                continue;
            }
            let values = frame::float_values(sims, label)?;
            let interpolated = groups
                .values()
                .zip(&targets)
                .map(|(rows, &target)| {
                    let column: Vec<f64> = rows.iter().map(|&r| values[r]).collect();
                    if let Some(value) = constant_value(&column) {
                        return value;
                    }
                    let mut levels: Vec<(f64, f64)> = rows
                        .iter()
                        .map(|&r| (sim_depth[r], values[r]))
                        .filter(|(depth, _)| !depth.is_nan())
                        .collect();
                    levels.sort_by(|a, b| a.0.total_cmp(&b.0));
                    interpolate_at(&levels, target)
                })
                .collect();
            frame::set_column(&mut data, frame::float_column(label, interpolated))?;
        }
        frame::set_column(&mut data, frame::float_column(&depth_label, targets))?;

        progress!(
            self.verbosity.is_verbose(),
            "Interpolated {} simulated rows onto {} observations",
            sims.height(),
            data.height()
        );
        Ok(Storer::new(
            data,
            simulations.category().to_string(),
            simulations.providers().to_vec(),
            variables,
            self.verbosity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{TemplateVar, VariableEnsemble};
    use polars::prelude::DataFrame;

    fn observations(depths: Vec<f64>) -> Storer {
        let ensemble = VariableEnsemble::new([
            TemplateVar::new(names::DEPTH, "[m]", VarType::Float).in_file_as(["DEPH"]),
        ])
        .unwrap();
        let data = DataFrame::new(vec![frame::float_column(names::DEPTH, depths)]).unwrap();
        Storer::new(data, "in_situ", vec!["GLODAPv2".into()], ensemble, Verbosity::Quiet)
    }

    fn simulations(obs: Vec<i64>, depth: Vec<f64>, temp: Vec<f64>, lat: Vec<f64>) -> Storer {
        let ensemble = VariableEnsemble::new([
            TemplateVar::new(names::LATITUDE, "[deg_N]", VarType::Float).in_file_as(["plat"]),
            TemplateVar::new(names::DEPTH, "[m]", VarType::Float).in_file_as(["thknss"]),
            TemplateVar::new(names::TEMPERATURE, "[deg_C]", VarType::Float).in_file_as(["temp"]),
            TemplateVar::new(OBS_INDEX_COLUMN, "[]", VarType::Int).not_in_file(),
        ])
        .unwrap();
        let data = DataFrame::new(vec![
            frame::float_column(names::LATITUDE, lat),
            frame::float_column(names::DEPTH, depth),
            frame::float_column(names::TEMPERATURE, temp),
            frame::int_column(OBS_INDEX_COLUMN, obs.into_iter().map(Some).collect()),
        ])
        .unwrap();
        Storer::new(data, "float", vec!["HYCOM".into()], ensemble, Verbosity::Quiet)
    }

    #[test]
    fn test_interpolate_at_levels_and_edges() {
        let levels = [(-100.0, 4.0), (-50.0, 8.0), (-10.0, 12.0)];
        assert_eq!(interpolate_at(&levels, -50.0), 8.0);
        assert_eq!(interpolate_at(&levels, -75.0), 6.0);
        assert_eq!(interpolate_at(&levels, -500.0), 4.0);
        assert_eq!(interpolate_at(&levels, 0.0), 12.0);
        assert!(interpolate_at(&levels, f64::NAN).is_nan());
        assert!(interpolate_at(&[], -5.0).is_nan());
    }

    #[test]
    fn test_one_row_per_matched_observation() {
        let obs = observations(vec![-30.0, -5.0, f64::NAN]);
        // observation 1 has no simulated rows
        let sims = simulations(
            vec![0, 0, 0, 2, 2],
            vec![-10.0, -50.0, f64::NAN, -10.0, -50.0],
            vec![12.0, 8.0, 99.0, 12.0, 8.0],
            vec![45.0, 45.0, 45.0, 46.0, 46.0],
        );
        let result = Interpolator::new(Verbosity::Quiet).interpolate(&obs, &sims).unwrap();
        assert_eq!(result.height(), 2);
        assert!(!result.variables().has_name(OBS_INDEX_COLUMN));
        assert!(!frame::has_column(result.frame(), OBS_INDEX_COLUMN));

        let temp = frame::float_values(result.frame(), names::TEMPERATURE).unwrap();
        assert!((temp[0] - 10.0).abs() < 1e-12);
        assert!(temp[1].is_nan());

        let lat = frame::float_values(result.frame(), names::LATITUDE).unwrap();
        assert_eq!(lat, vec![45.0, 46.0]);

        let depth = frame::float_values(result.frame(), names::DEPTH).unwrap();
        assert_eq!(depth[0], -30.0);
        assert!(depth[1].is_nan());
        assert_eq!(result.providers(), &["HYCOM".to_string()]);
    }

    #[test]
    fn test_exact_level_and_clamping() {
        let obs = observations(vec![-50.0, -400.0, -1.0]);
        let sims = simulations(
            vec![0, 0, 1, 1, 2, 2],
            vec![-10.0, -50.0, -10.0, -50.0, -10.0, -50.0],
            vec![12.0, 8.0, 12.0, 8.0, 12.0, 8.0],
            vec![0.0; 6],
        );
        let result = Interpolator::default().interpolate(&obs, &sims).unwrap();
        let temp = frame::float_values(result.frame(), names::TEMPERATURE).unwrap();
        assert_eq!(temp, vec![8.0, 8.0, 12.0]);
    }

    #[test]
    fn test_constant_columns_ignore_missing_levels() {
        assert_eq!(constant_value(&[f64::NAN, 5.0, 5.0]), Some(5.0));
        assert!(constant_value(&[f64::NAN, f64::NAN]).unwrap().is_nan());
        assert_eq!(constant_value(&[5.0, f64::NAN, 6.0]), None);

        // the missing level would otherwise clamp the shallow observation to NaN
        let obs = observations(vec![-5.0]);
        let sims = simulations(
            vec![0, 0, 0],
            vec![-10.0, -50.0, -100.0],
            vec![f64::NAN, 7.0, 7.0],
            vec![45.0; 3],
        );
        let result = Interpolator::default().interpolate(&obs, &sims).unwrap();
        let temp = frame::float_values(result.frame(), names::TEMPERATURE).unwrap();
        assert_eq!(temp, vec![7.0]);
    }
}
