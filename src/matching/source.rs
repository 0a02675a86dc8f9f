//! Archive loading restricted to the cells nearest to observations.

use super::{NearestNeighborIndex, correspond};
use crate::config::Verbosity;
use crate::constants::{OBS_INDEX_COLUMN, names};
use crate::constraints::Constraints;
use crate::error::Result;
use crate::frame;
use crate::loaders::SelectiveABFileLoader;
use crate::loaders::abfile::date_from_basename;
use crate::progress;
use crate::storer::{Storer, StorerView};
use crate::variables::{TemplateVar, VarType, VariableEnsemble};
use polars::prelude::DataFrame;
use tracing::debug;

/// Simulated values at the observations' nearest grid cells, date by date
#[derive(Debug)]
pub struct SelectiveDataSource<'a> {
    loader: SelectiveABFileLoader,
    observations: &'a Storer,
    verbosity: Verbosity,
}

impl<'a> SelectiveDataSource<'a> {
    pub fn new(loader: SelectiveABFileLoader, observations: &'a Storer, verbosity: Verbosity) -> Self {
        Self {
            loader,
            observations,
            verbosity,
        }
    }

    pub fn loader(&self) -> &SelectiveABFileLoader {
        &self.loader
    }

    /// Ensemble of the matched simulations: the provider's variables plus
    /// the observation row each simulated row belongs to
    pub fn variables(&self) -> Result<VariableEnsemble> {
        let mut ensemble = self.loader.base().variables().clone();
        ensemble.add_var(TemplateVar::new(OBS_INDEX_COLUMN, "[]", VarType::Int).not_in_file())?;
        Ok(ensemble)
    }

    /// Load every selected archive whose day carries observations.
    ///
    /// Each returned row holds one level of the cell nearest to the
    /// observation whose row position is in the `OBS_INDEX` column.
    pub fn load_all(&self, constraints: &Constraints) -> Result<Storer> {
        let base = self.loader.base();
        let grid = self.loader.grid()?;
        let index = NearestNeighborIndex::new(&grid.latitude, &grid.longitude);

        let obs_vars = self.observations.variables();
        let obs_frame = self.observations.frame();
        let dates = frame::datetime_values(obs_frame, &obs_vars.label_of(names::DATE)?)?;
        let latitude = frame::float_values(obs_frame, &obs_vars.label_of(names::LATITUDE)?)?;
        let longitude = frame::float_values(obs_frame, &obs_vars.label_of(names::LONGITUDE)?)?;

        let basenames = self.loader.select_files(constraints)?;
        progress!(
            self.verbosity.is_verbose(),
            "{}: matching {} observations against {} archives",
            base.provider,
            obs_frame.height(),
            basenames.len()
        );

        let mut frames: Vec<DataFrame> = Vec::new();
        for basename in basenames {
            let day = date_from_basename(&basename)?.date();
            let rows: Vec<usize> = dates
                .iter()
                .enumerate()
                .filter(|(_, d)| d.is_some_and(|d| d.date() == day))
                .map(|(i, _)| i)
                .collect();
            if rows.is_empty() {
                debug!("No observation on {}, skipping {}", day, basename.display());
                continue;
            }
            let obs_ids: Vec<i64> = rows.iter().map(|&r| r as i64).collect();
            let lat: Vec<f64> = rows.iter().map(|&r| latitude[r]).collect();
            let lon: Vec<f64> = rows.iter().map(|&r| longitude[r]).collect();
            let (mask, matching) = correspond(&index, &obs_ids, &lat, &lon, grid.shape)?;
            if matching.is_empty() {
                debug!("No observation with a position on {}", day);
                continue;
            }
            let loaded = self.loader.load(&basename, constraints, &mask)?;
            let matched = matching.apply(&loaded)?;
            progress!(
                self.verbosity.is_detailed(),
                "{}: {} cells, {} rows for {} observations",
                basename.display(),
                mask.count(),
                matched.height(),
                matching.len()
            );
            frames.push(matched);
        }

        let ensemble = self.variables()?;
        let mut storer = match frame::concat_frames(frames)? {
            Some(data) => Storer::new(
                data,
                base.category.clone(),
                vec![base.provider.clone()],
                ensemble,
                self.verbosity,
            ),
            None => Storer::empty(
                base.category.clone(),
                vec![base.provider.clone()],
                ensemble,
                self.verbosity,
            )?,
        };
        storer.insert_features()?;
        Ok(storer)
    }
}
