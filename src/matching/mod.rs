//! Observation to model-grid correspondence.
//!
//! Observations are matched to their closest grid cell on the sphere
//! ([`nearest`]). The matched cells form a [`Mask`] so only those cells are
//! read from the archives, and a [`Match`] maps the loaded rows back onto
//! the observation rows. Depth alignment is done afterwards by
//! [`crate::interpolation::Interpolator`].
//!
//! # Architecture
//!
//! - [`nearest`] - R-tree nearest-neighbour index with haversine distances
//! - [`source`] - Per-date selective loading of an archive provider

pub mod nearest;
pub mod source;

pub use nearest::NearestNeighborIndex;
pub use source::SelectiveDataSource;

use crate::constants::{GRID_INDEX_COLUMN, OBS_INDEX_COLUMN};
use crate::error::{BgcError, Result};
use crate::frame;
use polars::prelude::DataFrame;
use std::collections::{BTreeSet, HashMap};

/// Boolean selection of grid cells with a parallel index grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    mask: Vec<bool>,
    index: Vec<i64>,
    shape: (usize, usize),
}

impl Mask {
    /// Mask over a `(jdm, idm)` grid; both grids must hold `jdm * idm` cells
    pub fn new(mask: Vec<bool>, index: Vec<i64>, shape: (usize, usize)) -> Result<Self> {
        let cells = shape.0 * shape.1;
        if mask.len() != cells || index.len() != cells {
            return Err(BgcError::ShapeMismatch {
                expected: vec![shape.0, shape.1],
                found: vec![mask.len(), index.len()],
            });
        }
        Ok(Self { mask, index, shape })
    }

    /// Mask selecting nothing, indexed by flat cell position
    pub fn make_empty(jdm: usize, idm: usize) -> Self {
        let cells = jdm * idm;
        Self {
            mask: vec![false; cells],
            index: (0..cells as i64).collect(),
            shape: (jdm, idm),
        }
    }

    /// Mask selecting the given flat cell positions
    pub fn from_cells(cells: &[usize], jdm: usize, idm: usize) -> Result<Self> {
        let mut mask = Self::make_empty(jdm, idm);
        for &cell in cells {
            let Some(selected) = mask.mask.get_mut(cell) else {
                return Err(BgcError::ShapeMismatch {
                    expected: vec![jdm, idm],
                    found: vec![cell],
                });
            };
            *selected = true;
        }
        Ok(mask)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Index grid, one value per cell
    pub fn index(&self) -> &[i64] {
        &self.index
    }

    /// Flat positions of the selected cells, ascending
    pub fn cells(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of selected cells
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    /// Values of the selected cells of a flattened grid
    pub fn apply(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.mask.len() {
            return Err(BgcError::ShapeMismatch {
                expected: vec![self.shape.0, self.shape.1],
                found: vec![values.len()],
            });
        }
        Ok(self.cells().into_iter().map(|c| values[c]).collect())
    }

    /// Cells selected by both masks, keeping this mask's index
    pub fn intersect(&self, other: &Mask) -> Result<Mask> {
        if self.shape != other.shape {
            return Err(BgcError::ShapeMismatch {
                expected: vec![self.shape.0, self.shape.1],
                found: vec![other.shape.0, other.shape.1],
            });
        }
        let mask = self
            .mask
            .iter()
            .zip(&other.mask)
            .map(|(a, b)| *a && *b)
            .collect();
        Mask::new(mask, self.index.clone(), self.shape)
    }
}

/// Correspondence from observation rows to their nearest grid cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    obs_ids: Vec<i64>,
    grid_ids: Vec<i64>,
}

impl Match {
    pub fn new(obs_ids: Vec<i64>, grid_ids: Vec<i64>) -> Result<Self> {
        if obs_ids.len() != grid_ids.len() {
            return Err(BgcError::ShapeMismatch {
                expected: vec![obs_ids.len()],
                found: vec![grid_ids.len()],
            });
        }
        Ok(Self { obs_ids, grid_ids })
    }

    pub fn obs_ids(&self) -> &[i64] {
        &self.obs_ids
    }

    pub fn grid_ids(&self) -> &[i64] {
        &self.grid_ids
    }

    pub fn len(&self) -> usize {
        self.obs_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obs_ids.is_empty()
    }

    /// Distinct matched grid cells
    pub fn grid_cells(&self) -> Vec<usize> {
        self.grid_ids
            .iter()
            .filter_map(|&g| usize::try_from(g).ok())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Copy every loaded row of each matched cell once per observation
    /// matched to it, tagged with the observation id.
    ///
    /// `loaded` must carry the grid index column, which is dropped.
    pub fn apply(&self, loaded: &DataFrame) -> Result<DataFrame> {
        let grid_index = frame::int_values(loaded, GRID_INDEX_COLUMN)?;
        let mut rows_by_cell: HashMap<i64, Vec<usize>> = HashMap::new();
        for (row, cell) in grid_index.iter().enumerate() {
            if let Some(cell) = cell {
                rows_by_cell.entry(*cell).or_default().push(row);
            }
        }
        let mut rows = Vec::new();
        let mut obs = Vec::new();
        for (&obs_id, grid_id) in self.obs_ids.iter().zip(&self.grid_ids) {
            let Some(cell_rows) = rows_by_cell.get(grid_id) else {
                continue;
            };
            rows.extend_from_slice(cell_rows);
            obs.extend(std::iter::repeat_n(Some(obs_id), cell_rows.len()));
        }
        let mut matched = frame::take_rows(loaded, &rows)?;
        frame::set_column(&mut matched, frame::int_column(OBS_INDEX_COLUMN, obs))?;
        frame::drop_column(&matched, GRID_INDEX_COLUMN)
    }
}

/// Mask of the cells nearest to the observations, and the matching itself.
///
/// Observations without a finite position are left unmatched.
pub fn correspond(
    index: &NearestNeighborIndex,
    obs_ids: &[i64],
    latitude: &[f64],
    longitude: &[f64],
    shape: (usize, usize),
) -> Result<(Mask, Match)> {
    let mut matched_obs = Vec::new();
    let mut matched_cells = Vec::new();
    for ((&id, &lat), &lon) in obs_ids.iter().zip(latitude).zip(longitude) {
        if let Some((cell, _)) = index.query(lat, lon) {
            matched_obs.push(id);
            matched_cells.push(cell as i64);
        }
    }
    let matching = Match::new(matched_obs, matched_cells)?;
    let mask = Mask::from_cells(&matching.grid_cells(), shape.0, shape.1)?;
    Ok((mask, matching))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_shapes_are_validated() {
        assert!(Mask::new(vec![true; 4], vec![0; 4], (2, 2)).is_ok());
        assert!(matches!(
            Mask::new(vec![true; 4], vec![0; 3], (2, 2)),
            Err(BgcError::ShapeMismatch { .. })
        ));
        assert!(Mask::from_cells(&[4], 2, 2).is_err());
    }

    #[test]
    fn test_mask_apply_and_intersect() {
        let a = Mask::from_cells(&[0, 2, 3], 2, 2).unwrap();
        let b = Mask::from_cells(&[2, 1], 2, 2).unwrap();
        assert_eq!(a.apply(&[10.0, 11.0, 12.0, 13.0]).unwrap(), vec![10.0, 12.0, 13.0]);
        let both = a.intersect(&b).unwrap();
        assert_eq!(both.cells(), vec![2]);
        assert_eq!(both.index(), &[0, 1, 2, 3]);
        assert!(a.intersect(&Mask::make_empty(1, 4)).is_err());
    }

    #[test]
    fn test_four_point_grid_correspondence() {
        let lat = [0.0, 0.0, 1.0, 1.0];
        let lon = [0.0, 1.0, 0.0, 1.0];
        let index = NearestNeighborIndex::new(&lat, &lon);
        let (mask, matching) = correspond(&index, &[7, 8], &[1.0, 0.1], &[1.0, 0.9], (2, 2)).unwrap();
        assert_eq!(matching.obs_ids(), &[7, 8]);
        assert_eq!(matching.grid_ids(), &[3, 1]);
        assert_eq!(mask.cells(), vec![1, 3]);
    }

    #[test]
    fn test_match_apply_expands_rows_per_observation() {
        let loaded = DataFrame::new(vec![
            frame::float_column("TEMP", vec![1.0, 2.0, 3.0, 4.0]),
            frame::int_column(GRID_INDEX_COLUMN, vec![Some(5), Some(9), Some(5), Some(9)]),
        ])
        .unwrap();
        let matching = Match::new(vec![0, 1, 2], vec![9, 5, 9]).unwrap();
        let matched = matching.apply(&loaded).unwrap();
        assert!(!frame::has_column(&matched, GRID_INDEX_COLUMN));
        assert_eq!(
            frame::float_values(&matched, "TEMP").unwrap(),
            vec![2.0, 4.0, 1.0, 3.0, 2.0, 4.0]
        );
        assert_eq!(
            frame::int_values(&matched, OBS_INDEX_COLUMN).unwrap(),
            vec![Some(0), Some(0), Some(1), Some(1), Some(2), Some(2)]
        );
    }
}
