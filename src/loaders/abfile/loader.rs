//! Loaders of HYCOM archives.

use super::format::{ABFile, companion};
use crate::constants::{GRID_INDEX_COLUMN, PASCAL_BY_SEAWATER_METER, names};
use crate::constraints::Constraints;
use crate::error::{BgcError, Result};
use crate::frame;
use crate::loaders::{Loader, LoaderBase, set_calendar_columns};
use crate::matching::Mask;
use crate::variables::{Alias, Variable};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataFrame};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Longitude and latitude of every grid cell, row-major
#[derive(Debug, Clone)]
pub struct GridCoordinates {
    pub shape: (usize, usize),
    pub longitude: Vec<f64>,
    pub latitude: Vec<f64>,
}

/// Loader of full-grid archives
#[derive(Debug)]
pub struct ABFileLoader {
    base: LoaderBase,
    grid_basename: PathBuf,
    grid: OnceLock<GridCoordinates>,
}

/// Date encoded in an archive basename: `<prefix>.<year>_<day of year>_<hour>`
pub fn date_from_basename(basename: &Path) -> Result<NaiveDateTime> {
    let name = basename
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = name.rsplit('.').next().unwrap_or_default();
    let invalid = || BgcError::parse(format!("no year_day_hour date suffix in '{}'", name));
    let parts: Vec<&str> = suffix.split('_').collect();
    let [year, day, hour] = parts.as_slice() else {
        return Err(invalid());
    };
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    NaiveDate::from_yo_opt(year, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .ok_or_else(invalid)
}

/// `-|cumsum(thk) - thk/2| / 9806` per cell, layers stacked level after level
pub fn depth_from_thickness(thickness: &[f64], cells: usize) -> Vec<f64> {
    let mut cumulated = vec![0.0; cells];
    thickness
        .iter()
        .enumerate()
        .map(|(row, &thk)| {
            if thk.is_nan() {
                return f64::NAN;
            }
            let cell = row % cells;
            cumulated[cell] += thk;
            -((cumulated[cell] - thk / 2.0) / PASCAL_BY_SEAWATER_METER).abs()
        })
        .collect()
}

impl ABFileLoader {
    /// `grid_basename` is resolved against the input directory when relative
    pub fn new(base: LoaderBase, grid_basename: impl AsRef<Path>) -> Self {
        let grid_basename = grid_basename.as_ref();
        let grid_basename = if grid_basename.is_absolute() {
            grid_basename.to_path_buf()
        } else {
            base.dirin.join(grid_basename)
        };
        Self {
            base,
            grid_basename,
            grid: OnceLock::new(),
        }
    }

    pub fn grid_basename(&self) -> &Path {
        &self.grid_basename
    }

    /// Grid coordinates, read on first use
    pub fn grid(&self) -> Result<&GridCoordinates> {
        if let Some(grid) = self.grid.get() {
            return Ok(grid);
        }
        let file = ABFile::open_grid(&self.grid_basename)?;
        let longitude = self.grid_field(&file, names::LONGITUDE)?;
        let latitude = self.grid_field(&file, names::LATITUDE)?;
        debug!(
            "Read grid {} ({} cells)",
            self.grid_basename.display(),
            longitude.len()
        );
        Ok(self.grid.get_or_init(|| GridCoordinates {
            shape: file.shape(),
            longitude,
            latitude,
        }))
    }

    fn grid_field(&self, file: &ABFile, name: &str) -> Result<Vec<f64>> {
        let var = self.base.loading_variables().get(name)?;
        let fields = file.field_names();
        let alias = var
            .aliases()
            .iter()
            .find(|a| fields.contains(&a.column.as_str()))
            .ok_or_else(|| {
                BgcError::configuration(format!(
                    "grid {} has no field for {}",
                    self.grid_basename.display(),
                    name
                ))
            })?;
        Ok(file.read_field(&alias.column, 0)?.filled(f64::NAN))
    }

    /// Values of one layer, restricted to `cells`
    fn read_level(
        &self,
        file: &ABFile,
        alias: &Alias,
        available: &[String],
        level: i64,
        cells: Option<&[usize]>,
    ) -> Result<Vec<f64>> {
        let mut values = file.read_field(&alias.column, level)?.filled(f64::NAN);
        if let Some(flag) = alias.flag.as_deref().filter(|f| available.iter().any(|a| a == f)) {
            let flags = file.read_field(flag, level)?.filled(-1.0);
            for (value, flag_value) in values.iter_mut().zip(flags) {
                if !alias.accepts(flag_value) {
                    *value = f64::NAN;
                }
            }
        }
        Ok(match cells {
            Some(cells) => cells.iter().map(|&c| values[c]).collect(),
            None => values,
        })
    }

    /// Stacked layers of every in-file variable, with dates and calendar columns
    fn read_archive(&self, basename: &Path, cells: Option<&[usize]>) -> Result<DataFrame> {
        let file = ABFile::open_archive(basename)?;
        let grid = self.grid()?;
        if file.shape() != grid.shape {
            return Err(BgcError::ShapeMismatch {
                expected: vec![grid.shape.0, grid.shape.1],
                found: vec![file.shape().0, file.shape().1],
            });
        }
        let date = date_from_basename(basename)?;
        let selected: Vec<usize> = match cells {
            Some(cells) => cells.to_vec(),
            None => (0..file.cell_count()).collect(),
        };
        let levels = file.levels();
        let by_level: BTreeMap<i64, Vec<String>> = file.fields_by_level();
        let rows = levels.len() * selected.len();
        let loading = self.base.loading_variables();

        let mut columns: Vec<Column> = Vec::new();
        for var in loading.in_dset() {
            let values = match var.name() {
                names::LONGITUDE => repeat_cells(&grid.longitude, &selected, levels.len()),
                names::LATITUDE => repeat_cells(&grid.latitude, &selected, levels.len()),
                _ => self.stack_levels(&file, var, &levels, &by_level, cells, selected.len())?,
            };
            let values = if var.name() == names::DEPTH {
                depth_from_thickness(&values, selected.len())
            } else {
                values
            };
            columns.push(frame::float_column(var.label(), values));
        }
        let mut df = if columns.is_empty() {
            DataFrame::empty_with_height(rows)
        } else {
            DataFrame::new(columns)?
        };
        set_calendar_columns(&mut df, loading, &vec![Some(date); rows])?;
        Ok(df)
    }

    fn stack_levels(
        &self,
        file: &ABFile,
        var: &Variable,
        levels: &[i64],
        by_level: &BTreeMap<i64, Vec<String>>,
        cells: Option<&[usize]>,
        width: usize,
    ) -> Result<Vec<f64>> {
        let mut stacked = Vec::with_capacity(levels.len() * width);
        let mut found_any = false;
        for level in levels {
            let available = by_level.get(level).map(Vec::as_slice).unwrap_or_default();
            let alias = var
                .aliases()
                .iter()
                .find(|a| available.iter().any(|f| *f == a.column));
            match alias {
                Some(alias) => {
                    found_any = true;
                    stacked.extend(self.read_level(file, alias, available, *level, cells)?);
                }
                None => stacked.extend(std::iter::repeat_n(f64::NAN, width)),
            }
        }
        if !found_any {
            debug!("{} absent from {}", var.name(), file.basename().display());
        }
        Ok(stacked)
    }

    /// Load the cells of `mask`, with their grid index in an extra column
    pub fn load_with_mask(
        &self,
        basename: &Path,
        constraints: &Constraints,
        mask: &Mask,
    ) -> Result<DataFrame> {
        let grid = self.grid()?;
        if mask.shape() != grid.shape {
            return Err(BgcError::ShapeMismatch {
                expected: vec![grid.shape.0, grid.shape.1],
                found: vec![mask.shape().0, mask.shape().1],
            });
        }
        let cells = mask.cells();
        let mut df = self.read_archive(basename, Some(&cells))?;
        let levels = df.height().checked_div(cells.len()).unwrap_or(0);
        let index: Vec<Option<i64>> = (0..levels)
            .flat_map(|_| cells.iter().map(|&c| Some(mask.index()[c])))
            .collect();
        frame::set_column(&mut df, frame::int_column(GRID_INDEX_COLUMN, index))?;
        self.base
            .finalize_keeping(df, constraints, &[GRID_INDEX_COLUMN])
    }
}

fn repeat_cells(values: &[f64], cells: &[usize], levels: usize) -> Vec<f64> {
    (0..levels)
        .flat_map(|_| cells.iter().map(|&c| values[c]))
        .collect()
}

impl Loader for ABFileLoader {
    fn base(&self) -> &LoaderBase {
        &self.base
    }

    /// Archive basenames (without `.a`/`.b`) whose pair is complete
    fn select_files(&self, constraints: &Constraints) -> Result<Vec<PathBuf>> {
        let mut basenames: Vec<PathBuf> = Vec::new();
        for path in self.base.select_files(constraints)? {
            let basename = path.with_extension("");
            for half in ["a", "b"] {
                let pair = companion(&basename, half);
                if !pair.exists() {
                    return Err(BgcError::file_not_found(pair));
                }
            }
            if !basenames.contains(&basename) {
                basenames.push(basename);
            }
        }
        Ok(basenames)
    }

    fn load(&self, basename: &Path, constraints: &Constraints) -> Result<DataFrame> {
        let df = self.read_archive(basename, None)?;
        self.base.finalize(df, constraints)
    }
}

/// Archive loader restricted to the cells of a mask
#[derive(Debug)]
pub struct SelectiveABFileLoader {
    inner: ABFileLoader,
}

impl SelectiveABFileLoader {
    pub fn new(inner: ABFileLoader) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &ABFileLoader {
        &self.inner
    }

    pub fn grid(&self) -> Result<&GridCoordinates> {
        self.inner.grid()
    }

    pub fn select_files(&self, constraints: &Constraints) -> Result<Vec<PathBuf>> {
        self.inner.select_files(constraints)
    }

    pub fn base(&self) -> &LoaderBase {
        &self.inner.base
    }

    /// Rows of the masked cells, every level, tagged with the mask index
    pub fn load(&self, basename: &Path, constraints: &Constraints, mask: &Mask) -> Result<DataFrame> {
        self.inner.load_with_mask(basename, constraints, mask)
    }
}
