//! HYCOM `.a`/`.b` file pairs.
//!
//! The `.b` file is a text catalog: the grid dimensions appear on lines
//! such as `  800    'idm   ' = longitudinal array size`, followed by one
//! line per field. Archives describe fields as
//! `name = step day k dens min max`, grid files as `name: min,max = a b`.
//! The `.a` file holds one record per catalog line, in catalog order: the
//! `idm * jdm` big-endian `f32` values of the field, padded to a multiple
//! of 4096 values. Values of magnitude 1e30 or more are masked.

use crate::constants::{ABFILE_RECORD_BLOCK, FILL_VALUE_THRESHOLD};
use crate::error::{BgcError, Result};
use crate::loaders::netcdf::MaskedArray;
use regex::Regex;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static DIMENSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s+'(\w+)\s*'\s*=").expect("dimension regex is valid")
});

static ARCHIVE_FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s*=\s*(\S+)\s+(\S+)\s+(-?\d+)\s+(\S+)\s+(\S+)\s+(\S+)\s*$")
        .expect("archive field regex is valid")
});

static GRID_FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\w+)\s*:\s*min,max\s*=\s*(\S+)\s+(\S+)").expect("grid field regex is valid")
});

/// Catalog layout of a `.b` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ABKind {
    Archive,
    Grid,
}

/// One record of the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRecord {
    pub name: String,
    /// Model layer, 0 for surface and grid fields
    pub level: i64,
    /// Record position in the `.a` file
    pub index: usize,
}

/// Path of one half of a pair: the basename with `.a` or `.b` appended
pub fn companion(basename: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(basename.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Opened `.a`/`.b` pair
#[derive(Debug, Clone)]
pub struct ABFile {
    basename: PathBuf,
    idm: usize,
    jdm: usize,
    fields: Vec<FieldRecord>,
}

impl ABFile {
    pub fn open_archive(basename: &Path) -> Result<Self> {
        Self::open(basename, ABKind::Archive)
    }

    pub fn open_grid(basename: &Path) -> Result<Self> {
        Self::open(basename, ABKind::Grid)
    }

    /// Parse the catalog; both halves of the pair must exist
    pub fn open(basename: &Path, kind: ABKind) -> Result<Self> {
        let a_path = companion(basename, "a");
        let b_path = companion(basename, "b");
        for path in [&a_path, &b_path] {
            if !path.exists() {
                return Err(BgcError::file_not_found(path));
            }
        }
        let catalog = fs::read_to_string(&b_path)?;

        let mut idm = None;
        let mut jdm = None;
        let mut fields = Vec::new();
        for line in catalog.lines() {
            if let Some(caps) = DIMENSION_LINE.captures(line) {
                let value = caps[1].parse::<usize>().ok();
                match &caps[2] {
                    "idm" => idm = value,
                    "jdm" => jdm = value,
                    _ => {}
                }
                continue;
            }
            let record = match kind {
                ABKind::Archive => ARCHIVE_FIELD_LINE.captures(line).and_then(|caps| {
                    let level = caps[4].parse::<i64>().ok()?;
                    Some((caps[1].to_string(), level))
                }),
                ABKind::Grid => GRID_FIELD_LINE
                    .captures(line)
                    .map(|caps| (caps[1].to_string(), 0)),
            };
            if let Some((name, level)) = record {
                fields.push(FieldRecord {
                    name,
                    level,
                    index: fields.len(),
                });
            }
        }
        let (Some(idm), Some(jdm)) = (idm, jdm) else {
            return Err(BgcError::invalid_format(
                &b_path,
                "missing 'idm' or 'jdm' dimension line",
            ));
        };
        Ok(Self {
            basename: basename.to_path_buf(),
            idm,
            jdm,
            fields,
        })
    }

    pub fn basename(&self) -> &Path {
        &self.basename
    }

    /// Grid shape as `(jdm, idm)`
    pub fn shape(&self) -> (usize, usize) {
        (self.jdm, self.idm)
    }

    pub fn cell_count(&self) -> usize {
        self.idm * self.jdm
    }

    pub fn fields(&self) -> &[FieldRecord] {
        &self.fields
    }

    /// Distinct field names, in catalog order
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for field in &self.fields {
            if !names.contains(&field.name.as_str()) {
                names.push(&field.name);
            }
        }
        names
    }

    /// Sorted distinct model layers, surface fields excluded
    pub fn levels(&self) -> Vec<i64> {
        let mut levels: Vec<i64> = self
            .fields
            .iter()
            .map(|f| f.level)
            .filter(|&k| k > 0)
            .collect();
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    /// Field names available at each layer
    pub fn fields_by_level(&self) -> BTreeMap<i64, Vec<String>> {
        let mut by_level: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        for field in &self.fields {
            by_level
                .entry(field.level)
                .or_default()
                .push(field.name.clone());
        }
        by_level
    }

    fn record(&self, name: &str, level: i64) -> Result<&FieldRecord> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.level == level)
            .ok_or_else(|| {
                BgcError::invalid_format(
                    companion(&self.basename, "b"),
                    format!("no field '{}' at level {}", name, level),
                )
            })
    }

    /// Bytes taken by one record, padding included
    fn record_bytes(&self) -> u64 {
        let n = self.cell_count();
        let blocks = n.div_ceil(ABFILE_RECORD_BLOCK);
        (blocks * ABFILE_RECORD_BLOCK * 4) as u64
    }

    /// Read a field as a `(jdm, idm)` masked array
    pub fn read_field(&self, name: &str, level: i64) -> Result<MaskedArray> {
        let record = self.record(name, level)?;
        let a_path = companion(&self.basename, "a");
        let mut file = File::open(&a_path)?;
        file.seek(SeekFrom::Start(record.index as u64 * self.record_bytes()))?;
        let mut bytes = vec![0u8; self.cell_count() * 4];
        file.read_exact(&mut bytes).map_err(|e| {
            BgcError::invalid_format(
                &a_path,
                format!("record {} of '{}' is truncated: {}", record.index, name, e),
            )
        })?;
        let values: Vec<f64> = bytes
            .chunks_exact(4)
            .map(|b| f64::from(f32::from_be_bytes([b[0], b[1], b[2], b[3]])))
            .collect();
        MaskedArray::new(vec![self.jdm, self.idm], values)
    }
}

/// Field written by [`write_abfile`]
#[derive(Debug, Clone)]
pub struct FieldData<'a> {
    pub name: &'a str,
    pub level: i64,
    /// `jdm * idm` values, row-major; NaN is written as a fill value
    pub values: &'a [f64],
}

/// Write a `.a`/`.b` pair in the layout [`ABFile::open`] reads
pub fn write_abfile(
    basename: &Path,
    kind: ABKind,
    idm: usize,
    jdm: usize,
    fields: &[FieldData],
) -> Result<()> {
    let n = idm * jdm;
    let padded = n.div_ceil(ABFILE_RECORD_BLOCK) * ABFILE_RECORD_BLOCK;
    let fill = (2.0 * FILL_VALUE_THRESHOLD) as f32;

    let mut a_file = BufWriter::new(File::create(companion(basename, "a"))?);
    let mut b_file = BufWriter::new(File::create(companion(basename, "b"))?);
    writeln!(b_file, "{:>8}    'idm   ' = longitudinal array size", idm)?;
    writeln!(b_file, "{:>8}    'jdm   ' = latitudinal  array size", jdm)?;
    if kind == ABKind::Archive {
        writeln!(b_file, "field       time step  model day  k  dens        min              max")?;
    }
    for field in fields {
        if field.values.len() != n {
            return Err(BgcError::ShapeMismatch {
                expected: vec![jdm, idm],
                found: vec![field.values.len()],
            });
        }
        let finite = field.values.iter().filter(|v| v.is_finite());
        let min = finite.clone().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = finite.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        match kind {
            ABKind::Archive => writeln!(
                b_file,
                "{:<8} = {:>10} {:>10.3} {:>3} {:>6.3} {:>16.7E} {:>16.7E}",
                field.name, 0, 0.0, field.level, 0.0, min, max
            )?,
            ABKind::Grid => writeln!(
                b_file,
                "{}:  min,max = {:>16.7E} {:>16.7E}",
                field.name, min, max
            )?,
        }
        for i in 0..padded {
            let value = match field.values.get(i) {
                Some(v) if v.is_finite() => *v as f32,
                Some(_) => fill,
                None => 0.0,
            };
            a_file.write_all(&value.to_be_bytes())?;
        }
    }
    a_file.flush()?;
    b_file.flush()?;
    Ok(())
}
