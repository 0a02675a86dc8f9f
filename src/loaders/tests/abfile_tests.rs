use super::{base, write_text};
use crate::constants::{GRID_INDEX_COLUMN, PASCAL_BY_SEAWATER_METER, names};
use crate::constraints::{ConstraintValue, Constraints};
use crate::error::BgcError;
use crate::frame;
use crate::loaders::abfile::{ABKind, FieldData, write_abfile};
use crate::loaders::{ABFileLoader, Loader, SelectiveABFileLoader};
use crate::matching::Mask;
use crate::providers;
use chrono::NaiveDate;
use std::path::Path;
use tempfile::TempDir;

const P: f64 = PASCAL_BY_SEAWATER_METER;
const ARCHIVE: &str = "archm.2010_032_12";

/// 2x2 grid and one archive with two layers; salinity only in the first
fn write_fixture(dir: &Path) {
    write_abfile(
        &dir.join("regional.grid"),
        ABKind::Grid,
        2,
        2,
        &[
            FieldData {
                name: "plon",
                level: 0,
                values: &[0.0, 1.0, 0.0, 1.0],
            },
            FieldData {
                name: "plat",
                level: 0,
                values: &[60.0, 60.0, 61.0, 61.0],
            },
        ],
    )
    .unwrap();
    write_abfile(
        &dir.join(ARCHIVE),
        ABKind::Archive,
        2,
        2,
        &[
            FieldData {
                name: "montg1",
                level: 0,
                values: &[0.0; 4],
            },
            FieldData {
                name: "thknss",
                level: 1,
                values: &[10.0 * P, 10.0 * P, 20.0 * P, 20.0 * P],
            },
            FieldData {
                name: "temp",
                level: 1,
                values: &[1.0, 2.0, 3.0, 4.0],
            },
            FieldData {
                name: "salin",
                level: 1,
                values: &[35.0, 35.1, 35.2, 35.3],
            },
            FieldData {
                name: "thknss",
                level: 2,
                values: &[10.0 * P, 10.0 * P, 20.0 * P, f64::NAN],
            },
            FieldData {
                name: "temp",
                level: 2,
                values: &[5.0, 6.0, 7.0, 8.0],
            },
        ],
    )
    .unwrap();
}

fn hycom_loader(dir: &Path) -> ABFileLoader {
    let base = base(
        dir,
        "HYCOM",
        r"archm\.{years}_[0-9]*_[0-9]*\.a",
        providers::hycom().unwrap(),
    );
    ABFileLoader::new(base, "regional.grid")
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        if e.is_nan() {
            assert!(a.is_nan(), "expected NaN, found {}", a);
        } else {
            assert!((a - e).abs() < 1e-5, "expected {}, found {}", e, a);
        }
    }
}

#[test]
fn test_archive_levels_are_stacked() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path());
    let loader = hycom_loader(temp_dir.path());
    let df = loader
        .load(&temp_dir.path().join(ARCHIVE), &Constraints::new())
        .unwrap();

    assert_eq!(df.height(), 8);
    assert_close(
        &frame::float_values(&df, names::DEPTH).unwrap(),
        &[-5.0, -5.0, -10.0, -10.0, -15.0, -15.0, -30.0, f64::NAN],
    );
    assert_close(
        &frame::float_values(&df, names::TEMPERATURE).unwrap(),
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
    );
    assert_close(
        &frame::float_values(&df, names::SALINITY).unwrap(),
        &[35.0, 35.1, 35.2, 35.3, f64::NAN, f64::NAN, f64::NAN, f64::NAN],
    );
    assert_eq!(
        frame::float_values(&df, names::LATITUDE).unwrap(),
        vec![60.0, 60.0, 61.0, 61.0, 60.0, 60.0, 61.0, 61.0]
    );
    assert_eq!(
        frame::str_values(&df, names::PROVIDER).unwrap(),
        vec![Some("HYCOM".to_string()); 8]
    );
    let expected = NaiveDate::from_ymd_opt(2010, 2, 1).unwrap().and_hms_opt(12, 0, 0);
    assert_eq!(
        frame::datetime_values(&df, names::DATE).unwrap(),
        vec![expected; 8]
    );
    assert_eq!(frame::int_values(&df, names::DAY).unwrap(), vec![Some(1); 8]);
}

#[test]
fn test_select_files_by_year() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path());
    let loader = hycom_loader(temp_dir.path());

    let selected = loader.select_files(&Constraints::new()).unwrap();
    assert_eq!(selected, vec![temp_dir.path().join(ARCHIVE)]);

    let mut constraints = Constraints::new();
    constraints.add_boundary_constraint(
        names::DATE,
        Some(ConstraintValue::from(NaiveDate::from_ymd_opt(2011, 1, 1).unwrap())),
        Some(ConstraintValue::from(NaiveDate::from_ymd_opt(2011, 12, 31).unwrap())),
    );
    assert!(loader.select_files(&constraints).unwrap().is_empty());
    assert!(loader.load_all(&constraints).unwrap().is_empty());
}

#[test]
fn test_missing_companion_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path());
    write_text(temp_dir.path(), "archm.2010_033_12.a", "");
    let loader = hycom_loader(temp_dir.path());
    assert!(matches!(
        loader.select_files(&Constraints::new()),
        Err(BgcError::FileNotFound { .. })
    ));
}

#[test]
fn test_depth_constraint_on_loaded_rows() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path());
    let mut constraints = Constraints::new();
    constraints.add_boundary_constraint(names::DEPTH, Some(ConstraintValue::from(-12.0)), None);
    let storer = hycom_loader(temp_dir.path()).load_all(&constraints).unwrap();
    assert_eq!(storer.height(), 4);
    assert!(frame::has_column(storer.frame(), names::POTENTIAL_TEMPERATURE));
}

#[test]
fn test_selective_load_keeps_masked_cells() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path());
    let loader = SelectiveABFileLoader::new(hycom_loader(temp_dir.path()));
    let mask = Mask::from_cells(&[1, 3], 2, 2).unwrap();
    let df = loader
        .load(&temp_dir.path().join(ARCHIVE), &Constraints::new(), &mask)
        .unwrap();

    assert_eq!(
        frame::int_values(&df, GRID_INDEX_COLUMN).unwrap(),
        vec![Some(1), Some(3), Some(1), Some(3)]
    );
    assert_close(
        &frame::float_values(&df, names::DEPTH).unwrap(),
        &[-5.0, -10.0, -15.0, f64::NAN],
    );
    assert_eq!(
        frame::float_values(&df, names::TEMPERATURE).unwrap(),
        vec![2.0, 4.0, 6.0, 8.0]
    );
    assert_eq!(
        frame::float_values(&df, names::LONGITUDE).unwrap(),
        vec![1.0; 4]
    );
}

#[test]
fn test_mask_grid_shape_mismatch() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path());
    let loader = SelectiveABFileLoader::new(hycom_loader(temp_dir.path()));
    let result = loader.load(
        &temp_dir.path().join(ARCHIVE),
        &Constraints::new(),
        &Mask::make_empty(3, 3),
    );
    assert!(matches!(result, Err(BgcError::ShapeMismatch { .. })));
}

#[test]
fn test_grid_is_read_once() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path());
    let loader = hycom_loader(temp_dir.path());
    let first = loader.grid().unwrap() as *const _;
    std::fs::remove_file(temp_dir.path().join("regional.grid.a")).unwrap();
    let second = loader.grid().unwrap() as *const _;
    assert_eq!(first, second);
    assert_eq!(loader.grid().unwrap().shape, (2, 2));
}
