use super::{base, bottle_ensemble, write_text};
use crate::constants::names;
use crate::constraints::{ConstraintValue, Constraints};
use crate::error::BgcError;
use crate::frame;
use crate::loaders::{CsvLoader, Loader};
use crate::providers;
use crate::variables::VariableEnsemble;
use crate::variables::units::doxy_ml_by_l_to_mmol_by_m3;
use crate::variables::defaults::template;
use chrono::NaiveDate;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "EXPOCODE,YEAR,MONTH,DAY,LATITUDE,LONGITUDE,DEPTH,SALNTY,SALNTY_FLAG,NITRAT,PHSPHT";

fn bottle_loader(dir: &Path) -> CsvLoader {
    CsvLoader::new(
        base(dir, "GLODAPv2", r".*\.csv", bottle_ensemble()),
        ',',
        false,
    )
    .unwrap()
}

#[test]
fn test_rejected_salinity_flags_become_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_text(
        temp_dir.path(),
        "bottles.csv",
        &format!(
            "{HEADER}\n\
             A1,2010,1,5,60.0,-5.0,10,35.1,2,5.0,0.5\n\
             A1,2010,1,5,60.0,-5.0,20,35.2,3,6.0,0.6\n\
             A1,2010,1,6,61.0,-5.0,30,35.3,9,7.0,0.7\n"
        ),
    );
    let df = bottle_loader(temp_dir.path())
        .load(&path, &Constraints::new())
        .unwrap();
    assert_eq!(df.height(), 3);
    let salinity = frame::float_values(&df, names::SALINITY).unwrap();
    assert_eq!(salinity[0], 35.1);
    assert!(salinity[1].is_nan());
    assert!(salinity[2].is_nan());
    assert_eq!(
        frame::float_values(&df, names::DEPTH).unwrap(),
        vec![-10.0, -20.0, -30.0]
    );
}

#[test]
fn test_every_variable_is_filled() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_text(
        temp_dir.path(),
        "bottles.csv",
        &format!("{HEADER}\nA1,2010,1,5,60.0,-5.0,10,35.1,2,5.0,0.5\n"),
    );
    let df = bottle_loader(temp_dir.path())
        .load(&path, &Constraints::new())
        .unwrap();
    assert_eq!(frame::column_names(&df), bottle_ensemble().labels());
    for column in df.get_columns() {
        assert_eq!(column.null_count(), 0, "{} has nulls", column.name());
    }
    assert_eq!(
        frame::str_values(&df, names::PROVIDER).unwrap(),
        vec![Some("GLODAPv2".to_string())]
    );
    assert_eq!(frame::int_values(&df, names::HOUR).unwrap(), vec![Some(0)]);
    assert_eq!(
        frame::datetime_values(&df, names::DATE).unwrap(),
        vec![NaiveDate::from_ymd_opt(2010, 1, 5).unwrap().and_hms_opt(0, 0, 0)]
    );
    assert!(frame::float_values(&df, names::CHLOROPHYLL).unwrap()[0].is_nan());
}

#[test]
fn test_row_removal_policies() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_text(
        temp_dir.path(),
        "bottles.csv",
        &format!(
            "{HEADER}\n\
             A1,2010,1,5,60.0,-5.0,10,35.1,2,<0.05,0.5\n\
             A1,2010,1,5,60.0,-5.0,,35.2,2,6.0,0.6\n\
             A1,2010,1,5,60.0,-5.0,30,35.3,2,,\n\
             A1,2010,1,5,north,-5.0,40,35.4,2,8.0,0.8\n\
             A1,2010,1,5,60.0,-5.0,50,35.5,2,,0.9\n"
        ),
    );
    let df = bottle_loader(temp_dir.path())
        .load(&path, &Constraints::new())
        .unwrap();
    assert_eq!(
        frame::float_values(&df, names::DEPTH).unwrap(),
        vec![-10.0, -50.0]
    );
    let nitrate = frame::float_values(&df, names::NITRATE).unwrap();
    assert_eq!(nitrate[0], 0.05);
    assert!(nitrate[1].is_nan());
}

#[test]
fn test_units_row_and_separator() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_text(
        temp_dir.path(),
        "bottles.csv",
        &format!(
            "{}\n[],[],[],[],[deg_N],[deg_E],[m],[psu],[],[umol/kg],[umol/kg]\n\
             A1;2010;1;5;60.0;-5.0;10;35.1;2;5.0;0.5\n",
            HEADER.replace(',', ";")
        )
        .replace("],[", "];["),
    );
    let loader = CsvLoader::new(
        base(temp_dir.path(), "GLODAPv2", r".*\.csv", bottle_ensemble()),
        ';',
        true,
    )
    .unwrap();
    let df = loader.load(&path, &Constraints::new()).unwrap();
    assert_eq!(df.height(), 1);
    assert_eq!(frame::float_values(&df, names::LATITUDE).unwrap(), vec![60.0]);

    assert!(
        CsvLoader::new(bottle_loader(temp_dir.path()).base().clone(), 'é', false)
            .unwrap_err()
            .is_configuration_error()
    );
}

#[test]
fn test_constraints_are_applied() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_text(
        temp_dir.path(),
        "bottles.csv",
        &format!(
            "{HEADER}\n\
             A1,2010,1,5,50.0,-5.0,10,35.1,2,5.0,0.5\n\
             B2,2010,1,5,70.0,-5.0,20,35.2,2,6.0,0.6\n"
        ),
    );
    let mut constraints = Constraints::new();
    constraints.add_boundary_constraint(
        names::LATITUDE,
        Some(ConstraintValue::from(60.0)),
        None,
    );
    let df = bottle_loader(temp_dir.path())
        .load(&path, &constraints)
        .unwrap();
    assert_eq!(
        frame::str_values(&df, names::EXPOCODE).unwrap(),
        vec![Some("B2".to_string())]
    );
}

#[test]
fn test_date_column_is_parsed() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_text(
        temp_dir.path(),
        "casts.csv",
        "DATE,LATITUDE,LONGITUDE,DEPTH\n2010-03-04T05:06:00,60.0,-5.0,10\n",
    );
    let variables = VariableEnsemble::new([
        template(names::PROVIDER).unwrap().not_in_file(),
        template(names::DATE).unwrap().in_file_as(["DATE"]),
        template(names::YEAR).unwrap().not_in_file(),
        template(names::MONTH).unwrap().not_in_file(),
        template(names::DAY).unwrap().not_in_file(),
        template(names::HOUR).unwrap().not_in_file(),
        template(names::LATITUDE).unwrap().in_file_as(["LATITUDE"]),
        template(names::LONGITUDE).unwrap().in_file_as(["LONGITUDE"]),
        template(names::DEPTH).unwrap().in_file_as(["DEPTH"]),
    ])
    .unwrap();
    let loader = CsvLoader::new(base(temp_dir.path(), "CTD", r".*\.csv", variables), ',', false)
        .unwrap();
    let df = loader.load(&path, &Constraints::new()).unwrap();
    assert_eq!(frame::int_values(&df, names::YEAR).unwrap(), vec![Some(2010)]);
    assert_eq!(frame::int_values(&df, names::MONTH).unwrap(), vec![Some(3)]);
    assert_eq!(frame::int_values(&df, names::DAY).unwrap(), vec![Some(4)]);
    assert_eq!(frame::int_values(&df, names::HOUR).unwrap(), vec![Some(5)]);
}

#[test]
fn test_empty_file_and_no_files() {
    let temp_dir = TempDir::new().unwrap();
    let loader = bottle_loader(temp_dir.path());

    let storer = loader.load_all(&Constraints::new()).unwrap();
    assert!(storer.is_empty());

    write_text(temp_dir.path(), "empty.csv", "");
    let storer = loader.load_all(&Constraints::new()).unwrap();
    assert!(storer.is_empty());
    assert_eq!(frame::column_names(storer.frame()), bottle_ensemble().labels());
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = bottle_loader(temp_dir.path()).load(
        &temp_dir.path().join("absent.csv"),
        &Constraints::new(),
    );
    assert!(matches!(result, Err(BgcError::FileNotFound { .. })));
}

#[test]
fn test_load_all_sums_files() {
    let temp_dir = TempDir::new().unwrap();
    for (name, expocode) in [("a.csv", "A1"), ("b.csv", "B2"), ("notes.txt", "C3")] {
        write_text(
            temp_dir.path(),
            name,
            &format!("{HEADER}\n{expocode},2010,1,5,60.0,-5.0,10,35.1,2,5.0,0.5\n"),
        );
    }
    let storer = bottle_loader(temp_dir.path())
        .load_all(&Constraints::new())
        .unwrap();
    assert_eq!(storer.height(), 2);
    assert_eq!(
        frame::str_values(storer.frame(), names::EXPOCODE).unwrap(),
        vec![Some("A1".to_string()), Some("B2".to_string())]
    );
}

/// Loader of a known provider, with its default pattern
fn provider_loader(dir: &Path, name: &str, separator: char) -> CsvLoader {
    let definition = providers::definition(name).unwrap();
    CsvLoader::new(
        base(dir, name, definition.files_pattern, definition.variables().unwrap()),
        separator,
        true,
    )
    .unwrap()
}

#[test]
fn test_imr_station_file() {
    let temp_dir = TempDir::new().unwrap();
    write_text(
        temp_dir.path(),
        "imr_2010.csv",
        "Year\tMonth\tDay\tLong\tLati\tDepth\tTemp\tSaln.\tOxygen\tPhosphate\tNitrate\tSilicate\tChl.\n\
         \t\t\tdeg\tdeg\tm\tdegC\tpsu\tml/l\tumol/l\tumol/l\tumol/l\tmg/m3\n\
         2010\t3\t14\t5.0\t70.0\t25\t4.0\t34.9\t6.5\t0.8\t10.0\t4.0\t1.2\n",
    );
    // other years are never opened
    write_text(temp_dir.path(), "imr_2011.csv", "not a station file\n");
    let mut constraints = Constraints::new();
    constraints.add_boundary_constraint(
        names::DATE,
        Some(ConstraintValue::from(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap())),
        Some(ConstraintValue::from(NaiveDate::from_ymd_opt(2010, 12, 31).unwrap())),
    );

    let storer = provider_loader(temp_dir.path(), "IMR", '\t')
        .load_all(&constraints)
        .unwrap();
    let df = storer.frame();
    assert_eq!(df.height(), 1);
    assert_eq!(frame::float_values(df, names::DEPTH).unwrap(), vec![-25.0]);
    let oxygen = frame::float_values(df, names::OXYGEN).unwrap();
    assert!((oxygen[0] - doxy_ml_by_l_to_mmol_by_m3(6.5)).abs() < 1e-9);
    assert_eq!(
        frame::datetime_values(df, names::DATE).unwrap(),
        vec![NaiveDate::from_ymd_opt(2010, 3, 14).unwrap().and_hms_opt(0, 0, 0)]
    );
    assert_eq!(
        frame::str_values(df, names::PROVIDER).unwrap(),
        vec![Some("IMR".to_string())]
    );
}

#[test]
fn test_ices_bottle_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_text(
        temp_dir.path(),
        "ices_2010.csv",
        "Cruise,DATE,LATITUDE,LONGITUDE,DEPTH,CTDTMP,CTDSAL,DOXY,PHOS,NTRA,SLCA,CPHL\n\
         ,,deg,deg,m,degC,psu,umol/l,umol/l,umol/l,umol/l,ug/l\n\
         58G2,2010-03-14T06:00:00,70.0,5.0,25,4.0,34.9,300,0.8,10.0,4.0,1.2\n\
         58G2,2010-03-14T06:00:00,70.0,5.0,50,3.5,35.0,290,,,,\n",
    );
    let df = provider_loader(temp_dir.path(), "ICES", ',')
        .load(&path, &Constraints::new())
        .unwrap();
    // the second row holds no nutrient nor chlorophyll
    assert_eq!(df.height(), 1);
    assert_eq!(frame::float_values(&df, names::DEPTH).unwrap(), vec![-25.0]);
    assert_eq!(
        frame::str_values(&df, names::EXPOCODE).unwrap(),
        vec![Some("58G2".to_string())]
    );
    assert_eq!(
        frame::datetime_values(&df, names::DATE).unwrap(),
        vec![NaiveDate::from_ymd_opt(2010, 3, 14).unwrap().and_hms_opt(6, 0, 0)]
    );
}

#[test]
fn test_glodap_2019_extract() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_text(
        temp_dir.path(),
        "glodapv2_2010.csv",
        "cruise,YEAR,MONTH,DAY,hour,LATITUDE,LONGITUDE,DEPTH,THETA,SALNTY,salinityf,\
         OXYGEN,oxygenf,NITRAT,nitratef,PHSPHT,phosphatef,SILCAT,silicatef\n\
         ,,,,,,,m,degC,,,umol/kg,,umol/kg,,umol/kg,,umol/kg,\n\
         316N,2010,3,14,6,70.0,5.0,25,4.0,34.9,2,320,2,10.0,2,0.8,3,4.0,2\n",
    );
    let df = provider_loader(temp_dir.path(), "GLODAP_2019", ',')
        .load(&path, &Constraints::new())
        .unwrap();
    assert_eq!(df.height(), 1);
    assert_eq!(frame::float_values(&df, names::DEPTH).unwrap(), vec![-25.0]);
    assert_eq!(frame::float_values(&df, names::OXYGEN).unwrap(), vec![10.0]);
    // rejected by its flag
    assert!(frame::float_values(&df, names::PHOSPHATE).unwrap()[0].is_nan());
    assert_eq!(frame::float_values(&df, names::NITRATE).unwrap(), vec![10.0]);
    assert_eq!(frame::int_values(&df, names::HOUR).unwrap(), vec![Some(6)]);
}
