//! Tests for storer concatenation, slicing and features

use super::*;
use crate::error::BgcError;
use crate::storer::StorerView;
use crate::variables::{Pressure, Variable};
use std::sync::Arc;

#[test]
fn test_add_merges_rows_and_providers() {
    let a = sample_storer(&[("GLODAPv2", "A", 1, 10.0, 5.0, -10.0, 12.0)]);
    let b = sample_storer(&[
        ("ARGO", "B", 2, 11.0, 6.0, -20.0, 11.0),
        ("GLODAPv2", "C", 3, 12.0, 7.0, -30.0, 10.0),
    ]);
    let total = a.add(b).unwrap();
    assert_eq!(total.height(), 3);
    assert_eq!(total.providers(), ["GLODAPv2", "ARGO"]);
    assert_eq!(total.category(), "in_situ");
}

#[test]
fn test_add_rejects_other_category() {
    let a = sample_storer(&[("GLODAPv2", "A", 1, 10.0, 5.0, -10.0, 12.0)]);
    let b = Storer::new(
        sample_frame(&[("ARGO", "B", 2, 11.0, 6.0, -20.0, 11.0)]),
        "float",
        vec!["ARGO".to_string()],
        sample_ensemble(),
        Verbosity::Quiet,
    );
    assert!(matches!(a.add(b), Err(BgcError::IncompatibleStorers { .. })));
}

#[test]
fn test_concat_of_nothing_is_none() {
    assert!(Storer::concat(Vec::new()).unwrap().is_none());
    let empty = Storer::empty("in_situ", vec![], sample_ensemble(), Verbosity::Quiet).unwrap();
    let one = sample_storer(&[("GLODAPv2", "A", 1, 10.0, 5.0, -10.0, 12.0)]);
    let total = Storer::concat([empty, one]).unwrap().unwrap();
    assert_eq!(total.height(), 1);
}

#[test]
fn test_slice_on_dates_is_inclusive() {
    let storer = sample_storer(&[
        ("GLODAPv2", "A", 1, 10.0, 5.0, -10.0, 12.0),
        ("GLODAPv2", "A", 2, 10.0, 5.0, -10.0, 12.0),
        ("GLODAPv2", "A", 3, 10.0, 5.0, -10.0, 12.0),
        ("GLODAPv2", "A", 4, 10.0, 5.0, -10.0, 12.0),
    ]);
    let slice = storer.slice_on_dates(jan(2), jan(3)).unwrap();
    assert_eq!(slice.index(), [1, 2]);
    assert_eq!(slice.data().unwrap().height(), 2);
    assert!(storer.slice_on_dates(jan(10), jan(12)).unwrap().is_empty());
}

#[test]
fn test_slice_union_requires_same_storer() {
    let storer = sample_storer(&[
        ("GLODAPv2", "A", 1, 10.0, 5.0, -10.0, 12.0),
        ("GLODAPv2", "A", 2, 10.0, 5.0, -10.0, 12.0),
        ("ARGO", "B", 3, 10.0, 5.0, -10.0, 12.0),
    ]);
    let first = storer.slice_using_index(vec![2, 0]);
    let second = storer.slice_on_provider("GLODAPv2").unwrap();
    let union = first.add(&second).unwrap();
    assert_eq!(union.index(), [0, 1, 2]);
    assert_eq!(union.to_storer().unwrap().height(), 3);

    let other = storer.clone();
    let foreign = other.slice_using_index(vec![0]);
    assert!(first.add(&foreign).is_err());
}

#[test]
fn test_add_feature_checks_length() {
    let mut storer = sample_storer(&[("GLODAPv2", "A", 1, 10.0, 5.0, -10.0, 12.0)]);
    let feature = Variable::from_feature(Arc::new(Pressure::default()));
    let result = storer.add_feature(feature.clone(), vec![1.0, 2.0]);
    assert!(matches!(result, Err(BgcError::ShapeMismatch { .. })));
    storer.add_feature(feature, vec![10.1]).unwrap();
    assert!(storer.variables().has_name(names::PRESSURE));
    assert_eq!(frame::float_values(storer.frame(), names::PRESSURE).unwrap(), [10.1]);
}

#[test]
fn test_insert_features_computes_missing_columns() {
    let mut ensemble = sample_ensemble();
    ensemble
        .add_var(Variable::from_feature(Arc::new(Pressure::default())))
        .unwrap();
    let mut storer = Storer::new(
        sample_frame(&[("GLODAPv2", "A", 1, 30.0, 5.0, -7321.45, 12.0)]),
        "in_situ",
        vec!["GLODAPv2".to_string()],
        ensemble,
        Verbosity::Quiet,
    );
    storer.insert_features().unwrap();
    let pressure = frame::float_values(storer.frame(), names::PRESSURE).unwrap();
    assert!((pressure[0] - 7500.0).abs() < 0.1);

    storer.remove_variable(names::PRESSURE).unwrap();
    assert!(!frame::has_column(storer.frame(), names::PRESSURE));
    assert!(!storer.variables().has_name(names::PRESSURE));
}
