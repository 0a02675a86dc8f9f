//! Tests for variable ensembles and feature ordering

use super::*;
use crate::error::BgcError;
use crate::variables::{Feature, PotentialTemperature, Pressure, SigmaT, VariableEnsemble};
use std::sync::Arc;

#[test]
fn test_duplicate_names_rejected() {
    let result = VariableEnsemble::new([float_in_file("TEMP"), float_in_file("TEMP")]);
    assert!(matches!(result, Err(BgcError::DuplicateVariable { name }) if name == "TEMP"));

    let mut ensemble = VariableEnsemble::new([float_in_file("TEMP")]).unwrap();
    assert!(ensemble.add_var(float_in_file("TEMP")).is_err());
    assert!(ensemble.add_var(float_in_file("PSAL")).is_ok());
    assert_eq!(ensemble.len(), 2);
}

#[test]
fn test_get_unknown_lists_valid_names() {
    let ensemble = VariableEnsemble::new([float_in_file("TEMP"), float_in_file("PSAL")]).unwrap();
    match ensemble.get("DOX2") {
        Err(BgcError::UnknownVariable { name, valid }) => {
            assert_eq!(name, "DOX2");
            assert_eq!(valid, "TEMP, PSAL");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_removal_policies_and_dset_partition() {
    let template = TemplateVar::new("NTRA", "[]", VarType::Float);
    let ensemble = VariableEnsemble::new([
        float_in_file("DEPH").remove_when_nan(),
        template.in_file_as(["NITRAT"]).remove_when_all_nan(),
        TemplateVar::new("PHOS", "[]", VarType::Float)
            .not_in_file()
            .remove_when_all_nan(),
    ])
    .unwrap();

    assert_eq!(ensemble.to_remove_if_any_nan(), vec!["DEPH"]);
    assert_eq!(ensemble.to_remove_if_all_nan(), vec!["NTRA", "PHOS"]);
    assert_eq!(ensemble.in_dset().len(), 2);
    assert_eq!(ensemble.not_in_dset().len(), 1);
}

#[test]
fn test_saving_order_and_formats() {
    let mut ensemble = VariableEnsemble::new([
        float_in_file("TEMP"),
        float_in_file("PSAL"),
        float_in_file("DEPH"),
    ])
    .unwrap();

    assert_eq!(ensemble.save_labels(), vec!["TEMP", "PSAL", "DEPH"]);
    ensemble
        .set_saving_order(&["DEPH".to_string(), "TEMP".to_string()])
        .unwrap();
    assert_eq!(ensemble.save_labels(), vec!["DEPH", "TEMP"]);
    assert_eq!(ensemble.name_save_format(), "%-15s %-15s");
    assert!(ensemble.set_saving_order(&["NOPE".to_string()]).is_err());
}

#[test]
fn test_features_ordered_by_dependency() {
    // PTEMP is declared before PRES but needs it
    let ensemble = VariableEnsemble::new([
        float_in_file("DEPH"),
        float_in_file("LATITUDE"),
        float_in_file("TEMP"),
        float_in_file("PSAL"),
        Variable::from_feature(Arc::new(PotentialTemperature::default())),
        Variable::from_feature(Arc::new(SigmaT::default())),
        Variable::from_feature(Arc::new(Pressure::default())),
    ])
    .unwrap();

    let available = ensemble.loading_variables().unwrap().labels();
    assert_eq!(available, vec!["DEPH", "LATITUDE", "TEMP", "PSAL"]);

    let order: Vec<&str> = ensemble
        .constructible_features(&available)
        .unwrap()
        .map(|v| v.name())
        .collect();
    assert_eq!(order, vec!["SIGT", "PRES", "PTEMP"]);
}

#[test]
fn test_unresolvable_features_fail_with_unresolved_set() {
    let ensemble = VariableEnsemble::new([
        float_in_file("TEMP"),
        float_in_file("PSAL"),
        Variable::from_feature(Arc::new(PotentialTemperature::default())),
        Variable::from_feature(Arc::new(Pressure::default())),
        Variable::from_feature(Arc::new(SigmaT::default())),
    ])
    .unwrap();

    // Without depth and latitude, PRES and hence PTEMP cannot be built
    let available = vec!["TEMP".to_string(), "PSAL".to_string()];
    match ensemble.constructible_features(&available) {
        Err(BgcError::UnresolvedFeatures { unresolved }) => {
            assert_eq!(unresolved, "PTEMP, PRES");
        }
        other => panic!("unexpected result: {:?}", other.map(|i| i.count())),
    }
}

#[derive(Debug)]
struct Echo {
    produces: &'static str,
    required: Vec<String>,
}

impl Feature for Echo {
    fn template(&self) -> TemplateVar {
        TemplateVar::new(self.produces, "[]", VarType::Float)
    }

    fn required_vars(&self) -> &[String] {
        &self.required
    }

    fn compute(&self, inputs: &[Vec<f64>]) -> Vec<f64> {
        inputs[0].clone()
    }
}

#[test]
fn test_feature_cycle_detected() {
    let a = Echo {
        produces: "A",
        required: vec!["B".to_string()],
    };
    let b = Echo {
        produces: "B",
        required: vec!["A".to_string()],
    };
    let ensemble = VariableEnsemble::new([
        Variable::from_feature(Arc::new(a)),
        Variable::from_feature(Arc::new(b)),
    ])
    .unwrap();

    let result = ensemble.constructible_features(&[]);
    assert!(matches!(result, Err(BgcError::UnresolvedFeatures { .. })));
}

#[test]
fn test_structural_equality_ignores_aliases() {
    let template = TemplateVar::new("PSAL", "[psu]", VarType::Float);
    let a = VariableEnsemble::new([template.in_file_as(["SALNTY"])]).unwrap();
    let b = VariableEnsemble::new([template.not_in_file()]).unwrap();
    let c = VariableEnsemble::new([float_in_file("PSAL")]).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_remove_var_reindexes() {
    let mut ensemble = VariableEnsemble::new([
        float_in_file("A"),
        float_in_file("B"),
        float_in_file("C"),
    ])
    .unwrap();
    ensemble.remove_var("A").unwrap();
    assert_eq!(ensemble.get("C").unwrap().name(), "C");
    assert!(!ensemble.has_name("A"));
    assert!(ensemble.remove_var("A").is_err());
}
