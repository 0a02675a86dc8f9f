//! Variable ensembles of the known providers.
//!
//! Each provider maps its raw column names, quality flags and units onto
//! the normalized templates of [`crate::variables::defaults`]. Runs pick a
//! provider by the name of its `[providers.<NAME>]` configuration table.

use crate::config::DataFormat;
use crate::constants::names;
use crate::error::{BgcError, Result};
use crate::variables::defaults::template;
use crate::variables::units::{doxy_ml_by_l_to_mmol_by_m3, umol_by_kg_to_mmol_by_m3};
use crate::variables::{
    Alias, PotentialTemperature, Pressure, SigmaT, Value, Variable, VariableEnsemble,
};
use std::sync::Arc;

/// Static description of a provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderDefinition {
    pub name: &'static str,
    pub format: DataFormat,
    /// File name regex used when the configuration sets none
    pub files_pattern: &'static str,
    variables: fn() -> Result<VariableEnsemble>,
}

impl ProviderDefinition {
    pub fn variables(&self) -> Result<VariableEnsemble> {
        (self.variables)()
    }
}

const DEFINITIONS: [ProviderDefinition; 6] = [
    ProviderDefinition {
        name: "GLODAPv2",
        format: DataFormat::Csv,
        files_pattern: r"GLODAPv2\.2022_all\.csv",
        variables: glodapv2,
    },
    ProviderDefinition {
        name: "GLODAP_2019",
        format: DataFormat::Csv,
        files_pattern: r"glodapv2_({years})\.csv",
        variables: glodap_2019,
    },
    ProviderDefinition {
        name: "IMR",
        format: DataFormat::Csv,
        files_pattern: r"imr_({years})\.csv",
        variables: imr,
    },
    ProviderDefinition {
        name: "ICES",
        format: DataFormat::Csv,
        files_pattern: r"ices_({years})\.csv",
        variables: ices,
    },
    ProviderDefinition {
        name: "ARGO",
        format: DataFormat::Netcdf,
        files_pattern: r".*\.nc",
        variables: argo,
    },
    ProviderDefinition {
        name: "HYCOM",
        format: DataFormat::Abfiles,
        files_pattern: r"archm\.{years}_[0-9]*_[0-9]*\.a",
        variables: hycom,
    },
];

/// Names of every known provider
pub fn known_providers() -> Vec<&'static str> {
    DEFINITIONS.iter().map(|d| d.name).collect()
}

/// Definition of a provider, looked up case-insensitively
pub fn definition(name: &str) -> Result<ProviderDefinition> {
    DEFINITIONS
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .copied()
        .ok_or_else(|| {
            BgcError::configuration(format!(
                "unknown provider '{}' (known: {})",
                name,
                known_providers().join(", ")
            ))
        })
}

/// Pressure, potential temperature and sigma-t features
pub fn seawater_features() -> Vec<Variable> {
    vec![
        Variable::from_feature(Arc::new(Pressure::default())),
        Variable::from_feature(Arc::new(PotentialTemperature::default())),
        Variable::from_feature(Arc::new(SigmaT::default())),
    ]
}

fn with_features(variables: Vec<Variable>) -> Result<VariableEnsemble> {
    VariableEnsemble::new(variables.into_iter().chain(seawater_features()))
}

/// GLODAPv2.2022 merged master file (delimited text)
pub fn glodapv2() -> Result<VariableEnsemble> {
    let flagged = |column: &str| Alias::flagged(column, format!("{}f", column), &[2]);
    with_features(vec![
        template(names::PROVIDER)?.not_in_file(),
        template(names::EXPOCODE)?.in_file_as(["G2expocode"]),
        template(names::DATE)?.not_in_file(),
        template(names::YEAR)?.in_file_as(["G2year"]),
        template(names::MONTH)?.in_file_as(["G2month"]),
        template(names::DAY)?.in_file_as(["G2day"]),
        template(names::HOUR)?.in_file_as(["G2hour"]),
        template(names::LONGITUDE)?.in_file_as(["G2longitude"]),
        template(names::LATITUDE)?.in_file_as(["G2latitude"]),
        template(names::DEPTH)?
            .in_file_as(["G2depth"])
            .remove_when_nan()
            .correct_with(|x| -x),
        template(names::TEMPERATURE)?.in_file_as(["G2temperature"]),
        template(names::SALINITY)?.in_file_as([flagged("G2salinity")]),
        template(names::OXYGEN)?
            .in_file_as([flagged("G2oxygen")])
            .correct_with(umol_by_kg_to_mmol_by_m3),
        template(names::PHOSPHATE)?
            .in_file_as([flagged("G2phosphate")])
            .remove_when_all_nan(),
        template(names::NITRATE)?
            .in_file_as([flagged("G2nitrate")])
            .remove_when_all_nan(),
        template(names::SILICATE)?
            .in_file_as([flagged("G2silicate")])
            .remove_when_all_nan(),
        template(names::CHLOROPHYLL)?.not_in_file().remove_when_all_nan(),
    ])
}

/// GLODAPv2.2019 yearly extracts (delimited text, units row)
pub fn glodap_2019() -> Result<VariableEnsemble> {
    let flagged = |column: &str, flag: &str| Alias::flagged(column, flag, &[2]);
    with_features(vec![
        template(names::PROVIDER)?.not_in_file(),
        template(names::EXPOCODE)?.in_file_as(["cruise"]),
        template(names::DATE)?.not_in_file(),
        template(names::YEAR)?.in_file_as(["YEAR"]),
        template(names::MONTH)?.in_file_as(["MONTH"]),
        template(names::DAY)?.in_file_as(["DAY"]),
        template(names::HOUR)?.in_file_as(["hour"]),
        template(names::LONGITUDE)?.in_file_as(["LONGITUDE"]),
        template(names::LATITUDE)?.in_file_as(["LATITUDE"]),
        template(names::DEPTH)?
            .in_file_as(["DEPTH"])
            .remove_when_nan()
            .correct_with(|x| -x),
        template(names::TEMPERATURE)?.in_file_as(["THETA"]),
        template(names::SALINITY)?.in_file_as([flagged("SALNTY", "salinityf")]),
        template(names::OXYGEN)?
            .in_file_as([flagged("OXYGEN", "oxygenf")])
            .correct_with(|x| x / 32.0),
        template(names::PHOSPHATE)?
            .in_file_as([flagged("PHSPHT", "phosphatef")])
            .remove_when_all_nan(),
        template(names::NITRATE)?
            .in_file_as([flagged("NITRAT", "nitratef")])
            .remove_when_all_nan(),
        template(names::SILICATE)?
            .in_file_as([flagged("SILCAT", "silicatef")])
            .remove_when_all_nan(),
        template(names::CHLOROPHYLL)?.not_in_file().remove_when_all_nan(),
    ])
}

/// Institute of Marine Research station files (delimited text, units row)
pub fn imr() -> Result<VariableEnsemble> {
    with_features(vec![
        template(names::PROVIDER)?.not_in_file(),
        template(names::EXPOCODE)?.not_in_file(),
        template(names::DATE)?.not_in_file(),
        template(names::YEAR)?.in_file_as(["Year"]),
        template(names::MONTH)?.in_file_as(["Month"]),
        template(names::DAY)?.in_file_as(["Day"]),
        template(names::HOUR)?.not_in_file(),
        template(names::LONGITUDE)?.in_file_as(["Long"]),
        template(names::LATITUDE)?.in_file_as(["Lati"]),
        template(names::DEPTH)?
            .in_file_as(["Depth"])
            .remove_when_nan()
            .correct_with(|x| -x.abs()),
        template(names::TEMPERATURE)?.in_file_as(["Temp"]),
        template(names::SALINITY)?.in_file_as(["Saln."]),
        template(names::OXYGEN)?
            .in_file_as(["Oxygen", "Doxy"])
            .correct_with(doxy_ml_by_l_to_mmol_by_m3),
        template(names::PHOSPHATE)?
            .in_file_as(["Phosphate"])
            .remove_when_all_nan(),
        template(names::NITRATE)?
            .in_file_as(["Nitrate"])
            .remove_when_all_nan(),
        template(names::SILICATE)?
            .in_file_as(["Silicate"])
            .remove_when_all_nan(),
        template(names::CHLOROPHYLL)?
            .in_file_as(["Chl."])
            .remove_when_all_nan(),
    ])
}

/// ICES bottle extracts (delimited text, units row, full timestamps)
pub fn ices() -> Result<VariableEnsemble> {
    with_features(vec![
        template(names::PROVIDER)?.not_in_file(),
        template(names::EXPOCODE)?.in_file_as(["Cruise"]),
        template(names::DATE)?.in_file_as(["DATE"]),
        template(names::YEAR)?.not_in_file(),
        template(names::MONTH)?.not_in_file(),
        template(names::DAY)?.not_in_file(),
        template(names::HOUR)?.not_in_file(),
        template(names::LONGITUDE)?.in_file_as(["LONGITUDE"]),
        template(names::LATITUDE)?.in_file_as(["LATITUDE"]),
        template(names::DEPTH)?
            .in_file_as(["DEPTH"])
            .remove_when_nan()
            .correct_with(|x| -x),
        template(names::TEMPERATURE)?.in_file_as(["CTDTMP"]),
        template(names::SALINITY)?.in_file_as(["CTDSAL"]),
        template(names::OXYGEN)?.in_file_as(["DOXY"]),
        template(names::PHOSPHATE)?
            .in_file_as(["PHOS"])
            .remove_when_all_nan(),
        template(names::NITRATE)?
            .in_file_as(["NTRA"])
            .remove_when_all_nan(),
        template(names::SILICATE)?
            .in_file_as(["SLCA"])
            .remove_when_all_nan(),
        template(names::CHLOROPHYLL)?
            .in_file_as(["CPHL"])
            .remove_when_all_nan(),
    ])
}

/// ARGO profile files (NetCDF)
pub fn argo() -> Result<VariableEnsemble> {
    let qc = |column: &str, accepted: &[i64]| {
        Alias::flagged(column, format!("{}_QC", column), accepted)
    };
    with_features(vec![
        template(names::PROVIDER)?.not_in_file(),
        template(names::EXPOCODE)?.not_in_file(),
        template(names::DATE)?.in_file_as(["TIME"]),
        template(names::YEAR)?.not_in_file(),
        template(names::MONTH)?.not_in_file(),
        template(names::DAY)?.not_in_file(),
        template(names::HOUR)?.not_in_file(),
        template(names::LONGITUDE)?.in_file_as(["LONGITUDE"]),
        template(names::LATITUDE)?.in_file_as(["LATITUDE"]),
        template(names::DEPTH)?
            .in_file_as(["PRES_ADJUSTED"])
            .remove_when_nan()
            .correct_with(|x| -x.abs()),
        template(names::TEMPERATURE)?
            .in_file_as([qc("TEMP_ADJUSTED", &[2]), qc("TEMP", &[2])]),
        template(names::SALINITY)?
            .in_file_as([qc("PSAL_ADJUSTED", &[2]), qc("PSAL", &[2])]),
        template(names::OXYGEN)?.in_file_as(["DOX2_ADJUSTED", "DOX2"]),
        template(names::PHOSPHATE)?.not_in_file(),
        template(names::NITRATE)?.not_in_file(),
        template(names::SILICATE)?.not_in_file(),
        template(names::CHLOROPHYLL)?
            .in_file_as([qc("CPHL_ADJUSTED", &[1]), qc("CPHL", &[1])])
            .remove_when_all_nan()
            .correct_with(|x| if x < 0.01 { f64::NAN } else { x }),
    ])
}

/// HYCOM model archives (ABFiles)
pub fn hycom() -> Result<VariableEnsemble> {
    with_features(vec![
        template(names::PROVIDER)?
            .not_in_file()
            .set_default(Value::Str("HYCOM".to_string())),
        template(names::EXPOCODE)?.not_in_file(),
        template(names::DATE)?.not_in_file(),
        template(names::YEAR)?.not_in_file(),
        template(names::MONTH)?.not_in_file(),
        template(names::DAY)?.not_in_file(),
        template(names::HOUR)?.not_in_file(),
        template(names::LONGITUDE)?.in_file_as(["plon"]),
        template(names::LATITUDE)?.in_file_as(["plat"]),
        template(names::DEPTH)?.in_file_as(["thknss"]),
        template(names::TEMPERATURE)?.in_file_as(["temp"]),
        template(names::SALINITY)?.in_file_as(["salin"]),
        template(names::OXYGEN)?.not_in_file(),
        template(names::PHOSPHATE)?.not_in_file(),
        template(names::NITRATE)?.not_in_file(),
        template(names::SILICATE)?.not_in_file(),
        template(names::CHLOROPHYLL)?.not_in_file(),
    ])
}
