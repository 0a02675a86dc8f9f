//! Default templates of the normalized schema.

use super::descriptor::{TemplateVar, Value, VarType};
use crate::constants::names;
use crate::error::{BgcError, Result};

/// Every default template, in normalized column order
pub fn default_templates() -> Vec<TemplateVar> {
    vec![
        TemplateVar::new(names::PROVIDER, "[]", VarType::Str).with_formats("%-15s", "%15s"),
        TemplateVar::new(names::EXPOCODE, "[]", VarType::Str).with_formats("%-15s", "%15s"),
        TemplateVar::new(names::DATE, "[]", VarType::Datetime).with_formats("%-15s", "%15s"),
        TemplateVar::new(names::YEAR, "[]", VarType::Int).with_formats("%-4s", "%4d"),
        TemplateVar::new(names::MONTH, "[]", VarType::Int).with_formats("%-2s", "%2d"),
        TemplateVar::new(names::DAY, "[]", VarType::Int).with_formats("%-3s", "%3d"),
        TemplateVar::new(names::HOUR, "[]", VarType::Int)
            .with_default(Value::Int(0))
            .with_formats("%-4s", "%4d"),
        TemplateVar::new(names::LONGITUDE, "[deg_E]", VarType::Float)
            .with_formats("%-12s", "%12.6f"),
        TemplateVar::new(names::LATITUDE, "[deg_N]", VarType::Float)
            .with_formats("%-12s", "%12.6f"),
        TemplateVar::new(names::DEPTH, "[meters]", VarType::Float)
            .with_formats("%-10s", "%10.2f"),
        TemplateVar::new(names::TEMPERATURE, "[deg_C]", VarType::Float)
            .with_formats("%-10s", "%10.3f"),
        TemplateVar::new(names::SALINITY, "[psu]", VarType::Float)
            .with_formats("%-10s", "%10.3f"),
        TemplateVar::new(names::OXYGEN, "[mmol/m3]", VarType::Float)
            .with_formats("%-10s", "%10.3f"),
        TemplateVar::new(names::PHOSPHATE, "[mmol/m3]", VarType::Float)
            .with_formats("%-10s", "%10.3f"),
        TemplateVar::new(names::NITRATE, "[mmol/m3]", VarType::Float)
            .with_formats("%-10s", "%10.3f"),
        TemplateVar::new(names::SILICATE, "[mmol/m3]", VarType::Float)
            .with_formats("%-10s", "%10.3f"),
        TemplateVar::new(names::CHLOROPHYLL, "[mg/m3]", VarType::Float)
            .with_formats("%-10s", "%10.3f"),
    ]
}

/// Default template by canonical name
pub fn template(name: &str) -> Result<TemplateVar> {
    let templates = default_templates();
    let valid: Vec<String> = templates.iter().map(|t| t.name().to_string()).collect();
    templates
        .into_iter()
        .find(|t| t.name() == name)
        .ok_or_else(|| BgcError::UnknownVariable {
            name: name.to_string(),
            valid: valid.join(", "),
        })
}
