//! Variable descriptors.
//!
//! A [`TemplateVar`] describes a semantic quantity once (name, unit, type,
//! default, export formats). Provider-specific [`Variable`]s are derived from
//! it with [`TemplateVar::in_file_as`] or [`TemplateVar::not_in_file`]; every
//! builder call returns a new value so a template can be shared by any number
//! of providers.

use crate::constants::{DEFAULT_NAME_FORMAT, DEFAULT_VALUE_FORMAT};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::features::Feature;

/// Storage type of a variable's column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Str,
    Float,
    Int,
    Datetime,
}

impl VarType {
    /// Whether values of this type go through numeric parsing
    pub fn is_numeric(&self) -> bool {
        matches!(self, VarType::Float | VarType::Int)
    }

    fn repr(&self) -> &'static str {
        match self {
            VarType::Str => "str",
            VarType::Float => "float",
            VarType::Int => "int",
            VarType::Datetime => "datetime",
        }
    }
}

/// Default value substituted for absent or rejected data
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Float(f64),
    Int(i64),
    Str(String),
}

impl Value {
    /// Numeric view of the value, NaN when not numeric
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Float(v) => *v,
            Value::Int(v) => *v as f64,
            Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
            Value::Missing => f64::NAN,
        }
    }

    /// Integer view of the value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.is_finite() => Some(*v as i64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String view of the value
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Float(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Missing => None,
        }
    }
}

/// Mapping from a raw file column to a variable.
///
/// When a flag column is declared, a value is only kept if the flag holds
/// one of the accepted codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alias {
    pub column: String,
    pub flag: Option<String>,
    pub accepted_flags: Vec<i64>,
}

impl Alias {
    /// Alias without quality flag
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            flag: None,
            accepted_flags: Vec::new(),
        }
    }

    /// Alias whose values are filtered by a flag column
    pub fn flagged(column: impl Into<String>, flag: impl Into<String>, accepted: &[i64]) -> Self {
        Self {
            column: column.into(),
            flag: Some(flag.into()),
            accepted_flags: accepted.to_vec(),
        }
    }

    /// Whether this alias filters on a flag column
    pub fn has_flag_filter(&self) -> bool {
        self.flag.is_some() && !self.accepted_flags.is_empty()
    }

    /// Whether a numeric flag value is accepted
    pub fn accepts(&self, flag_value: f64) -> bool {
        flag_value.is_finite()
            && self
                .accepted_flags
                .iter()
                .any(|&accepted| accepted as f64 == flag_value)
    }

    /// Whether a raw textual flag value is accepted
    pub fn accepts_str(&self, raw: Option<&str>) -> bool {
        raw.and_then(|r| r.trim().parse::<f64>().ok())
            .is_some_and(|v| self.accepts(v))
    }
}

impl From<&str> for Alias {
    fn from(column: &str) -> Self {
        Alias::new(column)
    }
}

impl From<(&str, &str, &[i64])> for Alias {
    fn from((column, flag, accepted): (&str, &str, &[i64])) -> Self {
        Alias::flagged(column, flag, accepted)
    }
}

/// Pure value transformation applied after parsing
pub type Correction = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Where a variable's values come from
#[derive(Clone)]
pub enum Origin {
    /// Template not yet bound to a provider
    Template,
    /// Read from the provider's files through aliases
    InFile,
    /// Filled with the default value
    NotInFile,
    /// Computed from other variables
    Feature(Arc<dyn Feature>),
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Template => write!(f, "Template"),
            Origin::InFile => write!(f, "InFile"),
            Origin::NotInFile => write!(f, "NotInFile"),
            Origin::Feature(feature) => write!(f, "Feature({:?})", feature.required_vars()),
        }
    }
}

/// Provider-independent description of a variable
#[derive(Debug, Clone)]
pub struct TemplateVar {
    name: String,
    unit: String,
    var_type: VarType,
    default: Value,
    name_format: String,
    value_format: String,
}

impl TemplateVar {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, var_type: VarType) -> Self {
        let default = match var_type {
            VarType::Float => Value::Float(f64::NAN),
            VarType::Str => Value::Str(String::new()),
            VarType::Int | VarType::Datetime => Value::Missing,
        };
        Self {
            name: name.into(),
            unit: unit.into(),
            var_type,
            default,
            name_format: DEFAULT_NAME_FORMAT.to_string(),
            value_format: DEFAULT_VALUE_FORMAT.to_string(),
        }
    }

    /// Copy with a different default value
    pub fn with_default(&self, default: Value) -> Self {
        Self {
            default,
            ..self.clone()
        }
    }

    /// Copy with different export formats
    pub fn with_formats(&self, name_format: &str, value_format: &str) -> Self {
        Self {
            name_format: name_format.to_string(),
            value_format: value_format.to_string(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable read from the provider's files under the given aliases
    pub fn in_file_as<A: Into<Alias>>(&self, aliases: impl IntoIterator<Item = A>) -> Variable {
        self.build(Origin::InFile)
            .with_aliases(aliases.into_iter().map(Into::into).collect())
    }

    /// Variable absent from the provider's files, filled with its default
    pub fn not_in_file(&self) -> Variable {
        self.build(Origin::NotInFile)
    }

    /// Variable left unbound (treated as absent by loaders)
    pub fn as_variable(&self) -> Variable {
        self.build(Origin::Template)
    }

    fn build(&self, origin: Origin) -> Variable {
        Variable {
            name: self.name.clone(),
            unit: self.unit.clone(),
            var_type: self.var_type,
            default: self.default.clone(),
            name_format: self.name_format.clone(),
            value_format: self.value_format.clone(),
            aliases: Vec::new(),
            origin,
            remove_if_nan: false,
            remove_if_all_nan: false,
            correction: None,
        }
    }
}

/// A variable bound to a provider (or a derived feature)
#[derive(Clone)]
pub struct Variable {
    name: String,
    unit: String,
    var_type: VarType,
    default: Value,
    name_format: String,
    value_format: String,
    aliases: Vec<Alias>,
    origin: Origin,
    remove_if_nan: bool,
    remove_if_all_nan: bool,
    correction: Option<Correction>,
}

impl Variable {
    /// Variable computed by a feature
    pub fn from_feature(feature: Arc<dyn Feature>) -> Self {
        let mut var = feature.template().build(Origin::NotInFile);
        var.origin = Origin::Feature(feature);
        var
    }

    /// Rebuild a variable description parsed from a saved file
    pub fn parsed(name: impl Into<String>, unit: impl Into<String>, var_type: VarType) -> Self {
        let name: String = name.into();
        TemplateVar::new(name.clone(), unit, var_type).in_file_as([name.as_str()])
    }

    fn with_aliases(mut self, aliases: Vec<Alias>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Drop rows where this variable is NaN
    pub fn remove_when_nan(mut self) -> Self {
        self.remove_if_nan = true;
        self
    }

    /// Drop rows where this variable and all other flagged variables are NaN
    pub fn remove_when_all_nan(mut self) -> Self {
        self.remove_if_all_nan = true;
        self
    }

    /// Apply a correction to every parsed value
    pub fn correct_with<F>(mut self, correction: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.correction = Some(Arc::new(correction));
        self
    }

    pub fn set_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column key of the variable in normalized tables
    pub fn label(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn var_type(&self) -> VarType {
        self.var_type
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn name_format(&self) -> &str {
        &self.name_format
    }

    pub fn value_format(&self) -> &str {
        &self.value_format
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn remove_if_nan(&self) -> bool {
        self.remove_if_nan
    }

    pub fn remove_if_all_nan(&self) -> bool {
        self.remove_if_all_nan
    }

    pub fn correction(&self) -> Option<&Correction> {
        self.correction.as_ref()
    }

    /// Whether the variable is read from source files
    pub fn is_in_file(&self) -> bool {
        matches!(self.origin, Origin::InFile)
    }

    pub fn feature(&self) -> Option<&Arc<dyn Feature>> {
        match &self.origin {
            Origin::Feature(feature) => Some(feature),
            _ => None,
        }
    }

    /// `name_unit_type` representation used for equality
    pub fn repr(&self) -> String {
        format!("{}_{}_{}", self.name, self.unit, self.var_type.repr())
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("type", &self.var_type)
            .field("origin", &self.origin)
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.repr() == other.repr()
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repr().hash(state);
    }
}
