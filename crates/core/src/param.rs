//! Task Parameters
//!
//! Parameters flowing through a plan are a closed variant (`ParamValue`)
//! rather than free-form JSON. Every task type declares `ParameterSpec`s
//! which are checked right before dispatch.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Resolved parameters of a task, keyed by parameter name.
pub type Params = BTreeMap<String, ParamValue>;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<ParamValue>),
    Object(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// The semantic kind of this value.
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Boolean(_) => ParamKind::Boolean,
            ParamValue::Number(_) => ParamKind::Number,
            ParamValue::String(_) => ParamKind::String,
            ParamValue::List(_) => ParamKind::List,
            ParamValue::Object(_) => ParamKind::Object,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert from JSON. `null` has no counterpart and yields `None`;
    /// null entries inside arrays and objects are dropped.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(ParamValue::Boolean(*b)),
            Value::Number(n) => n.as_f64().map(ParamValue::Number),
            Value::String(s) => Some(ParamValue::String(s.clone())),
            Value::Array(items) => Some(ParamValue::List(
                items.iter().filter_map(ParamValue::from_json).collect(),
            )),
            Value::Object(map) => Some(ParamValue::Object(
                map.iter()
                    .filter_map(|(k, v)| ParamValue::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Boolean(b) => Value::Bool(*b),
            ParamValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::List(items) => Value::Array(items.iter().map(ParamValue::to_json).collect()),
            ParamValue::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Render the value for prompt interpolation. Strings are inserted
    /// verbatim, integral numbers without a fractional part, everything
    /// else as compact JSON.
    pub fn render(&self) -> String {
        match self {
            ParamValue::String(s) => s.clone(),
            ParamValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            ParamValue::Number(n) => n.to_string(),
            ParamValue::Boolean(b) => b.to_string(),
            other => other.to_json().to_string(),
        }
    }

    /// Lenient conversion towards `kind`, used for values that arrive from
    /// upstream payloads. Anything renders into a string, numeric and
    /// boolean strings parse, and a scalar wraps into a one-item list.
    /// Values that cannot be converted are returned unchanged so that
    /// validation reports the mismatch.
    pub fn coerce_to(self, kind: ParamKind) -> Self {
        if self.kind() == kind {
            return self;
        }
        match (kind, self) {
            (ParamKind::String, value) => ParamValue::String(value.render()),
            (ParamKind::Number, ParamValue::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) => ParamValue::Number(n),
                Err(_) => ParamValue::String(s),
            },
            (ParamKind::Boolean, ParamValue::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" => ParamValue::Boolean(true),
                "false" | "no" => ParamValue::Boolean(false),
                _ => ParamValue::String(s),
            },
            (ParamKind::List, value @ (ParamValue::String(_) | ParamValue::Number(_) | ParamValue::Boolean(_))) => {
                ParamValue::List(vec![value])
            }
            (_, value) => value,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Number(n as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Boolean(b)
    }
}

/// Semantic type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Object,
    List,
}

impl ParamKind {
    /// Neutral value used when a required parameter has to be back-filled.
    pub fn empty_value(&self) -> ParamValue {
        match self {
            ParamKind::String => ParamValue::String(String::new()),
            ParamKind::Number => ParamValue::Number(0.0),
            ParamKind::Boolean => ParamValue::Boolean(false),
            ParamKind::Object => ParamValue::Object(BTreeMap::new()),
            ParamKind::List => ParamValue::List(Vec::new()),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::String => write!(f, "string"),
            ParamKind::Number => write!(f, "number"),
            ParamKind::Boolean => write!(f, "boolean"),
            ParamKind::Object => write!(f, "object"),
            ParamKind::List => write!(f, "list"),
        }
    }
}

/// Optional constraints on a parameter value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamValidation {
    /// Minimum numeric value, or minimum length for strings and lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Maximum numeric value, or maximum length for strings and lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regex a string value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Closed set of allowed string values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

/// Declaration of a single task parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ParamValidation>,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
            validation: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            validation: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_validation(mut self, validation: ParamValidation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Check a single value against kind and constraints.
    pub fn check(&self, value: &ParamValue) -> CoreResult<()> {
        if value.kind() != self.kind {
            return Err(CoreError::validation(format!(
                "parameter '{}' expects {} but got {}",
                self.name,
                self.kind,
                value.kind()
            )));
        }

        let Some(rules) = &self.validation else {
            return Ok(());
        };

        let measured = match value {
            ParamValue::Number(n) => Some(*n),
            ParamValue::String(s) => Some(s.chars().count() as f64),
            ParamValue::List(items) => Some(items.len() as f64),
            _ => None,
        };
        if let (Some(min), Some(m)) = (rules.min, measured) {
            if m < min {
                return Err(CoreError::validation(format!(
                    "parameter '{}' is below minimum {}",
                    self.name, min
                )));
            }
        }
        if let (Some(max), Some(m)) = (rules.max, measured) {
            if m > max {
                return Err(CoreError::validation(format!(
                    "parameter '{}' exceeds maximum {}",
                    self.name, max
                )));
            }
        }

        if let (Some(pattern), ParamValue::String(s)) = (&rules.pattern, value) {
            let re = Regex::new(pattern).map_err(|e| {
                CoreError::internal(format!("invalid pattern for '{}': {}", self.name, e))
            })?;
            if !re.is_match(s) {
                return Err(CoreError::validation(format!(
                    "parameter '{}' does not match pattern {}",
                    self.name, pattern
                )));
            }
        }

        if let (Some(allowed), ParamValue::String(s)) = (&rules.allowed, value) {
            if !allowed.iter().any(|a| a == s) {
                return Err(CoreError::validation(format!(
                    "parameter '{}' must be one of [{}]",
                    self.name,
                    allowed.join(", ")
                )));
            }
        }

        Ok(())
    }
}

/// Validate `params` against `specs`, filling declared defaults in place.
///
/// A required parameter with neither a value nor a default is a hard
/// validation failure.
pub fn validate_params(specs: &[ParameterSpec], params: &mut Params) -> CoreResult<()> {
    for spec in specs {
        match params.get(&spec.name) {
            Some(value) => spec.check(value)?,
            None => match &spec.default {
                Some(default) => {
                    params.insert(spec.name.clone(), default.clone());
                }
                None if spec.required => {
                    return Err(CoreError::validation(format!(
                        "required parameter '{}' is missing",
                        spec.name
                    )));
                }
                None => {}
            },
        }
    }
    Ok(())
}
