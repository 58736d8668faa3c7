//! Value constraints and the process-wide constraint type registry.
//!
//! # Responsibility
//! - Define the serializable value-validation predicates attachable to
//!   variables.
//! - Map constraint type tags to factories, with runtime registration for
//!   user-defined constraint types.
//!
//! # Invariants
//! - `to_representation` → `from_representation` → `to_representation`
//!   produces an identical representation for every constraint type.
//! - Re-registering a tag silently overwrites the previous factory (last
//!   registration wins).
//! - Registration mutates process-wide state; callers are expected to
//!   register from one thread during composition.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{PoisonError, RwLock};

/// Serialized form of a constraint: a `"type"` tag plus its parameters.
pub type Representation = Map<String, Value>;

pub type ConstraintResult<T> = Result<T, ConstraintError>;

/// Factory from a parameter map to a constraint instance.
pub type ConstraintFactory = fn(&Representation) -> ConstraintResult<Box<dyn Constraint>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    UnknownType(String),
    MissingParameter {
        constraint_type: String,
        parameter: &'static str,
    },
    InvalidParameter {
        constraint_type: String,
        parameter: &'static str,
        message: String,
    },
    BadPattern {
        pattern: String,
        message: String,
    },
}

impl Display for ConstraintError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType(tag) => write!(f, "unknown constraint type: {tag}"),
            Self::MissingParameter {
                constraint_type,
                parameter,
            } => write!(
                f,
                "constraint `{constraint_type}` requires parameter `{parameter}`"
            ),
            Self::InvalidParameter {
                constraint_type,
                parameter,
                message,
            } => write!(
                f,
                "constraint `{constraint_type}` parameter `{parameter}` is invalid: {message}"
            ),
            Self::BadPattern { pattern, message } => {
                write!(f, "invalid regex pattern `{pattern}`: {message}")
            }
        }
    }
}

impl Error for ConstraintError {}

/// A named, serializable predicate over a single value.
pub trait Constraint: Send + Sync + std::fmt::Debug {
    /// Checks one value. Numeric constraints coerce numeric-looking strings;
    /// string constraints reject non-string values.
    fn validate(&self, value: &Value) -> bool;

    /// Serializes this constraint including its `"type"` tag.
    fn to_representation(&self) -> Representation;
}

static REGISTRY: Lazy<RwLock<BTreeMap<String, ConstraintFactory>>> = Lazy::new(|| {
    let mut registry: BTreeMap<String, ConstraintFactory> = BTreeMap::new();
    registry.insert("min_value".to_string(), MinValueConstraint::from_representation);
    registry.insert("max_value".to_string(), MaxValueConstraint::from_representation);
    registry.insert("email".to_string(), EmailConstraint::from_representation);
    registry.insert("url".to_string(), UrlConstraint::from_representation);
    registry.insert("regex".to_string(), RegexConstraint::from_representation);
    RwLock::new(registry)
});

/// Registers a constraint factory under `tag`, replacing any previous one.
pub fn register_constraint_type(tag: impl Into<String>, factory: ConstraintFactory) {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    registry.insert(tag.into(), factory);
}

/// Returns the sorted list of registered constraint type tags.
pub fn registered_constraint_types() -> Vec<String> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry.keys().cloned().collect()
}

/// Creates a constraint of the tagged type from a parameter map.
pub fn create_constraint(tag: &str, params: &Representation) -> ConstraintResult<Box<dyn Constraint>> {
    let factory = {
        let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
        registry.get(tag).copied()
    };
    match factory {
        Some(factory) => factory(params),
        None => Err(ConstraintError::UnknownType(tag.to_string())),
    }
}

/// Revives a constraint from its serialized representation.
pub fn constraint_from_representation(rep: &Representation) -> ConstraintResult<Box<dyn Constraint>> {
    let tag = rep
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ConstraintError::UnknownType("<missing>".to_string()))?;
    create_constraint(tag, rep)
}

/// Coerces a JSON value to f64 the way numeric constraints compare: numbers
/// pass through, numeric-looking strings parse, everything else is rejected.
fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn require_number(
    rep: &Representation,
    constraint_type: &str,
    parameter: &'static str,
) -> ConstraintResult<Number> {
    match rep.get(parameter) {
        Some(Value::Number(number)) => Ok(number.clone()),
        Some(other) => Err(ConstraintError::InvalidParameter {
            constraint_type: constraint_type.to_string(),
            parameter,
            message: format!("expected a number, got {other}"),
        }),
        None => Err(ConstraintError::MissingParameter {
            constraint_type: constraint_type.to_string(),
            parameter,
        }),
    }
}

/// Lower inclusive bound over numeric values.
#[derive(Debug)]
pub struct MinValueConstraint {
    min_value: Number,
}

impl MinValueConstraint {
    pub fn new(min_value: impl Into<Number>) -> Self {
        Self {
            min_value: min_value.into(),
        }
    }

    fn from_representation(rep: &Representation) -> ConstraintResult<Box<dyn Constraint>> {
        let min_value = require_number(rep, "min_value", "min_value")?;
        Ok(Box::new(Self { min_value }))
    }
}

impl Constraint for MinValueConstraint {
    fn validate(&self, value: &Value) -> bool {
        let Some(bound) = self.min_value.as_f64() else {
            return false;
        };
        coerce_numeric(value).is_some_and(|v| v >= bound)
    }

    fn to_representation(&self) -> Representation {
        let mut rep = Representation::new();
        rep.insert("type".to_string(), Value::String("min_value".to_string()));
        rep.insert("min_value".to_string(), Value::Number(self.min_value.clone()));
        rep
    }
}

/// Upper inclusive bound over numeric values.
#[derive(Debug)]
pub struct MaxValueConstraint {
    max_value: Number,
}

impl MaxValueConstraint {
    pub fn new(max_value: impl Into<Number>) -> Self {
        Self {
            max_value: max_value.into(),
        }
    }

    fn from_representation(rep: &Representation) -> ConstraintResult<Box<dyn Constraint>> {
        let max_value = require_number(rep, "max_value", "max_value")?;
        Ok(Box::new(Self { max_value }))
    }
}

impl Constraint for MaxValueConstraint {
    fn validate(&self, value: &Value) -> bool {
        let Some(bound) = self.max_value.as_f64() else {
            return false;
        };
        coerce_numeric(value).is_some_and(|v| v <= bound)
    }

    fn to_representation(&self) -> Representation {
        let mut rep = Representation::new();
        rep.insert("type".to_string(), Value::String("max_value".to_string()));
        rep.insert("max_value".to_string(), Value::Number(self.max_value.clone()));
        rep
    }
}

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid regex")
});

/// Email address shape check.
#[derive(Debug, Default)]
pub struct EmailConstraint;

impl EmailConstraint {
    pub fn new() -> Self {
        Self
    }

    fn from_representation(_rep: &Representation) -> ConstraintResult<Box<dyn Constraint>> {
        Ok(Box::new(Self))
    }
}

impl Constraint for EmailConstraint {
    fn validate(&self, value: &Value) -> bool {
        value.as_str().is_some_and(|text| EMAIL_PATTERN.is_match(text))
    }

    fn to_representation(&self) -> Representation {
        let mut rep = Representation::new();
        rep.insert("type".to_string(), Value::String("email".to_string()));
        rep
    }
}

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?|ftp)://[^\s/$.?#].[^\s]*$").expect("url pattern is a valid regex")
});

/// http/https/ftp URL shape check.
#[derive(Debug, Default)]
pub struct UrlConstraint;

impl UrlConstraint {
    pub fn new() -> Self {
        Self
    }

    fn from_representation(_rep: &Representation) -> ConstraintResult<Box<dyn Constraint>> {
        Ok(Box::new(Self))
    }
}

impl Constraint for UrlConstraint {
    fn validate(&self, value: &Value) -> bool {
        value.as_str().is_some_and(|text| URL_PATTERN.is_match(text))
    }

    fn to_representation(&self) -> Representation {
        let mut rep = Representation::new();
        rep.insert("type".to_string(), Value::String("url".to_string()));
        rep
    }
}

/// User-supplied pattern, matched at the start of the string only.
#[derive(Debug)]
pub struct RegexConstraint {
    pattern: String,
    compiled: Regex,
}

impl RegexConstraint {
    pub fn new(pattern: impl Into<String>) -> ConstraintResult<Self> {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern).map_err(|err| ConstraintError::BadPattern {
            pattern: pattern.clone(),
            message: err.to_string(),
        })?;
        Ok(Self { pattern, compiled })
    }

    fn from_representation(rep: &Representation) -> ConstraintResult<Box<dyn Constraint>> {
        let pattern = match rep.get("pattern") {
            Some(Value::String(pattern)) => pattern.clone(),
            Some(other) => {
                return Err(ConstraintError::InvalidParameter {
                    constraint_type: "regex".to_string(),
                    parameter: "pattern",
                    message: format!("expected a string, got {other}"),
                })
            }
            None => {
                return Err(ConstraintError::MissingParameter {
                    constraint_type: "regex".to_string(),
                    parameter: "pattern",
                })
            }
        };
        Ok(Box::new(Self::new(pattern)?))
    }
}

impl Constraint for RegexConstraint {
    fn validate(&self, value: &Value) -> bool {
        // Anchored-at-start semantics: the pattern must match a prefix of the
        // value, not merely occur somewhere inside it.
        value
            .as_str()
            .and_then(|text| self.compiled.find(text))
            .is_some_and(|found| found.start() == 0)
    }

    fn to_representation(&self) -> Representation {
        let mut rep = Representation::new();
        rep.insert("type".to_string(), Value::String("regex".to_string()));
        rep.insert("pattern".to_string(), Value::String(self.pattern.clone()));
        rep
    }
}
