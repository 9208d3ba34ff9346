//! Typed field wrappers and their coercion rules.
//!
//! # Responsibility
//! - Coerce raw input into the logical value of a declared kind.
//! - Derive the storage ("SQL") representation from the logical value.
//!
//! # Invariants
//! - A rejected assignment leaves the previous value untouched.
//! - `sql_value()` is a pure function of the current value.

use crate::error::ModelError;
use crate::model::value::{Value, DATETIME_FORMAT};
use chrono::NaiveDateTime;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Declared storage kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Stored as `y` / `n`.
    Boolean,
    Integer,
    Double,
    Varchar,
    /// Stored as `YYYY-MM-DD HH:MM:SS` text.
    Datetime,
    /// Stored as encoded JSON text.
    Json,
}

/// Raw input that a field kind refused to coerce.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInputError {
    pub field: String,
    pub value: Value,
    pub message: String,
}

impl Display for FieldInputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} value `{}` {}", self.field, self.value, self.message)
    }
}

impl Error for FieldInputError {}

impl From<FieldInputError> for ModelError {
    fn from(value: FieldInputError) -> Self {
        Self::ValidationInput {
            field: value.field,
            value: value.value,
            message: value.message,
        }
    }
}

impl FieldKind {
    /// Value held by a field that was never assigned.
    pub fn initial_value(self) -> Value {
        match self {
            Self::Boolean => Value::Bool(false),
            Self::Double => Value::Double(0.0),
            Self::Integer | Self::Varchar | Self::Datetime | Self::Json => Value::Null,
        }
    }

    /// Converts raw input into this kind's logical value.
    ///
    /// Returns the rejection reason on failure; callers attach the field name.
    pub fn coerce(self, raw: Value) -> Result<Value, String> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Self::Boolean => coerce_boolean(raw),
            Self::Integer => coerce_integer(raw),
            Self::Double => coerce_double(raw),
            Self::Varchar => coerce_varchar(raw),
            Self::Datetime => coerce_datetime(raw),
            Self::Json => coerce_json(raw),
        }
    }

    /// Storage representation of a logical value of this kind.
    pub fn sql_value(self, value: &Value) -> Value {
        match self {
            Self::Boolean => Value::from(if value.is_truthy() { "y" } else { "n" }),
            Self::Datetime => match value {
                Value::DateTime(v) => Value::Text(v.format(DATETIME_FORMAT).to_string()),
                other => other.clone(),
            },
            Self::Json => match value {
                Value::Null => Value::Null,
                other => Value::Text(other.to_json().to_string()),
            },
            Self::Integer | Self::Double | Self::Varchar => value.clone(),
        }
    }
}

fn coerce_boolean(raw: Value) -> Result<Value, String> {
    match &raw {
        Value::Bool(v) => Ok(Value::Bool(*v)),
        Value::Integer(1) => Ok(Value::Bool(true)),
        Value::Integer(0) => Ok(Value::Bool(false)),
        Value::Text(v) if v == "y" || v == "1" => Ok(Value::Bool(true)),
        Value::Text(v) if v == "n" || v == "0" => Ok(Value::Bool(false)),
        _ => Err("cannot be converted to boolean".to_string()),
    }
}

fn coerce_integer(raw: Value) -> Result<Value, String> {
    const MESSAGE: &str = "must be an integer";
    match raw {
        Value::Integer(v) => Ok(Value::Integer(v)),
        Value::Bool(v) => Ok(Value::Integer(i64::from(v))),
        Value::Double(v) => integral_double(v).ok_or_else(|| MESSAGE.to_string()),
        Value::Text(v) => {
            let trimmed = v.trim();
            if let Ok(parsed) = trimmed.parse::<i64>() {
                return Ok(Value::Integer(parsed));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(integral_double)
                .ok_or_else(|| MESSAGE.to_string())
        }
        _ => Err(MESSAGE.to_string()),
    }
}

/// Integral doubles inside the `i64` range; `as` would saturate anything else.
fn integral_double(v: f64) -> Option<Value> {
    // 2^63 is exactly representable; i64::MAX as f64 rounds up to it.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if v.is_finite() && v.fract() == 0.0 && (-LIMIT..LIMIT).contains(&v) {
        Some(Value::Integer(v as i64))
    } else {
        None
    }
}

fn coerce_double(raw: Value) -> Result<Value, String> {
    match raw {
        Value::Double(v) => Ok(Value::Double(v)),
        Value::Integer(v) => Ok(Value::Double(v as f64)),
        Value::Text(v) => v
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| "must be a number".to_string()),
        _ => Err("must be a number".to_string()),
    }
}

fn coerce_varchar(raw: Value) -> Result<Value, String> {
    match raw {
        Value::Text(v) => Ok(Value::Text(v)),
        Value::Json(_) => Err("must be a string".to_string()),
        other => Ok(Value::Text(other.to_string())),
    }
}

fn coerce_datetime(raw: Value) -> Result<Value, String> {
    match raw {
        Value::DateTime(v) => Ok(Value::DateTime(v)),
        Value::Text(v) => NaiveDateTime::parse_from_str(v.trim(), DATETIME_FORMAT)
            .map(Value::DateTime)
            .map_err(|err| format!("must match `{DATETIME_FORMAT}`: {err}")),
        _ => Err("must be a datetime or a datetime string".to_string()),
    }
}

fn coerce_json(raw: Value) -> Result<Value, String> {
    match raw {
        Value::Text(v) => serde_json::from_str::<serde_json::Value>(&v)
            .map(Value::Json)
            .map_err(|err| err.to_string()),
        Value::Json(v) => Ok(Value::Json(v)),
        other => Ok(Value::Json(other.to_json())),
    }
}

/// One materialized field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    value: Value,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: kind.initial_value(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_set(&self) -> bool {
        !self.value.is_null()
    }

    /// Coerces and stores `raw`; on failure the previous value is kept.
    pub fn set_value(&mut self, raw: Value) -> Result<(), FieldInputError> {
        match self.kind.coerce(raw.clone()) {
            Ok(value) => {
                self.value = value;
                Ok(())
            }
            Err(message) => Err(FieldInputError {
                field: self.name.clone(),
                value: raw,
                message,
            }),
        }
    }

    pub fn sql_value(&self) -> Value {
        self.kind.sql_value(&self.value)
    }
}
