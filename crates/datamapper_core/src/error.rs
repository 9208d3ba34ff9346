//! Error taxonomy shared by the mapper layer.
//!
//! # Responsibility
//! - Classify failures as configuration, input, type, bounds or state errors.
//! - Carry store failures through untouched so callers own retry policy.
//!
//! # Invariants
//! - Store errors are never rewritten; `source()` always exposes the driver error.

use crate::db::DbError;
use crate::model::value::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ModelResult<T> = Result<T, ModelError>;

/// Error type for record, collection, query and repository operations.
#[derive(Debug)]
pub enum ModelError {
    /// Missing or invalid declaration: table, id column, operator, field name.
    Config(String),
    /// A raw value could not be coerced into the field's kind.
    ValidationInput {
        field: String,
        value: Value,
        message: String,
    },
    /// A record or collection of another schema was passed in.
    TypeMismatch { expected: String, found: String },
    /// Index or seek position does not exist in a collection.
    Bounds(usize),
    /// A value was read before the computation that produces it ran.
    State(String),
    Db(DbError),
}

impl ModelError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(message) => write!(f, "configuration error: {message}"),
            Self::ValidationInput {
                field,
                value,
                message,
            } => write!(f, "{field} value `{value}` rejected: {message}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected record of type `{expected}`, got `{found}`")
            }
            Self::Bounds(position) => write!(f, "invalid position ({position})"),
            Self::State(message) => write!(f, "{message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Config(_)
            | Self::ValidationInput { .. }
            | Self::TypeMismatch { .. }
            | Self::Bounds(_)
            | Self::State(_) => None,
        }
    }
}

impl From<DbError> for ModelError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ModelError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
