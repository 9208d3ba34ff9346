//! Record model: values, fields, schemas, records and record sets.
//!
//! # Responsibility
//! - Define the typed record abstraction the repository persists.
//! - Keep coercion, dirty tracking and validation independent of SQL.
//!
//! # Invariants
//! - Raw input is coerced lazily, on first structured access.
//! - Records only ever hold fields declared by their schema.

use std::collections::BTreeMap;

pub mod field;
pub mod record;
pub mod record_set;
pub mod schema;
pub mod validation;
pub mod value;

/// Column name → value, as read from the store or supplied by a caller.
pub type RawRow = BTreeMap<String, value::Value>;
