//! Store connection boundary and SQLite bootstrap.
//!
//! # Responsibility
//! - Define the `Store` contract the mapper executes SQL through.
//! - Provide a SQLite implementation and connection open helpers.
//!
//! # Invariants
//! - The core borrows connections; it never closes them or scopes transactions.
//! - Driver errors are passed through as `DbError` without reinterpretation.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
mod sqlite;
mod store;

pub use open::{open_db, open_db_in_memory};
pub use sqlite::SqliteStore;
pub use store::{Params, Store};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Failure reported by a non-SQLite `Store` implementation.
    Driver(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Driver(message) => write!(f, "{message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Driver(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
