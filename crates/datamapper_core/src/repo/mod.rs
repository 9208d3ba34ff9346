//! Repository layer: maps record schemas onto tables.
//!
//! # Responsibility
//! - Build reads from parameter maps and run them through a paginator.
//! - Turn record state into insert, update and delete statements.
//!
//! # Invariants
//! - Store failures propagate unchanged; no transaction is opened here.

pub mod repository;

pub use repository::{Repository, RepositoryConfig, SaveSummary};
