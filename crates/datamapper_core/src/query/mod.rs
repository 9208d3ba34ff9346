//! SQL text generation: quoting, sort chains, filters and pagination.
//!
//! # Responsibility
//! - Turn parameter maps and sort chains into SQL fragments plus bound params.
//! - Run paged reads through a `Store` and cache their counts.
//!
//! # Invariants
//! - Identifiers are always backtick-quoted; values are bound or store-quoted.

pub mod paginator;
pub mod search;
pub mod sort;
pub mod sql;
