//! Data-mapper core: typed records, record sets, table repositories,
//! sort chains and SQL pagination over a pluggable `Store`.

pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use db::{open_db, open_db_in_memory, DbError, DbResult, Params, SqliteStore, Store};
pub use error::{ModelError, ModelResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::field::{Field, FieldInputError, FieldKind};
pub use model::record::{Record, ValidationErrors};
pub use model::record_set::RecordSet;
pub use model::schema::{FieldDef, RecordSchema, SchemaBuilder, TempIdentity};
pub use model::validation::{Rule, RuleSpec};
pub use model::value::Value;
pub use model::RawRow;
pub use query::paginator::{Paginator, PaginatorConfig};
pub use query::search::{QueryFilter, SearchOperator, SearchParams, SearchTypes, SearchValue};
pub use query::sort::{Sort, SortDirection};
pub use repo::{Repository, RepositoryConfig, SaveSummary};
