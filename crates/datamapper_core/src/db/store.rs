//! Store collaborator contract.

use super::DbResult;
use crate::model::value::Value;
use crate::model::RawRow;
use crate::query::sql::quote_literal;

/// Named parameters bound to a statement, e.g. `(":name", "bob")`.
pub type Params = Vec<(String, Value)>;

/// SQL execution driver used by repositories and paginators.
///
/// Prepared calls bind `params` by name; `exec` runs a statement as-is.
pub trait Store {
    fn fetch_all(&self, sql: &str, params: &[(String, Value)]) -> DbResult<Vec<RawRow>>;

    fn fetch_one(&self, sql: &str, params: &[(String, Value)]) -> DbResult<Option<RawRow>> {
        Ok(self.fetch_all(sql, params)?.into_iter().next())
    }

    /// First column of the first row, `Value::Null` when there is no row.
    fn fetch_scalar(&self, sql: &str, params: &[(String, Value)]) -> DbResult<Value>;

    /// Runs a prepared statement and returns the number of affected rows.
    fn execute(&self, sql: &str, params: &[(String, Value)]) -> DbResult<usize>;

    /// Runs an unprepared statement whose literals were quoted by [`Store::quote`].
    fn exec(&self, sql: &str) -> DbResult<usize>;

    /// Quotes a value as a SQL literal for this store.
    fn quote(&self, value: &Value) -> String {
        quote_literal(value)
    }

    /// Identity generated by the most recent insert.
    fn last_insert_id(&self) -> DbResult<Value>;
}
