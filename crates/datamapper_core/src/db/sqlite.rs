//! SQLite `Store` implementation.

use super::store::Store;
use super::DbResult;
use crate::model::value::{Value, DATETIME_FORMAT};
use crate::model::RawRow;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension};

/// Store backed by a borrowed `rusqlite` connection.
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

impl Store for SqliteStore<'_> {
    fn fetch_all(&self, sql: &str, params: &[(String, Value)]) -> DbResult<Vec<RawRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let bound = bind(params);
        let mut rows = stmt.query(bound.as_slice())?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut raw = RawRow::new();
            for (index, column) in columns.iter().enumerate() {
                let value: SqlValue = row.get(index)?;
                raw.insert(column.clone(), from_sql(value));
            }
            out.push(raw);
        }
        Ok(out)
    }

    fn fetch_scalar(&self, sql: &str, params: &[(String, Value)]) -> DbResult<Value> {
        let bound = bind(params);
        let value = self
            .conn
            .query_row(sql, bound.as_slice(), |row| row.get::<_, SqlValue>(0))
            .optional()?;
        Ok(value.map_or(Value::Null, from_sql))
    }

    fn execute(&self, sql: &str, params: &[(String, Value)]) -> DbResult<usize> {
        let bound = bind(params);
        Ok(self.conn.execute(sql, bound.as_slice())?)
    }

    fn exec(&self, sql: &str) -> DbResult<usize> {
        Ok(self.conn.execute(sql, [])?)
    }

    fn last_insert_id(&self) -> DbResult<Value> {
        Ok(Value::Integer(self.conn.last_insert_rowid()))
    }
}

fn bind(params: &[(String, Value)]) -> Vec<(&str, &dyn ToSql)> {
    params
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(v),
        SqlValue::Real(v) => Value::Double(v),
        SqlValue::Text(v) => Value::Text(v),
        SqlValue::Blob(v) => Value::Text(String::from_utf8_lossy(&v).into_owned()),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null => Ok(ToSqlOutput::Owned(SqlValue::Null)),
            Value::Bool(v) => Ok(ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v)))),
            Value::Integer(v) => Ok(ToSqlOutput::Owned(SqlValue::Integer(*v))),
            Value::Double(v) => Ok(ToSqlOutput::Owned(SqlValue::Real(*v))),
            Value::Text(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
            Value::DateTime(v) => Ok(ToSqlOutput::Owned(SqlValue::Text(
                v.format(DATETIME_FORMAT).to_string(),
            ))),
            Value::Json(v) => Ok(ToSqlOutput::Owned(SqlValue::Text(v.to_string()))),
        }
    }
}
