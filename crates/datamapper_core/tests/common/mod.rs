#![allow(dead_code)]

use datamapper_core::{
    open_db_in_memory, DbResult, FieldKind, RawRow, RecordSchema, Rule, RuleSpec, SqliteStore,
    Store, Value,
};
use rusqlite::Connection;
use std::cell::RefCell;
use std::sync::Arc;

pub const SCHEMA_SQL: &str = "
CREATE TABLE users (
    userId INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    age INTEGER,
    height REAL,
    handsome TEXT NOT NULL DEFAULT 'n'
);
CREATE TABLE pets (
    petId INTEGER PRIMARY KEY AUTOINCREMENT,
    userId INTEGER NOT NULL REFERENCES users(userId) ON DELETE CASCADE,
    kind TEXT NOT NULL
);";

/// `User` record type: physical id column `userId`, aggregate `petCount`.
pub fn users_schema() -> Arc<RecordSchema> {
    RecordSchema::builder("User")
        .id_column("userId")
        .field("id", FieldKind::Integer)
        .field("name", FieldKind::Varchar)
        .field("age", FieldKind::Integer)
        .field("height", FieldKind::Double)
        .field("handsome", FieldKind::Boolean)
        .field("petCount", FieldKind::Integer)
        .aggregate("petCount")
        .default_value("age", 18)
        .rule(
            "name",
            RuleSpec::new(Rule::StringLength {
                min: 2,
                max: Some(60),
            }),
        )
        .rule("name", Rule::regex("[^0-9]").unwrap())
        .rule(
            "age",
            Rule::GreaterThan {
                min: 18.0,
                inclusive: true,
            },
        )
        .build()
        .unwrap()
}

pub fn users_db() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(SCHEMA_SQL).unwrap();
    conn
}

/// Three users (Marcus, Donald, Zoe) with ids 1..=3; Marcus owns two pets.
pub fn seeded_users_db() -> Connection {
    let conn = users_db();
    conn.execute_batch(
        "INSERT INTO users (name, age, height, handsome) VALUES ('Marcus', 40, 1.8, 'y');
         INSERT INTO users (name, age, height, handsome) VALUES ('Donald', 25, 1.7, 'n');
         INSERT INTO users (name, age, height, handsome) VALUES ('Zoe', 31, NULL, 'n');
         INSERT INTO pets (userId, kind) VALUES (1, 'cat');
         INSERT INTO pets (userId, kind) VALUES (1, 'dog');",
    )
    .unwrap();
    conn
}

pub fn user_row(id: i64, name: &str, age: i64) -> RawRow {
    let mut row = RawRow::new();
    row.insert("id".to_string(), Value::Integer(id));
    row.insert("name".to_string(), Value::from(name));
    row.insert("age".to_string(), Value::Integer(age));
    row
}

/// SQLite store that remembers every SQL string it was asked to run.
pub struct RecordingStore<'conn> {
    inner: SqliteStore<'conn>,
    statements: RefCell<Vec<String>>,
}

impl<'conn> RecordingStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            inner: SqliteStore::new(conn),
            statements: RefCell::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.borrow().clone()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.statements
            .borrow()
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.statements.borrow_mut().clear();
    }

    fn record(&self, sql: &str) {
        self.statements.borrow_mut().push(sql.to_string());
    }
}

impl Store for RecordingStore<'_> {
    fn fetch_all(&self, sql: &str, params: &[(String, Value)]) -> DbResult<Vec<RawRow>> {
        self.record(sql);
        self.inner.fetch_all(sql, params)
    }

    fn fetch_scalar(&self, sql: &str, params: &[(String, Value)]) -> DbResult<Value> {
        self.record(sql);
        self.inner.fetch_scalar(sql, params)
    }

    fn execute(&self, sql: &str, params: &[(String, Value)]) -> DbResult<usize> {
        self.record(sql);
        self.inner.execute(sql, params)
    }

    fn exec(&self, sql: &str) -> DbResult<usize> {
        self.record(sql);
        self.inner.exec(sql)
    }

    fn last_insert_id(&self) -> DbResult<Value> {
        self.inner.last_insert_id()
    }
}
