//! Table-bound repository: query construction and save passes.
//!
//! # Responsibility
//! - Map one record schema onto a physical table and id column.
//! - Build SELECT / WHERE / HAVING SQL and run reads through the paginator.
//! - Decide insert, update or delete per record from its state.
//!
//! # Invariants
//! - Table, database and id column are resolved at construction.
//! - Only writable (physical, non read-only) fields are ever written.
//! - A save pass clears the dirty state of every record it wrote.
//! - Deletes of a set pass go out as one batched statement after all
//!   inserts and updates.

use crate::db::{Params, Store};
use crate::error::{ModelError, ModelResult};
use crate::model::record::Record;
use crate::model::record_set::RecordSet;
use crate::model::schema::RecordSchema;
use crate::model::value::Value;
use crate::model::RawRow;
use crate::query::paginator::Paginator;
use crate::query::search::{FilterBuilder, QueryFilter, SearchParams, SearchTypes};
use crate::query::sort::Sort;
use crate::query::sql::{quote_identifier, quote_literal, Placeholders};
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// Physical mapping of a repository; the id column falls back to the schema's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub db_name: Option<String>,
    pub table_name: Option<String>,
    pub id_column: Option<String>,
}

impl RepositoryConfig {
    pub fn new(db_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            db_name: Some(db_name.into()),
            table_name: Some(table_name.into()),
            id_column: None,
        }
    }

    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = Some(id_column.into());
        self
    }
}

/// Counts of statements issued by one save pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

pub struct Repository<'s> {
    schema: Arc<RecordSchema>,
    db_name: String,
    table_name: String,
    id_column: String,
    store: Option<&'s dyn Store>,
    paginator: Paginator,
}

impl<'s> Repository<'s> {
    /// Resolves the physical mapping for `schema`.
    ///
    /// # Errors
    /// - `Config` when the database name, table name or id column is missing.
    pub fn try_new(schema: Arc<RecordSchema>, config: RepositoryConfig) -> ModelResult<Self> {
        let db_name = required(config.db_name, "Database name not set")?;
        let table_name = required(config.table_name, "Table name not set")?;
        let id_column = required(
            config
                .id_column
                .or_else(|| schema.id_column().map(str::to_string)),
            "Table ID field not set",
        )?;

        Ok(Self {
            schema,
            db_name,
            table_name,
            id_column,
            store: None,
            paginator: Paginator::new(),
        })
    }

    pub fn with_store(mut self, store: &'s dyn Store) -> Self {
        self.store = Some(store);
        self
    }

    pub fn set_store(&mut self, store: &'s dyn Store) -> &mut Self {
        self.store = Some(store);
        self
    }

    /// Replaces the paginator, keeping its sort and page settings.
    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = paginator;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.paginator.set_sort(Some(sort));
        self
    }

    pub fn set_sort(&mut self, sort: Option<Sort>) -> &mut Self {
        self.paginator.set_sort(sort);
        self
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    pub fn paginator_mut(&mut self) -> &mut Paginator {
        &mut self.paginator
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Comma-separated select list of every non-computed field.
    ///
    /// The identity field is aliased from the id column when the names differ.
    pub fn field_list(&self) -> String {
        let id_field = self.schema.id_field();
        self.schema
            .fields()
            .iter()
            .filter(|def| !self.schema.is_computed(&def.name))
            .map(|def| {
                if def.name == id_field && self.id_column != id_field {
                    format!(
                        "{} AS {}",
                        quote_identifier(&self.id_column),
                        quote_identifier(id_field)
                    )
                } else {
                    quote_identifier(&def.name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn build_select(&self, field_list: &str, table: &str) -> String {
        format!("SELECT {field_list} FROM {}", quote_identifier(table))
    }

    pub fn default_select_sql(&self) -> String {
        self.build_select(&self.field_list(), &self.table_name)
    }

    /// Compiles a filter against this repository's table.
    ///
    /// IN-list literals use the store's quoting when a store is attached.
    pub fn build_where_and_having(
        &self,
        params: &SearchParams,
        types: &SearchTypes,
    ) -> ModelResult<QueryFilter> {
        let builder = FilterBuilder::new(&self.schema, &self.table_name, &self.id_column);
        match self.store {
            Some(store) => builder.build(params, types, |value| store.quote(value)),
            None => builder.build(params, types, quote_literal),
        }
    }

    /// Loads one record by identity, bypassing the paginator.
    pub fn get_with_id(&self, id: impl Into<Value>) -> ModelResult<Option<Record>> {
        let sql = format!(
            "{} WHERE {}.{} = :id",
            self.default_select_sql(),
            quote_identifier(&self.table_name),
            quote_identifier(&self.id_column)
        );
        let params = vec![(":id".to_string(), id.into())];
        let row = self.store()?.fetch_one(&sql, &params)?;
        Ok(row.map(|row| Record::from_row(Arc::clone(&self.schema), row)))
    }

    /// First record matching `params` on the current page, if any.
    pub fn get_one_with_params(
        &mut self,
        params: &SearchParams,
        types: &SearchTypes,
    ) -> ModelResult<Option<Record>> {
        let mut set = self.get_set_with_params(params, types)?;
        let first = set.indexes().into_iter().next();
        Ok(first.and_then(|index| set.take(index)))
    }

    pub fn get_all(&mut self) -> ModelResult<RecordSet> {
        let sql = self.default_select_sql();
        let rows = self.get_data(&sql, Params::new())?;
        Ok(self.set_with_rows(rows))
    }

    pub fn get_set_with_params(
        &mut self,
        params: &SearchParams,
        types: &SearchTypes,
    ) -> ModelResult<RecordSet> {
        let rows = self.get_data_with_params(params, types, None)?;
        Ok(self.set_with_rows(rows))
    }

    /// Raw rows matching `params`, optionally over a caller-supplied
    /// `SELECT ... FROM ...` instead of the default one.
    pub fn get_data_with_params(
        &mut self,
        params: &SearchParams,
        types: &SearchTypes,
        select_sql: Option<&str>,
    ) -> ModelResult<Vec<RawRow>> {
        let filter = self.build_where_and_having(params, types)?;
        let mut sql = select_sql.map_or_else(|| self.default_select_sql(), str::to_string);
        if !filter.is_empty() {
            sql.push(' ');
            sql.push_str(&filter.clauses());
        }
        self.get_data(&sql, filter.params)
    }

    /// Runs arbitrary SQL through the paginator and returns the page rows.
    pub fn get_data(&mut self, sql: &str, params: Params) -> ModelResult<Vec<RawRow>> {
        let store = self.store()?;
        self.paginator
            .set_target(self.db_name.as_str())
            .set_sql(sql)
            .set_params(params);
        Ok(self.paginator.items(store)?.to_vec())
    }

    pub fn set_with_rows(&self, rows: Vec<RawRow>) -> RecordSet {
        RecordSet::from_rows(Arc::clone(&self.schema), rows)
    }

    /// Persists one record according to its state.
    ///
    /// Deletion wins over insert and update. A record marked for deletion
    /// that was never stored is left alone.
    ///
    /// # Errors
    /// - `TypeMismatch` when `record` belongs to another schema.
    /// - `Db` when the store rejects a statement.
    pub fn save(&self, record: &mut Record) -> ModelResult<SaveSummary> {
        self.check_type(record.schema())?;
        let mut summary = SaveSummary::default();

        if record.is_marked_for_deletion() {
            if !record.is_temp() {
                summary.deleted = self.delete_ids(&[record.id()?.clone()])?;
            }
            record.mark_for_deletion(false);
            record.clear_original_values();
        } else if record.is_temp() {
            self.insert(record)?;
            summary.inserted = 1;
        } else if record.is_dirty() {
            self.update(record)?;
            summary.updated = 1;
        }
        Ok(summary)
    }

    /// Persists every materialized record of `set`; raw slots are untouched.
    ///
    /// Statements already issued are not rolled back when a later one fails.
    pub fn save_set(&self, set: &mut RecordSet) -> ModelResult<SaveSummary> {
        self.check_type(set.schema())?;
        let started_at = Instant::now();
        let mut summary = SaveSummary::default();
        let mut ids_to_delete = Vec::new();

        for record in set.materialized_mut() {
            if record.is_marked_for_deletion() {
                if !record.is_temp() {
                    ids_to_delete.push(record.id()?.clone());
                }
            } else if record.is_temp() {
                self.insert(record)?;
                summary.inserted += 1;
            } else if record.is_dirty() {
                self.update(record)?;
                summary.updated += 1;
            }
        }

        if !ids_to_delete.is_empty() {
            summary.deleted = self.delete_ids(&ids_to_delete)?;
        }
        for record in set.materialized_mut() {
            if record.is_marked_for_deletion() {
                record.mark_for_deletion(false);
                record.clear_original_values();
            }
        }

        info!(
            "event=record_set_save module=repo status=ok table={} inserted={} updated={} deleted={} duration_ms={}",
            self.table_name,
            summary.inserted,
            summary.updated,
            summary.deleted,
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }

    fn insert(&self, record: &mut Record) -> ModelResult<()> {
        let started_at = Instant::now();
        let id_field = self.schema.id_field();
        let policy = self.schema.temp_identity();

        let mut columns = Vec::new();
        let mut names = Placeholders::default();
        let mut params = Params::new();
        for (field, sql_value) in record.sql_values()? {
            if !self.schema.is_writable(&field) || sql_value.is_null() {
                continue;
            }
            let column = if field == id_field {
                if policy.is_unassigned(&sql_value) {
                    continue;
                }
                self.id_column.clone()
            } else {
                field
            };
            let name = names.claim(&column);
            columns.push((quote_identifier(&column), name.clone()));
            params.push((name, sql_value));
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(&self.table_name))
        } else {
            let (quoted, placeholders): (Vec<String>, Vec<String>) = columns.into_iter().unzip();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(&self.table_name),
                quoted.join(", "),
                placeholders.join(", ")
            )
        };

        let result = self.store().and_then(|store| {
            store.execute(&sql, &params)?;
            if record.is_temp() {
                record.assign_identity(store.last_insert_id()?)?;
            }
            Ok(())
        });
        self.log_write("record_insert", started_at, &result);
        result?;

        record.clear_original_values();
        Ok(())
    }

    fn update(&self, record: &mut Record) -> ModelResult<()> {
        let started_at = Instant::now();
        let id_field = self.schema.id_field();

        let mut assignments = Vec::new();
        let mut names = Placeholders::default();
        let mut params = Params::new();
        for (field, sql_value) in record.changed_sql_values()? {
            if !self.schema.is_writable(&field) {
                continue;
            }
            let column = if field == id_field {
                self.id_column.clone()
            } else {
                field
            };
            let name = names.claim(&column);
            assignments.push(format!("{} = {name}", quote_identifier(&column)));
            params.push((name, sql_value));
        }

        if assignments.is_empty() {
            record.clear_original_values();
            return Ok(());
        }

        // Scope by the stored identity, which differs when the id itself changed.
        let stored_id = match record.original_values().get(id_field) {
            Some(original) => self.schema.field_kind(id_field)?.sql_value(original),
            None => self.schema.field_kind(id_field)?.sql_value(record.id()?),
        };
        let id_name = names.claim("_id");
        params.push((id_name.clone(), stored_id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {id_name}",
            quote_identifier(&self.table_name),
            assignments.join(", "),
            quote_identifier(&self.id_column)
        );

        let result = self
            .store()
            .and_then(|store| Ok(store.execute(&sql, &params)?));
        self.log_write("record_update", started_at, &result);
        result?;

        record.clear_original_values();
        Ok(())
    }

    /// Deletes rows by identity in one unprepared statement.
    fn delete_ids(&self, ids: &[Value]) -> ModelResult<usize> {
        let started_at = Instant::now();
        let result = self.store().and_then(|store| {
            let quoted: Vec<String> = ids.iter().map(|id| store.quote(id)).collect();
            let sql = format!(
                "DELETE FROM {} WHERE {} IN ({})",
                quote_identifier(&self.table_name),
                quote_identifier(&self.id_column),
                quoted.join(", ")
            );
            Ok(store.exec(&sql)?)
        });
        self.log_write("record_delete", started_at, &result);
        result
    }

    fn store(&self) -> ModelResult<&'s dyn Store> {
        self.store
            .ok_or_else(|| ModelError::config("database connection not set"))
    }

    fn check_type(&self, schema: &RecordSchema) -> ModelResult<()> {
        if schema.name() != self.schema.name() {
            return Err(ModelError::TypeMismatch {
                expected: self.schema.name().to_string(),
                found: schema.name().to_string(),
            });
        }
        Ok(())
    }

    fn log_write<T>(&self, event: &str, started_at: Instant, result: &ModelResult<T>) {
        match result {
            Ok(_) => info!(
                "event={event} module=repo status=ok table={} duration_ms={}",
                self.table_name,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event={event} module=repo status=error table={} duration_ms={} error={}",
                self.table_name,
                started_at.elapsed().as_millis(),
                err
            ),
        }
    }
}

fn required(value: Option<String>, message: &str) -> ModelResult<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ModelError::config(message))
}
