//! Typed record with lazy field materialization and dirty tracking.
//!
//! # Responsibility
//! - Hold raw input per declared field and coerce it on first structured access.
//! - Track the last clean value of every mutated field.
//! - Expose the temp/dirty/delete state consumed by repository save passes.
//!
//! # Invariants
//! - A record is dirty iff `original_values` is non-empty.
//! - Setting a field back to its last clean value removes it from `original_values`.
//! - Any mutation through `set` drops the cached validation verdict.

use crate::error::{ModelError, ModelResult};
use crate::model::field::{Field, FieldKind};
use crate::model::schema::{FieldDef, RecordSchema};
use crate::model::validation::run_chain;
use crate::model::value::Value;
use crate::model::RawRow;
use once_cell::unsync::OnceCell;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Field name → ordered failure messages of the last validation run.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
struct Slot {
    raw: Option<Value>,
    field: OnceCell<Field>,
}

/// One row of a declared record type.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    slots: Vec<Slot>,
    extra: RawRow,
    original_values: BTreeMap<String, Value>,
    marked_for_deletion: bool,
    validation: Option<ValidationErrors>,
}

impl Record {
    /// Creates a blank record; defaults are applied on first access.
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        Self::from_row(schema, RawRow::new())
    }

    /// Wraps raw row data without coercing anything yet.
    ///
    /// Keys that are not declared fields are kept in `raw_data()` untouched.
    pub fn from_row(schema: Arc<RecordSchema>, mut row: RawRow) -> Self {
        let slots = schema
            .fields()
            .iter()
            .map(|def| Slot {
                raw: row.remove(&def.name),
                field: OnceCell::new(),
            })
            .collect();

        Self {
            schema,
            slots,
            extra: row,
            original_values: BTreeMap::new(),
            marked_for_deletion: false,
            validation: None,
        }
    }

    /// Restores a record from the JSON produced by [`Record::to_json`].
    pub fn from_json(schema: Arc<RecordSchema>, json: &str) -> ModelResult<Self> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|err| ModelError::ValidationInput {
                field: schema.name().to_string(),
                value: Value::from(json),
                message: err.to_string(),
            })?;

        // Json fields were written decoded; keep them decoded instead of re-parsing text.
        let row: RawRow = document
            .into_iter()
            .map(|(name, value)| {
                let value = match schema.field_kind(&name) {
                    Ok(FieldKind::Json) if !value.is_null() => Value::Json(value),
                    _ => Value::from_json(value),
                };
                (name, value)
            })
            .collect();
        Ok(Self::from_row(schema, row))
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Input that has not been materialized into fields yet.
    pub fn raw_data(&self) -> RawRow {
        let mut raw = self.extra.clone();
        for (def, slot) in self.schema.fields().iter().zip(&self.slots) {
            if slot.field.get().is_some() {
                continue;
            }
            if let Some(value) = &slot.raw {
                raw.insert(def.name.clone(), value.clone());
            }
        }
        raw
    }

    pub fn is_materialized(&self, name: &str) -> ModelResult<bool> {
        let position = self.schema.position(name)?;
        Ok(self.slots[position].field.get().is_some())
    }

    pub fn get(&self, name: &str) -> ModelResult<&Value> {
        let position = self.schema.position(name)?;
        Ok(self.field_at(position)?.value())
    }

    pub fn get_i64(&self, name: &str) -> ModelResult<Option<i64>> {
        Ok(self.get(name)?.as_i64())
    }

    pub fn get_f64(&self, name: &str) -> ModelResult<Option<f64>> {
        Ok(self.get(name)?.as_f64())
    }

    pub fn get_bool(&self, name: &str) -> ModelResult<Option<bool>> {
        Ok(self.get(name)?.as_bool())
    }

    pub fn get_str(&self, name: &str) -> ModelResult<Option<&str>> {
        Ok(self.get(name)?.as_str())
    }

    /// Coerces and assigns `raw`, updating dirty state.
    ///
    /// # Errors
    /// - `Config` when `name` is not declared.
    /// - `ValidationInput` when coercion fails; the previous value is kept.
    pub fn set(&mut self, name: &str, raw: impl Into<Value>) -> ModelResult<()> {
        let position = self.schema.position(name)?;
        let current = self.field_at(position)?.value().clone();
        let clean = self
            .original_values
            .get(name)
            .cloned()
            .unwrap_or(current);

        self.field_at_mut(position)?.set_value(raw.into())?;
        self.validation = None;

        if *self.field_at(position)?.value() == clean {
            self.original_values.remove(name);
        } else {
            self.original_values.insert(name.to_string(), clean);
        }
        Ok(())
    }

    pub fn id(&self) -> ModelResult<&Value> {
        self.get(self.schema.id_field())
    }

    /// Assigns a store-generated identity.
    pub fn assign_identity(&mut self, id: impl Into<Value>) -> ModelResult<()> {
        let id_field = self.schema.id_field().to_string();
        self.set(&id_field, id)
    }

    /// Logical values of every declared field, in declaration order.
    pub fn values(&self) -> ModelResult<Vec<(String, Value)>> {
        self.collect_fields(|_, field| field.value().clone())
    }

    /// Storage representation of every declared field, in declaration order.
    pub fn sql_values(&self) -> ModelResult<Vec<(String, Value)>> {
        self.collect_fields(|_, field| field.sql_value())
    }

    /// Storage representation of fields changed since the last clean state.
    pub fn changed_sql_values(&self) -> ModelResult<Vec<(String, Value)>> {
        let mut changed = Vec::with_capacity(self.original_values.len());
        for (position, def) in self.schema.fields().iter().enumerate() {
            if self.original_values.contains_key(&def.name) {
                changed.push((def.name.clone(), self.field_at(position)?.sql_value()));
            }
        }
        Ok(changed)
    }

    /// Last clean value of every field edited since then.
    pub fn original_values(&self) -> &BTreeMap<String, Value> {
        &self.original_values
    }

    pub fn clear_original_values(&mut self) {
        self.original_values.clear();
    }

    /// Whether the record has no identity yet and therefore needs an insert.
    pub fn is_temp(&self) -> bool {
        let Ok(position) = self.schema.position(self.schema.id_field()) else {
            return true;
        };
        let slot = &self.slots[position];
        let policy = self.schema.temp_identity();
        match (slot.field.get(), &slot.raw) {
            (Some(field), _) => policy.is_unassigned(field.value()),
            (None, Some(raw)) => policy.is_unassigned(raw),
            (None, None) => true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.original_values.is_empty()
    }

    pub fn mark_for_deletion(&mut self, flag: bool) {
        self.marked_for_deletion = flag;
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion
    }

    /// Runs every declared rule chain and caches the verdict.
    pub fn validate(&mut self) -> ModelResult<()> {
        let mut errors = ValidationErrors::new();
        for (name, chain) in self.schema.rules() {
            let messages = run_chain(chain, self.get(name)?);
            if !messages.is_empty() {
                errors.insert(name.clone(), messages);
            }
        }
        self.validation = Some(errors);
        Ok(())
    }

    /// Cached validity, validating first if no verdict is cached.
    pub fn is_valid(&mut self) -> ModelResult<bool> {
        if self.validation.is_none() {
            self.validate()?;
        }
        Ok(self.validation.as_ref().is_some_and(|errors| errors.is_empty()))
    }

    /// # Errors
    /// - `State` when no validation ran since construction or the last mutation.
    pub fn validation_errors(&self) -> ModelResult<&ValidationErrors> {
        self.validation
            .as_ref()
            .ok_or_else(|| ModelError::state("record not validated"))
    }

    /// JSON object of logical values in declaration order.
    pub fn to_json(&self) -> ModelResult<String> {
        let values = self.values()?;
        serde_json::to_string(&OrderedValues(&values)).map_err(|err| {
            ModelError::state(format!("cannot encode {}: {err}", self.schema.name()))
        })
    }

    fn field_at(&self, position: usize) -> ModelResult<&Field> {
        let def = &self.schema.fields()[position];
        let slot = &self.slots[position];
        slot.field
            .get_or_try_init(|| materialize(def, slot.raw.clone(), &self.schema))
    }

    fn field_at_mut(&mut self, position: usize) -> ModelResult<&mut Field> {
        self.field_at(position)?;
        let name = &self.schema.fields()[position].name;
        self.slots[position]
            .field
            .get_mut()
            .ok_or_else(|| ModelError::state(format!("field '{name}' not materialized")))
    }

    fn collect_fields<F>(&self, project: F) -> ModelResult<Vec<(String, Value)>>
    where
        F: Fn(&FieldDef, &Field) -> Value,
    {
        let mut out = Vec::with_capacity(self.slots.len());
        for (position, def) in self.schema.fields().iter().enumerate() {
            let field = self.field_at(position)?;
            out.push((def.name.clone(), project(def, field)));
        }
        Ok(out)
    }
}

fn materialize(def: &FieldDef, raw: Option<Value>, schema: &RecordSchema) -> ModelResult<Field> {
    let mut field = Field::new(def.name.clone(), def.kind);
    match raw {
        Some(raw) => field.set_value(raw)?,
        None => {
            if let Some(default) = schema.default_for(&def.name) {
                field.set_value(default.clone())?;
            }
        }
    }
    Ok(field)
}

struct OrderedValues<'a>(&'a [(String, Value)]);

impl Serialize for OrderedValues<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let json = self.to_json().map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}
