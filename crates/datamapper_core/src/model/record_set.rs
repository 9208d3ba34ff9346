//! Ordered, lazily materializing collection of records.
//!
//! # Responsibility
//! - Keep raw rows until a caller actually touches them.
//! - Provide indexed access, replacement, removal and a restartable cursor.
//!
//! # Invariants
//! - Iteration follows ascending slot index.
//! - A raw slot is converted into a `Record` at most once and then stays
//!   in place, so repeated reads see the same instance.
//! - Every record stored in the set shares the set's schema.

use crate::error::{ModelError, ModelResult};
use crate::model::record::Record;
use crate::model::schema::RecordSchema;
use crate::model::value::Value;
use crate::model::RawRow;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Raw row until first access, then the record built from it.
#[derive(Debug, Clone)]
struct Slot {
    raw: RawRow,
    record: Option<Box<Record>>,
}

impl Slot {
    fn raw(row: RawRow) -> Self {
        Self {
            raw: row,
            record: None,
        }
    }

    fn record(record: Record) -> Self {
        Self {
            raw: RawRow::new(),
            record: Some(Box::new(record)),
        }
    }

    fn materialize(&mut self, schema: &Arc<RecordSchema>) -> &mut Record {
        let raw = &mut self.raw;
        self.record
            .get_or_insert_with(|| {
                Box::new(Record::from_row(Arc::clone(schema), std::mem::take(raw)))
            })
            .as_mut()
    }
}

/// Collection of records of one schema, keyed by integer position.
#[derive(Debug, Clone)]
pub struct RecordSet {
    schema: Arc<RecordSchema>,
    slots: BTreeMap<usize, Slot>,
    cursor: Option<usize>,
}

impl RecordSet {
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        Self {
            schema,
            slots: BTreeMap::new(),
            cursor: None,
        }
    }

    /// Wraps fetched rows at positions `0..rows.len()` without materializing them.
    pub fn from_rows(schema: Arc<RecordSchema>, rows: Vec<RawRow>) -> Self {
        let slots: BTreeMap<usize, Slot> =
            rows.into_iter().map(Slot::raw).enumerate().collect();
        let cursor = slots.keys().next().copied();
        Self {
            schema,
            slots,
            cursor,
        }
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.slots.contains_key(&index)
    }

    /// Slot indexes in iteration order.
    pub fn indexes(&self) -> Vec<usize> {
        self.slots.keys().copied().collect()
    }

    pub fn is_materialized(&self, index: usize) -> bool {
        self.slots
            .get(&index)
            .is_some_and(|slot| slot.record.is_some())
    }

    /// Rows of slots that were never read, keyed by index.
    pub fn raw_rows(&self) -> BTreeMap<usize, &RawRow> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.record.is_none())
            .map(|(index, slot)| (*index, &slot.raw))
            .collect()
    }

    /// Returns the record at `index`, materializing it on first access.
    pub fn get(&mut self, index: usize) -> ModelResult<&mut Record> {
        let schema = &self.schema;
        self.slots
            .get_mut(&index)
            .map(|slot| slot.materialize(schema))
            .ok_or(ModelError::Bounds(index))
    }

    /// Stores `record` at `index`, replacing whatever was there.
    pub fn set(&mut self, index: usize, record: Record) -> ModelResult<()> {
        self.check_schema(&record)?;
        self.slots.insert(index, Slot::record(record));
        Ok(())
    }

    /// Appends after the highest index and returns the new index.
    pub fn append(&mut self, record: Record) -> ModelResult<usize> {
        self.check_schema(&record)?;
        let index = self.next_index();
        self.slots.insert(index, Slot::record(record));
        Ok(index)
    }

    /// Removes the slot at `index`; returns whether one existed.
    pub fn remove(&mut self, index: usize) -> bool {
        self.slots.remove(&index).is_some()
    }

    /// Removes the slot at `index` and returns it as a record.
    pub fn take(&mut self, index: usize) -> Option<Record> {
        let slot = self.slots.remove(&index)?;
        Some(match slot.record {
            Some(record) => *record,
            None => Record::from_row(Arc::clone(&self.schema), slot.raw),
        })
    }

    /// Appends a blank record and returns it for editing.
    pub fn create_record(&mut self) -> &mut Record {
        let index = self.next_index();
        let record = Record::new(Arc::clone(&self.schema));
        self.slots
            .entry(index)
            .or_insert(Slot::record(record))
            .materialize(&self.schema)
    }

    pub fn mark_all_for_deletion(&mut self) {
        for (_, record) in self.iter_mut() {
            record.mark_for_deletion(true);
        }
    }

    /// Materializes every slot and yields `(index, record)` pairs in order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Record)> + '_ {
        let schema = &self.schema;
        self.slots
            .iter_mut()
            .map(move |(index, slot)| (*index, slot.materialize(schema)))
    }

    /// Records that were already materialized; raw slots are skipped.
    pub fn materialized_mut(&mut self) -> impl Iterator<Item = &mut Record> + '_ {
        self.slots
            .values_mut()
            .filter_map(|slot| slot.record.as_deref_mut())
    }

    /// Values of one field across the set, in order.
    pub fn column(&mut self, field: &str) -> ModelResult<Vec<Value>> {
        self.schema.field_kind(field)?;
        self.iter_mut()
            .map(|(_, record)| record.get(field).cloned())
            .collect()
    }

    /// `(key, value)` pairs of two fields across the set, in order.
    pub fn pairs(
        &mut self,
        key_field: &str,
        value_field: &str,
    ) -> ModelResult<Vec<(Value, Value)>> {
        self.schema.field_kind(key_field)?;
        self.schema.field_kind(value_field)?;
        self.iter_mut()
            .map(|(_, record)| {
                Ok((
                    record.get(key_field)?.clone(),
                    record.get(value_field)?.clone(),
                ))
            })
            .collect()
    }

    /// Moves the cursor to the first slot.
    pub fn rewind(&mut self) {
        self.cursor = self.slots.keys().next().copied();
    }

    /// Moves the cursor to `index`.
    ///
    /// # Errors
    /// - `Bounds` when no slot exists at `index`; the cursor is unchanged.
    pub fn seek(&mut self, index: usize) -> ModelResult<()> {
        if !self.slots.contains_key(&index) {
            return Err(ModelError::Bounds(index));
        }
        self.cursor = Some(index);
        Ok(())
    }

    pub fn valid(&self) -> bool {
        self.cursor
            .is_some_and(|index| self.slots.contains_key(&index))
    }

    pub fn key(&self) -> Option<usize> {
        self.cursor.filter(|index| self.slots.contains_key(index))
    }

    /// Record under the cursor, materialized on demand.
    pub fn current(&mut self) -> Option<&mut Record> {
        let index = self.key()?;
        self.get(index).ok()
    }

    /// Moves the cursor to the next slot after the current position.
    pub fn advance(&mut self) {
        self.cursor = self.cursor.and_then(|index| {
            self.slots
                .range(index + 1..)
                .next()
                .map(|(next, _)| *next)
        });
    }

    fn next_index(&self) -> usize {
        self.slots.keys().next_back().map_or(0, |last| last + 1)
    }

    fn check_schema(&self, record: &Record) -> ModelResult<()> {
        if record.schema().name() != self.schema.name() {
            return Err(ModelError::TypeMismatch {
                expected: self.schema.name().to_string(),
                found: record.schema().name().to_string(),
            });
        }
        Ok(())
    }
}
