//! Record type declarations.
//!
//! # Responsibility
//! - Describe one record type: identity, ordered fields, subsets, defaults
//!   and validation rules.
//! - Reject inconsistent declarations when the schema is built.
//!
//! # Invariants
//! - The identity field is always a declared field and never has a default.
//! - Every name used by a subset, default or rule list is a declared field.
//! - Aggregate fields are computed fields: they are never physical columns.

use crate::error::{ModelError, ModelResult};
use crate::model::field::FieldKind;
use crate::model::validation::RuleSpec;
use crate::model::value::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Logical name of the identity field when none is declared.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Which identity values mark a record as not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempIdentity {
    /// Null, `0`, `""`, `"0"` and `false` all count as "no identity".
    #[default]
    Falsy,
    /// Only an absent or null identity counts; `0` is a real id.
    NullOnly,
}

impl TempIdentity {
    pub fn is_unassigned(self, value: &Value) -> bool {
        match self {
            Self::Falsy => !value.is_truthy(),
            Self::NullOnly => value.is_null(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// Immutable declaration of a record type, shared between records via `Arc`.
#[derive(Debug)]
pub struct RecordSchema {
    name: String,
    id_field: String,
    id_column: Option<String>,
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
    read_only: BTreeSet<String>,
    computed: BTreeSet<String>,
    aggregate: BTreeSet<String>,
    defaults: HashMap<String, Value>,
    rules: Vec<(String, Vec<RuleSpec>)>,
    temp_identity: TempIdentity,
}

impl RecordSchema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Type name used for type checks between records, sets and repositories.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Physical id column, when the declaration carries one.
    pub fn id_column(&self) -> Option<&str> {
        self.id_column.as_deref()
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn field_kind(&self, name: &str) -> ModelResult<FieldKind> {
        self.position(name).map(|position| self.fields[position].kind)
    }

    /// Declaration-order position of `name`; unknown names are config errors.
    pub(crate) fn position(&self, name: &str) -> ModelResult<usize> {
        self.index.get(name).copied().ok_or_else(|| {
            ModelError::config(format!("field '{name}' not defined on {}", self.name))
        })
    }

    pub fn is_read_only(&self, name: &str) -> bool {
        self.read_only.contains(name)
    }

    pub fn is_computed(&self, name: &str) -> bool {
        self.computed.contains(name) || self.aggregate.contains(name)
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.aggregate.contains(name)
    }

    /// Declared field that maps onto a column of the primary table.
    pub fn is_physical(&self, name: &str) -> bool {
        self.has_field(name) && !self.is_computed(name)
    }

    /// Physical field that save passes may write.
    pub fn is_writable(&self, name: &str) -> bool {
        self.is_physical(name) && !self.is_read_only(name)
    }

    pub fn default_for(&self, name: &str) -> Option<&Value> {
        self.defaults.get(name)
    }

    /// Rule chains in declaration order.
    pub fn rules(&self) -> &[(String, Vec<RuleSpec>)] {
        &self.rules
    }

    pub fn temp_identity(&self) -> TempIdentity {
        self.temp_identity
    }
}

/// Validating builder for [`RecordSchema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    id_field: String,
    id_column: Option<String>,
    fields: Vec<FieldDef>,
    read_only: BTreeSet<String>,
    computed: BTreeSet<String>,
    aggregate: BTreeSet<String>,
    defaults: Vec<(String, Value)>,
    rules: Vec<(String, Vec<RuleSpec>)>,
    temp_identity: TempIdentity,
}

impl SchemaBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            id_column: None,
            fields: Vec::new(),
            read_only: BTreeSet::new(),
            computed: BTreeSet::new(),
            aggregate: BTreeSet::new(),
            defaults: Vec::new(),
            rules: Vec::new(),
            temp_identity: TempIdentity::default(),
        }
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = name.into();
        self
    }

    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn read_only(mut self, name: impl Into<String>) -> Self {
        self.read_only.insert(name.into());
        self
    }

    /// Marks a field as produced by the SELECT rather than stored in the table.
    pub fn computed(mut self, name: impl Into<String>) -> Self {
        self.computed.insert(name.into());
        self
    }

    /// Marks a field as an aggregate, filtered through HAVING.
    pub fn aggregate(mut self, name: impl Into<String>) -> Self {
        self.aggregate.insert(name.into());
        self
    }

    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.push((name.into(), value.into()));
        self
    }

    pub fn rule(mut self, name: impl Into<String>, rule: impl Into<RuleSpec>) -> Self {
        let name = name.into();
        let rule = rule.into();
        match self.rules.iter_mut().find(|(field, _)| *field == name) {
            Some((_, chain)) => chain.push(rule),
            None => self.rules.push((name, vec![rule])),
        }
        self
    }

    pub fn temp_identity(mut self, policy: TempIdentity) -> Self {
        self.temp_identity = policy;
        self
    }

    pub fn build(self) -> ModelResult<Arc<RecordSchema>> {
        let mut index = HashMap::with_capacity(self.fields.len());
        for (position, field) in self.fields.iter().enumerate() {
            if index.insert(field.name.clone(), position).is_some() {
                return Err(ModelError::config(format!(
                    "field '{}' declared twice on {}",
                    field.name, self.name
                )));
            }
        }

        if !index.contains_key(&self.id_field) {
            return Err(ModelError::config(format!(
                "identity field '{}' not declared on {}",
                self.id_field, self.name
            )));
        }

        let subsets = [
            ("read-only", &self.read_only),
            ("computed", &self.computed),
            ("aggregate", &self.aggregate),
        ];
        for (label, subset) in subsets {
            if let Some(unknown) = subset.iter().find(|name| !index.contains_key(*name)) {
                return Err(ModelError::config(format!(
                    "{label} field '{unknown}' not declared on {}",
                    self.name
                )));
            }
        }
        if self.aggregate.contains(&self.id_field) || self.computed.contains(&self.id_field) {
            return Err(ModelError::config(format!(
                "identity field '{}' cannot be computed",
                self.id_field
            )));
        }

        let mut defaults = HashMap::with_capacity(self.defaults.len());
        for (name, value) in self.defaults {
            if name == self.id_field {
                return Err(ModelError::config(
                    "cannot set a default identity, omit it from defaults",
                ));
            }
            let Some(position) = index.get(&name) else {
                return Err(ModelError::config(format!(
                    "default for undeclared field '{name}' on {}",
                    self.name
                )));
            };
            let coerced = self.fields[*position].kind.coerce(value).map_err(|message| {
                ModelError::config(format!("default for '{name}' {message}"))
            })?;
            defaults.insert(name, coerced);
        }

        if let Some((unknown, _)) = self
            .rules
            .iter()
            .find(|(name, _)| !index.contains_key(name))
        {
            return Err(ModelError::config(format!(
                "rules for undeclared field '{unknown}' on {}",
                self.name
            )));
        }

        Ok(Arc::new(RecordSchema {
            name: self.name,
            id_field: self.id_field,
            id_column: self.id_column,
            fields: self.fields,
            index,
            read_only: self.read_only,
            computed: self.computed,
            aggregate: self.aggregate,
            defaults,
            rules: self.rules,
            temp_identity: self.temp_identity,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::RecordSchema;
    use crate::error::ModelError;
    use crate::model::field::FieldKind;

    #[test]
    fn identity_default_is_rejected() {
        let err = RecordSchema::builder("User")
            .field("id", FieldKind::Integer)
            .default_value("id", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::Config(message) if message.contains("default identity")));
    }

    #[test]
    fn undeclared_identity_is_rejected() {
        let err = RecordSchema::builder("User")
            .field("name", FieldKind::Varchar)
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn aggregate_fields_are_not_physical() {
        let schema = RecordSchema::builder("User")
            .field("id", FieldKind::Integer)
            .field("petCount", FieldKind::Integer)
            .aggregate("petCount")
            .build()
            .unwrap();
        assert!(schema.is_aggregate("petCount"));
        assert!(!schema.is_physical("petCount"));
        assert!(schema.is_writable("id"));
    }
}
