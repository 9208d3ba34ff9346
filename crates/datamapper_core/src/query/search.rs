//! Parameter-map filters compiled into WHERE / GROUP BY / HAVING clauses.
//!
//! # Responsibility
//! - Resolve parameter keys to quoted column references.
//! - Emit one predicate per key with bound values or store-quoted IN lists.
//!
//! # Invariants
//! - Aggregate fields only ever appear in HAVING.
//! - Placeholders are unique within one filter.
//! - Predicates follow parameter insertion order.
//! - Boolean and datetime values of declared fields are compared in their
//!   stored form (`y`/`n`, datetime text).

use crate::db::Params;
use crate::error::{ModelError, ModelResult};
use crate::model::field::FieldKind;
use crate::model::schema::RecordSchema;
use crate::model::value::Value;
use crate::query::sql::{quote_identifier, Placeholders};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchOperator {
    #[default]
    Equals,
    Starts,
    Ends,
    Contains,
    Greater,
    GreaterOrEquals,
    Less,
    LessOrEquals,
}

impl SearchOperator {
    pub fn name(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Starts => "starts",
            Self::Ends => "ends",
            Self::Contains => "contains",
            Self::Greater => "greater",
            Self::GreaterOrEquals => "greater or equals",
            Self::Less => "less",
            Self::LessOrEquals => "less or equals",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::Starts | Self::Ends | Self::Contains => "LIKE",
            Self::Greater => ">",
            Self::GreaterOrEquals => ">=",
            Self::Less => "<",
            Self::LessOrEquals => "<=",
        }
    }

    /// Bound value for `value`, with `%` wildcards placed for LIKE operators.
    fn operand(self, value: &Value) -> Value {
        match self {
            Self::Starts => Value::Text(format!("{}%", value.to_text())),
            Self::Ends => Value::Text(format!("%{}", value.to_text())),
            Self::Contains => Value::Text(format!("%{}%", value.to_text())),
            _ => value.clone(),
        }
    }
}

impl FromStr for SearchOperator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Self::Equals),
            "starts" => Ok(Self::Starts),
            "ends" => Ok(Self::Ends),
            "contains" => Ok(Self::Contains),
            "greater" => Ok(Self::Greater),
            "greater or equals" => Ok(Self::GreaterOrEquals),
            "less" => Ok(Self::Less),
            "less or equals" => Ok(Self::LessOrEquals),
            other => Err(ModelError::config(format!(
                "Unsupported search type '{other}'"
            ))),
        }
    }
}

impl Display for SearchOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Filter value: a single scalar or a list matched with `IN`.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchValue {
    Scalar(Value),
    List(Vec<Value>),
}

impl From<Value> for SearchValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<Value>> for SearchValue {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

/// Insertion-ordered filter parameters keyed by field or `table.column`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    entries: Vec<(String, SearchValue)>,
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `key`, keeping its original position on replace.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, SearchValue::Scalar(value.into()));
        self
    }

    pub fn with_list<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.insert(key, SearchValue::List(values));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: SearchValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SearchValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-key operator names; keys without an entry compare with `equals`.
///
/// Names are resolved when a filter is built, so an unknown name surfaces
/// as a `Config` error from the query that uses it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTypes {
    operators: BTreeMap<String, String>,
}

impl SearchTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, operator: impl Into<String>) -> Self {
        self.operators.insert(key.into(), operator.into());
        self
    }

    pub fn with_operator(self, key: impl Into<String>, operator: SearchOperator) -> Self {
        self.with(key, operator.name())
    }

    pub fn operator(&self, key: &str) -> ModelResult<SearchOperator> {
        self.operators
            .get(key)
            .map_or(Ok(SearchOperator::Equals), |name| name.parse())
    }
}

/// Compiled filter clauses and their bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    /// WHERE conditions joined with `AND`, without the keyword.
    pub where_sql: String,
    /// `GROUP BY` clause, present only when `having_sql` is.
    pub group_by_sql: String,
    /// HAVING conditions joined with `AND`, without the keyword.
    pub having_sql: String,
    pub params: Params,
}

impl QueryFilter {
    pub fn is_empty(&self) -> bool {
        self.where_sql.is_empty() && self.having_sql.is_empty()
    }

    /// Clause text to append after `FROM`, e.g. `WHERE ... GROUP BY ... HAVING ...`.
    pub fn clauses(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if !self.where_sql.is_empty() {
            parts.push(format!("WHERE {}", self.where_sql));
        }
        if !self.group_by_sql.is_empty() {
            parts.push(self.group_by_sql.clone());
        }
        if !self.having_sql.is_empty() {
            parts.push(format!("HAVING {}", self.having_sql));
        }
        parts.join(" ")
    }
}

/// Filter compiler bound to one record schema and physical table.
#[derive(Debug, Clone, Copy)]
pub struct FilterBuilder<'a> {
    schema: &'a RecordSchema,
    table: &'a str,
    id_column: &'a str,
}

impl<'a> FilterBuilder<'a> {
    pub fn new(schema: &'a RecordSchema, table: &'a str, id_column: &'a str) -> Self {
        Self {
            schema,
            table,
            id_column,
        }
    }

    /// Quoted column reference for a parameter key.
    ///
    /// Dotted keys are taken as already qualified. The identity field and
    /// physical fields are qualified with the table; anything else (computed
    /// columns, aliases) is quoted as given.
    pub fn column_ref(&self, key: &str) -> String {
        if key.contains('.') {
            return quote_identifier(key);
        }
        if key == self.schema.id_field() || key == self.id_column {
            return format!(
                "{}.{}",
                quote_identifier(self.table),
                quote_identifier(self.id_column)
            );
        }
        if self.schema.is_physical(key) {
            return format!("{}.{}", quote_identifier(self.table), quote_identifier(key));
        }
        quote_identifier(key)
    }

    /// Maps logical values of declared fields to what the column holds.
    fn stored_form(&self, key: &str, value: &SearchValue) -> SearchValue {
        let Ok(kind) = self.schema.field_kind(key) else {
            return value.clone();
        };
        let convert = |value: &Value| match (kind, value) {
            (FieldKind::Boolean, Value::Bool(_)) | (FieldKind::Datetime, Value::DateTime(_)) => {
                kind.sql_value(value)
            }
            _ => value.clone(),
        };
        match value {
            SearchValue::Scalar(value) => SearchValue::Scalar(convert(value)),
            SearchValue::List(items) => SearchValue::List(items.iter().map(convert).collect()),
        }
    }

    /// Compiles `params` into WHERE and HAVING clauses.
    ///
    /// `quote` renders IN-list literals; repositories pass their store's quoting.
    ///
    /// # Errors
    /// - `Config` for an unknown operator name.
    /// - `Config` when a list value is paired with an operator other than `equals`.
    pub fn build<Q>(
        &self,
        params: &SearchParams,
        types: &SearchTypes,
        quote: Q,
    ) -> ModelResult<QueryFilter>
    where
        Q: Fn(&Value) -> String,
    {
        let mut where_terms = Vec::new();
        let mut having_terms = Vec::new();
        let mut names = Placeholders::default();
        let mut bound = Params::new();

        for (key, value) in params.iter() {
            let operator = types.operator(key)?;
            let column = self.column_ref(key);
            let value = self.stored_form(key, value);
            let term = predicate(key, &column, &value, operator, &quote, &mut names, &mut bound)?;
            if self.schema.is_aggregate(key) {
                having_terms.push(term);
            } else {
                where_terms.push(term);
            }
        }

        let group_by_sql = if having_terms.is_empty() {
            String::new()
        } else {
            format!(
                "GROUP BY {}.{}",
                quote_identifier(self.table),
                quote_identifier(self.id_column)
            )
        };

        Ok(QueryFilter {
            where_sql: where_terms.join(" AND "),
            group_by_sql,
            having_sql: having_terms.join(" AND "),
            params: bound,
        })
    }
}

enum Operand<'v> {
    Scalar(&'v Value),
    List(&'v [Value]),
}

/// Collapses one-element lists and `[x, null]` pairs into scalars.
///
/// The flag reports whether null must match as well.
fn normalize(value: &SearchValue) -> (Operand<'_>, bool) {
    match value {
        SearchValue::Scalar(value) => (Operand::Scalar(value), false),
        SearchValue::List(items) => match items.as_slice() {
            [single] => (Operand::Scalar(single), false),
            [a, b] if a.is_null() != b.is_null() => {
                let present = if a.is_null() { b } else { a };
                (Operand::Scalar(present), true)
            }
            _ => (Operand::List(items), false),
        },
    }
}

fn predicate<Q>(
    key: &str,
    column: &str,
    value: &SearchValue,
    operator: SearchOperator,
    quote: &Q,
    names: &mut Placeholders,
    bound: &mut Params,
) -> ModelResult<String>
where
    Q: Fn(&Value) -> String,
{
    let (operand, or_null) = normalize(value);
    let term = match operand {
        Operand::List(items) => {
            if operator != SearchOperator::Equals {
                return Err(ModelError::config(format!(
                    "search type '{operator}' cannot take a list for '{key}'"
                )));
            }
            return Ok(in_list(column, items, quote));
        }
        Operand::Scalar(value) if value.is_null() && operator == SearchOperator::Equals => {
            return Ok(format!("{column} IS NULL"));
        }
        Operand::Scalar(value) => {
            let name = names.claim(key);
            let term = format!("{column} {} {name}", operator.symbol());
            bound.push((name, operator.operand(value)));
            term
        }
    };

    if or_null {
        Ok(format!("({term} OR {column} IS NULL)"))
    } else {
        Ok(term)
    }
}

fn in_list<Q>(column: &str, items: &[Value], quote: &Q) -> String
where
    Q: Fn(&Value) -> String,
{
    if items.is_empty() {
        return "0 = 1".to_string();
    }
    let literals: Vec<String> = items
        .iter()
        .filter(|item| !item.is_null())
        .map(quote)
        .collect();
    let has_null = literals.len() < items.len();
    if literals.is_empty() {
        return format!("{column} IS NULL");
    }

    let term = format!("{column} IN ({})", literals.join(","));
    if has_null {
        format!("({term} OR {column} IS NULL)")
    } else {
        term
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterBuilder, SearchOperator, SearchParams, SearchTypes};
    use crate::error::ModelError;
    use crate::model::field::FieldKind;
    use crate::model::schema::RecordSchema;
    use crate::model::value::Value;
    use crate::query::sql::quote_literal;
    use std::sync::Arc;

    fn schema() -> Arc<RecordSchema> {
        RecordSchema::builder("User")
            .id_column("userId")
            .field("id", FieldKind::Integer)
            .field("name", FieldKind::Varchar)
            .field("petCount", FieldKind::Integer)
            .aggregate("petCount")
            .build()
            .unwrap()
    }

    #[test]
    fn operator_names_round_trip() {
        for name in ["equals", "starts", "greater or equals", "less or equals"] {
            let operator: SearchOperator = name.parse().unwrap();
            assert_eq!(operator.name(), name);
        }
        assert!(matches!(
            "between".parse::<SearchOperator>(),
            Err(ModelError::Config(message)) if message == "Unsupported search type 'between'"
        ));
    }

    #[test]
    fn identity_and_fields_are_qualified() {
        let schema = schema();
        let builder = FilterBuilder::new(&schema, "users", "userId");
        assert_eq!(builder.column_ref("id"), "`users`.`userId`");
        assert_eq!(builder.column_ref("name"), "`users`.`name`");
        assert_eq!(builder.column_ref("petCount"), "`petCount`");
        assert_eq!(builder.column_ref("pets.kind"), "`pets`.`kind`");
    }

    #[test]
    fn aggregates_move_to_having_with_group_by() {
        let schema = schema();
        let builder = FilterBuilder::new(&schema, "users", "userId");
        let params = SearchParams::new().with("name", "bob").with("petCount", 2);
        let types = SearchTypes::new().with("petCount", "greater");

        let filter = builder.build(&params, &types, quote_literal).unwrap();
        assert_eq!(filter.where_sql, "`users`.`name` = :name");
        assert_eq!(filter.group_by_sql, "GROUP BY `users`.`userId`");
        assert_eq!(filter.having_sql, "`petCount` > :petCount");
        assert_eq!(
            filter.clauses(),
            "WHERE `users`.`name` = :name GROUP BY `users`.`userId` HAVING `petCount` > :petCount"
        );
    }

    #[test]
    fn like_operators_place_wildcards() {
        let schema = schema();
        let builder = FilterBuilder::new(&schema, "users", "userId");
        let params = SearchParams::new().with("name", "Do");

        for (operator, expected) in [("starts", "Do%"), ("ends", "%Do"), ("contains", "%Do%")] {
            let types = SearchTypes::new().with("name", operator);
            let filter = builder.build(&params, &types, quote_literal).unwrap();
            assert_eq!(filter.where_sql, "`users`.`name` LIKE :name");
            assert_eq!(filter.params, vec![(":name".to_string(), Value::from(expected))]);
        }
    }

    #[test]
    fn list_values_become_in_lists() {
        let schema = schema();
        let builder = FilterBuilder::new(&schema, "users", "userId");
        let types = SearchTypes::new();

        let params = SearchParams::new().with_list("name", ["a", "b"]);
        let filter = builder.build(&params, &types, quote_literal).unwrap();
        assert_eq!(filter.where_sql, "`users`.`name` IN ('a','b')");
        assert!(filter.params.is_empty());

        let params = SearchParams::new().with_list("name", vec![Value::Null, "x".into()]);
        let filter = builder.build(&params, &types, quote_literal).unwrap();
        assert_eq!(
            filter.where_sql,
            "(`users`.`name` = :name OR `users`.`name` IS NULL)"
        );
        assert_eq!(filter.params, vec![(":name".to_string(), Value::from("x"))]);

        let params =
            SearchParams::new().with_list("name", vec!["a".into(), Value::Null, "b".into()]);
        let filter = builder.build(&params, &types, quote_literal).unwrap();
        assert_eq!(
            filter.where_sql,
            "(`users`.`name` IN ('a','b') OR `users`.`name` IS NULL)"
        );

        let params = SearchParams::new().with_list("name", Vec::<Value>::new());
        let filter = builder.build(&params, &types, quote_literal).unwrap();
        assert_eq!(filter.where_sql, "0 = 1");
    }

    #[test]
    fn null_equals_is_null_and_lists_reject_other_operators() {
        let schema = schema();
        let builder = FilterBuilder::new(&schema, "users", "userId");

        let params = SearchParams::new().with("name", Value::Null);
        let filter = builder.build(&params, &SearchTypes::new(), quote_literal).unwrap();
        assert_eq!(filter.where_sql, "`users`.`name` IS NULL");

        let params = SearchParams::new().with_list("name", ["a", "b"]);
        let types = SearchTypes::new().with("name", "starts");
        assert!(matches!(
            builder.build(&params, &types, quote_literal),
            Err(ModelError::Config(_))
        ));
    }

    #[test]
    fn colliding_placeholders_get_suffixes() {
        let schema = schema();
        let builder = FilterBuilder::new(&schema, "users", "userId");
        let params = SearchParams::new()
            .with("users.name", "a")
            .with("users_name", "b");
        let filter = builder.build(&params, &SearchTypes::new(), quote_literal).unwrap();
        assert_eq!(
            filter.where_sql,
            "`users`.`name` = :users_name AND `users_name` = :users_name_2"
        );
    }
}
