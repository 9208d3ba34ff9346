//! Multi-key sort chains compiled into `ORDER BY` fragments.

use crate::error::{ModelError, ModelResult};
use crate::query::sql::quote_identifier;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = ModelError;

    /// Accepts exactly `asc` or `desc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ModelError::config(format!(
                "Invalid sort direction '{other}'"
            ))),
        }
    }
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

/// One sort key plus an optional less significant key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    field: String,
    direction: SortDirection,
    secondary: Option<Box<Sort>>,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
            secondary: None,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Parses a `(field, "asc" | "desc")` pair.
    pub fn parse(field: impl Into<String>, direction: &str) -> ModelResult<Self> {
        Ok(Self::new(field, direction.parse()?))
    }

    /// Appends `next` at the end of the chain.
    pub fn then(mut self, next: Sort) -> Self {
        let tail = match self.secondary.take() {
            Some(secondary) => (*secondary).then(next),
            None => next,
        };
        self.secondary = Some(Box::new(tail));
        self
    }

    pub fn set_secondary(&mut self, secondary: Option<Sort>) {
        self.secondary = secondary.map(Box::new);
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn secondary(&self) -> Option<&Sort> {
        self.secondary.as_deref()
    }

    /// `(field, direction)` pairs, one per node, most significant first.
    pub fn keys(&self) -> Vec<(&str, SortDirection)> {
        let mut keys = Vec::new();
        let mut node = Some(self);
        while let Some(sort) = node {
            keys.push((sort.field.as_str(), sort.direction));
            node = sort.secondary.as_deref();
        }
        keys
    }

    /// `ORDER BY` fragment for the whole chain.
    pub fn compile(&self) -> String {
        let terms: Vec<String> = self
            .keys()
            .into_iter()
            .map(|(field, direction)| format!("{} {}", quote_identifier(field), direction.as_sql()))
            .collect();
        if terms.is_empty() {
            return String::new();
        }
        format!("ORDER BY {}", terms.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{Sort, SortDirection};
    use crate::error::ModelError;

    #[test]
    fn chain_compiles_most_significant_first() {
        let sort = Sort::asc("a").then(Sort::desc("b")).then(Sort::asc("c.d"));
        assert_eq!(sort.compile(), "ORDER BY `a` ASC, `b` DESC, `c`.`d` ASC");
    }

    #[test]
    fn every_node_emits_a_term_even_when_fields_repeat() {
        let sort = Sort::asc("a").then(Sort::desc("b")).then(Sort::desc("a"));
        assert_eq!(sort.compile(), "ORDER BY `a` ASC, `b` DESC, `a` DESC");
        assert_eq!(sort.keys().len(), 3);
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let err = Sort::parse("a", "up").unwrap_err();
        assert!(matches!(err, ModelError::Config(message) if message == "Invalid sort direction 'up'"));
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("DESC".parse::<SortDirection>().is_err());
    }
}
