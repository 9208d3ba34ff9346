//! Identifier and literal quoting shared by the query builders.

use crate::model::value::{Value, DATETIME_FORMAT};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid placeholder regex"));

/// Backtick-quotes an identifier, quoting each part of a dotted name.
///
/// `users.name` becomes `` `users`.`name` ``; embedded backticks are doubled.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Renders `value` as a SQL literal.
///
/// Text is single-quoted with embedded quotes doubled; numbers are emitted bare.
pub fn quote_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => i64::from(*v).to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Text(v) => quote_text(v),
        Value::DateTime(v) => quote_text(&v.format(DATETIME_FORMAT).to_string()),
        Value::Json(v) => quote_text(&v.to_string()),
    }
}

fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Named placeholder for a parameter key: `:` plus the key with every run of
/// non-alphanumeric characters collapsed to `_`.
pub fn placeholder(key: &str) -> String {
    format!(":{}", NON_ALNUM_RE.replace_all(key, "_"))
}

/// Placeholder names already handed out for one statement.
#[derive(Debug, Default)]
pub(crate) struct Placeholders {
    used: HashSet<String>,
}

impl Placeholders {
    /// Placeholder for `key`, suffixed `_2`, `_3`, ... when already taken.
    pub(crate) fn claim(&mut self, key: &str) -> String {
        let base = placeholder(key);
        let mut name = base.clone();
        let mut suffix = 2;
        while !self.used.insert(name.clone()) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::{placeholder, quote_identifier, quote_literal, Placeholders};
    use crate::model::value::Value;

    #[test]
    fn identifiers_quote_each_dotted_part() {
        assert_eq!(quote_identifier("name"), "`name`");
        assert_eq!(quote_identifier("users.name"), "`users`.`name`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(quote_literal(&Value::from("O'Brien")), "'O''Brien'");
        assert_eq!(quote_literal(&Value::Integer(12)), "12");
        assert_eq!(quote_literal(&Value::Null), "NULL");
    }

    #[test]
    fn placeholders_collapse_punctuation_runs() {
        assert_eq!(placeholder("name"), ":name");
        assert_eq!(placeholder("users.first name"), ":users_first_name");
        assert_eq!(placeholder("a--b"), ":a_b");
    }

    #[test]
    fn claimed_placeholders_stay_unique() {
        let mut names = Placeholders::default();
        assert_eq!(names.claim("id"), ":id");
        assert_eq!(names.claim("id"), ":id_2");
        assert_eq!(names.claim("i-d"), ":i_d");
    }
}
