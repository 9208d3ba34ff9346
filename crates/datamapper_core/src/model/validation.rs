//! Per-field validation rule chains.
//!
//! # Responsibility
//! - Evaluate an ordered list of rules against one field value.
//! - Produce ordered, human-readable failure messages.
//!
//! # Invariants
//! - Rules run by descending priority; equal priorities keep declaration order.
//! - A failing rule flagged `break_on_failure` stops the remaining chain.

use crate::error::{ModelError, ModelResult};
use crate::model::value::Value;
use regex::Regex;

/// Priority assigned to rules that do not specify one.
pub const DEFAULT_PRIORITY: i32 = 1;

/// A single value check.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Text length in characters, `max` inclusive when present.
    StringLength { min: usize, max: Option<usize> },
    /// The text form of the value must match somewhere.
    Regex(Regex),
    GreaterThan { min: f64, inclusive: bool },
    LessThan { max: f64, inclusive: bool },
    /// Rejects null and empty text.
    NotEmpty,
    /// The value must equal one of the listed values.
    InList(Vec<Value>),
}

impl Rule {
    /// Compiles a regex rule, rejecting invalid patterns at declaration time.
    pub fn regex(pattern: &str) -> ModelResult<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|err| ModelError::config(format!("invalid regex `{pattern}`: {err}")))
    }

    /// Returns the default failure message when `value` does not pass.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::StringLength { min, max } => {
                let Some(text) = value.as_str() else {
                    return Err("Invalid type given. String expected".to_string());
                };
                let length = text.chars().count();
                if length < *min {
                    return Err(format!("The input is less than {min} characters long"));
                }
                match max {
                    Some(max) if length > *max => {
                        Err(format!("The input is more than {max} characters long"))
                    }
                    _ => Ok(()),
                }
            }
            Self::Regex(pattern) => {
                let text = match value {
                    Value::Text(_) | Value::Integer(_) | Value::Double(_) => value.to_string(),
                    _ => {
                        return Err(
                            "Invalid type given. String, integer or float expected".to_string()
                        )
                    }
                };
                if pattern.is_match(&text) {
                    Ok(())
                } else {
                    Err(format!(
                        "The input does not match against pattern '{}'",
                        pattern.as_str()
                    ))
                }
            }
            Self::GreaterThan { min, inclusive } => {
                let passes = numeric(value).is_some_and(|number| {
                    if *inclusive {
                        number >= *min
                    } else {
                        number > *min
                    }
                });
                if passes {
                    Ok(())
                } else if *inclusive {
                    Err(format!(
                        "The input is not greater than or equal to '{min}'"
                    ))
                } else {
                    Err(format!("The input is not greater than '{min}'"))
                }
            }
            Self::LessThan { max, inclusive } => {
                let passes = numeric(value).is_some_and(|number| {
                    if *inclusive {
                        number <= *max
                    } else {
                        number < *max
                    }
                });
                if passes {
                    Ok(())
                } else if *inclusive {
                    Err(format!("The input is not less or equal than '{max}'"))
                } else {
                    Err(format!("The input is not less than '{max}'"))
                }
            }
            Self::NotEmpty => match value {
                Value::Null => Err("Value is required and can't be empty".to_string()),
                Value::Text(text) if text.is_empty() => {
                    Err("Value is required and can't be empty".to_string())
                }
                _ => Ok(()),
            },
            Self::InList(haystack) => {
                if haystack.contains(value) {
                    Ok(())
                } else {
                    Err("The input was not found in the haystack".to_string())
                }
            }
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Text(text) => text.trim().parse::<f64>().ok(),
        other => other.as_f64(),
    }
}

/// A rule plus the chain controls attached to it.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub rule: Rule,
    /// Replaces every default message of the rule.
    pub message: Option<String>,
    pub break_on_failure: bool,
    pub priority: i32,
}

impl RuleSpec {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            message: None,
            break_on_failure: false,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn break_on_failure(mut self) -> Self {
        self.break_on_failure = true;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl From<Rule> for RuleSpec {
    fn from(value: Rule) -> Self {
        Self::new(value)
    }
}

/// Runs `rules` against `value` and returns failure messages in chain order.
pub fn run_chain(rules: &[RuleSpec], value: &Value) -> Vec<String> {
    let mut ordered: Vec<&RuleSpec> = rules.iter().collect();
    // stable: equal priorities keep declaration order
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut messages = Vec::new();
    for spec in ordered {
        if let Err(default_message) = spec.rule.check(value) {
            messages.push(spec.message.clone().unwrap_or(default_message));
            if spec.break_on_failure {
                break;
            }
        }
    }
    messages
}
