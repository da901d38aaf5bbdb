//! Row data model: an ordered set of named cell values.
//!
//! Rows are produced by a loader (see [`crate::io::csv`]) or built by hand, and
//! are only ever read by the engine.

use crate::naming::normalize_field_name;
use std::fmt;

/// A single cell value.
///
/// Loaders that read everything as text produce [`Value::Text`]; numeric
/// variants exist so that callers feeding typed data get stable stringification
/// (a whole-number float renders without a trailing `.0`).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Render the value as it appears in a substitution context.
    ///
    /// ```
    /// use docbatch::Value;
    ///
    /// assert_eq!(Value::Float(3.0).to_context_string(), "3");
    /// assert_eq!(Value::Float(2.5).to_context_string(), "2.5");
    /// assert_eq!(Value::Empty.to_context_string(), "");
    /// ```
    #[must_use]
    pub fn to_context_string(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{f:.0}"),
            Self::Float(f) => f.to_string(),
        }
    }

    /// `true` for [`Value::Empty`] and empty text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Int(_) | Self::Float(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_context_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

/// One record of the dataset: field names in source column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, value);
        self
    }

    /// Append a field, replacing the value in place if the name already exists.
    pub fn push(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == field) {
            slot.1 = value;
        } else {
            self.fields.push((field, value));
        }
    }

    /// Exact-name lookup.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    /// Lookup by the literal field name, falling back to its normalized form
    /// when the literal is absent or blank.
    #[must_use]
    pub fn lookup(&self, field: &str) -> Option<&Value> {
        match self.get(field) {
            Some(v) if !v.is_blank() => Some(v),
            literal => {
                let normalized = normalize_field_name(field);
                if normalized == field {
                    return literal;
                }
                match self.get(&normalized) {
                    Some(v) if !v.is_blank() => Some(v),
                    _ => literal,
                }
            }
        }
    }

    /// [`Row::lookup`] rendered as a context string; `""` when absent.
    #[must_use]
    pub fn lookup_string(&self, field: &str) -> String {
        self.lookup(field)
            .map(Value::to_context_string)
            .unwrap_or_default()
    }

    /// Fields and values in row order.
    ///
    /// # Example
    /// ```
    /// use docbatch::{Row, Value};
    ///
    /// let row = Row::new().with("name", "Ada").with("age", 36i64);
    /// let pairs: Vec<_> = row.iter().collect();
    /// assert_eq!(pairs, vec![("name", &Value::from("Ada")), ("age", &Value::Int(36))]);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field names in row order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (k, v) in iter {
            row.push(k, v);
        }
        row
    }
}
