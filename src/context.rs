//! Substitution context construction.

use crate::naming::normalize_field_name;
use crate::row::{Row, Value};
use std::collections::BTreeMap;

/// Placeholder name → replacement text.
pub type Context = BTreeMap<String, String>;

/// Context key that every rendered document may rely on.
pub const IDENTIFIER_KEY: &str = "编号";

/// Build the substitution context for one row.
///
/// Every field is stringified with [`Value::to_context_string`]. The
/// [`IDENTIFIER_KEY`] entry is always present:
///
/// 1. a field whose name matches the key (exactly, case-insensitively, or after
///    normalization) supplies it;
/// 2. otherwise the first field, in row order, whose name contains the key,
///    `num` or `id` (case-insensitive) supplies it;
/// 3. otherwise it is `""`.
#[must_use]
pub fn build_context(row: &Row) -> Context {
    let mut context: Context = row
        .iter()
        .map(|(field, value)| (field.to_string(), value.to_context_string()))
        .collect();

    if let Some(value) = identifier_value(row, IDENTIFIER_KEY) {
        context
            .entry(IDENTIFIER_KEY.to_string())
            .or_insert_with(|| value.to_context_string());
    }
    context.entry(IDENTIFIER_KEY.to_string()).or_default();
    context
}

/// Field value standing in for `label`: an exact match (literal,
/// case-insensitive or normalized) wins over the first substring match.
fn identifier_value<'r>(row: &'r Row, label: &str) -> Option<&'r Value> {
    let label_lower = label.to_lowercase();
    let label_normalized = normalize_field_name(label);

    let exact = row.iter().find(|(field, _)| {
        *field == label
            || field.to_lowercase() == label_lower
            || normalize_field_name(field) == label_normalized
    });
    if let Some((_, value)) = exact {
        return Some(value);
    }

    row.iter()
        .find(|(field, _)| {
            let lower = field.to_lowercase();
            field.contains(label) || lower.contains("num") || lower.contains("id")
        })
        .map(|(_, value)| value)
}
