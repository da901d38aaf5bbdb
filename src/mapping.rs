//! Per-row template selection.
//!
//! A [`TemplateMapping`] maps a field name to a table of observed values, each
//! pointing at a template path. Rows whose value for a mapped field appears in
//! that field's table use the mapped template; everything else falls back to
//! the base template.
//!
//! # Persistence
//!
//! Mappings round-trip through JSON as nested objects. The reserved key
//! [`PRIORITY_KEY`] holds an ordered list of field names that decides which
//! field is consulted first:
//!
//! ```json
//! {
//!     "__priority__": ["region", "type"],
//!     "type": { "invoice": "templates/invoice.docx" },
//!     "region": { "EU": "templates/eu.docx" }
//! }
//! ```
//!
//! Without a priority list, fields are consulted in the order they appear in
//! the file.

use crate::row::Row;
use anyhow::{Context, Result, bail};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Reserved mapping key holding the field evaluation order.
pub const PRIORITY_KEY: &str = "__priority__";

/// Value → template table for one field, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldRules {
    field: String,
    targets: Vec<(String, PathBuf)>,
}

impl FieldRules {
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Template mapped to an exact field value.
    #[must_use]
    pub fn template_for(&self, value: &str) -> Option<&Path> {
        self.targets
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, p)| p.as_path())
    }

    /// `(value, template)` pairs in the order they were added.
    ///
    /// # Example
    /// ```
    /// use docbatch::TemplateMapping;
    /// use std::path::Path;
    ///
    /// let mapping = TemplateMapping::new()
    ///     .with_rule("kind", "memo", "memo.txt")
    ///     .with_rule("kind", "letter", "letter.txt");
    /// let rules = mapping.rules_for("kind").unwrap();
    /// let targets: Vec<_> = rules.targets().collect();
    /// assert_eq!(targets, vec![("memo", Path::new("memo.txt")), ("letter", Path::new("letter.txt"))]);
    /// ```
    pub fn targets(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.targets.iter().map(|(v, p)| (v.as_str(), p.as_path()))
    }

    fn set(&mut self, value: String, template: PathBuf) {
        if let Some(slot) = self.targets.iter_mut().find(|(v, _)| *v == value) {
            slot.1 = template;
        } else {
            self.targets.push((value, template));
        }
    }
}

/// Field → value → template mapping with an optional priority order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateMapping {
    fields: Vec<FieldRules>,
    priority: Option<Vec<String>>,
}

impl TemplateMapping {
    /// An empty mapping: every row uses the base template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map rows whose `field` equals `value` to `template`.
    #[must_use]
    pub fn with_rule(
        mut self,
        field: impl Into<String>,
        value: impl Into<String>,
        template: impl Into<PathBuf>,
    ) -> Self {
        self.insert(field, value, template);
        self
    }

    /// Set the field evaluation order.
    #[must_use]
    pub fn with_priority<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Add a rule, or replace the template of an existing `field`/`value` rule.
    ///
    /// A new field is appended after the existing ones, so it is consulted
    /// last when there is no priority list.
    ///
    /// # Example
    /// ```
    /// use docbatch::{Row, TemplateMapping};
    /// use std::path::{Path, PathBuf};
    ///
    /// let mut mapping = TemplateMapping::new();
    /// mapping.insert("kind", "memo", "old.txt");
    /// mapping.insert("kind", "memo", "new.txt");
    ///
    /// let row = Row::new().with("kind", "memo");
    /// assert_eq!(mapping.resolve(&row, Path::new("base.txt")), PathBuf::from("new.txt"));
    /// assert_eq!(mapping.template_paths().count(), 1);
    /// ```
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<String>,
        template: impl Into<PathBuf>,
    ) {
        let field = field.into();
        let idx = match self.fields.iter().position(|r| r.field == field) {
            Some(i) => i,
            None => {
                self.fields.push(FieldRules {
                    field,
                    targets: Vec::new(),
                });
                self.fields.len() - 1
            }
        };
        self.fields[idx].set(value.into(), template.into());
    }

    /// Field evaluation order, if one was set.
    #[must_use]
    pub fn priority(&self) -> Option<&[String]> {
        self.priority.as_deref()
    }

    /// Rules for one field.
    #[must_use]
    pub fn rules_for(&self, field: &str) -> Option<&FieldRules> {
        self.fields.iter().find(|r| r.field == field)
    }

    /// Field rules in mapping order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldRules> {
        self.fields.iter()
    }

    /// Every template path the mapping can select, duplicates included.
    pub fn template_paths(&self) -> impl Iterator<Item = &Path> {
        self.fields
            .iter()
            .flat_map(|r| r.targets.iter().map(|(_, p)| p.as_path()))
    }

    /// `true` when there are no field rules and no priority list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.priority.is_none()
    }

    /// Select the template for `row`, falling back to `base`.
    ///
    /// With a priority list, listed fields that have rules are consulted in
    /// list order; otherwise fields are consulted in mapping order. The first
    /// field whose row value (trimmed) has an entry wins.
    #[must_use]
    pub fn resolve(&self, row: &Row, base: &Path) -> PathBuf {
        let hit = match &self.priority {
            Some(order) => order
                .iter()
                .filter_map(|f| self.rules_for(f))
                .find_map(|rules| lookup(rules, row)),
            None => self.fields.iter().find_map(|rules| lookup(rules, row)),
        };
        hit.unwrap_or(base).to_path_buf()
    }

    /// Read a mapping from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable, or not a JSON
    /// object of the expected shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("mapping file not found: {}", path.display());
        }
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse mapping {}", path.display()))
    }

    /// Write the mapping as pretty-printed JSON, keeping non-ASCII text as is.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(self)?;
        fs::write(path, formatted).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

fn lookup<'m>(rules: &'m FieldRules, row: &Row) -> Option<&'m Path> {
    let value = row.lookup_string(&rules.field);
    rules.template_for(value.trim())
}

/// Free-function form used by the executor: no mapping means the base template.
#[must_use]
pub fn resolve_template(row: &Row, mapping: Option<&TemplateMapping>, base: &Path) -> PathBuf {
    match mapping {
        Some(m) if !m.is_empty() => m.resolve(row, base),
        _ => base.to_path_buf(),
    }
}

impl Serialize for TemplateMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.fields.len() + usize::from(self.priority.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(order) = &self.priority {
            map.serialize_entry(PRIORITY_KEY, order)?;
        }
        for rules in &self.fields {
            map.serialize_entry(&rules.field, &TargetsRef(&rules.targets))?;
        }
        map.end()
    }
}

struct TargetsRef<'a>(&'a [(String, PathBuf)]);

impl Serialize for TargetsRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (value, template) in self.0 {
            map.serialize_entry(value, template)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TemplateMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MappingVisitor)
    }
}

struct MappingVisitor;

impl<'de> Visitor<'de> for MappingVisitor {
    type Value = TemplateMapping;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of field -> {value -> template path}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut mapping = TemplateMapping::new();
        while let Some(key) = access.next_key::<String>()? {
            if key == PRIORITY_KEY {
                if mapping.priority.is_some() {
                    return Err(de::Error::duplicate_field(PRIORITY_KEY));
                }
                mapping.priority = Some(access.next_value()?);
                continue;
            }
            let Targets(targets) = access.next_value()?;
            for (value, template) in targets {
                mapping.insert(key.clone(), value, template);
            }
        }
        Ok(mapping)
    }
}

struct Targets(Vec<(String, PathBuf)>);

impl<'de> Deserialize<'de> for Targets {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TargetsVisitor;

        impl<'de> Visitor<'de> for TargetsVisitor {
            type Value = Targets;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of value -> template path")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Targets, A::Error> {
                let mut out = Vec::new();
                while let Some((value, template)) = access.next_entry::<String, PathBuf>()? {
                    out.push((value, template));
                }
                Ok(Targets(out))
            }
        }

        deserializer.deserialize_map(TargetsVisitor)
    }
}
