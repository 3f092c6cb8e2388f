//! Classification of live values into copy-semantics categories.
//!
//! The dispatch is a fixed, ordered list of checks. The first match wins,
//! so a type named opaque is never decomposed even if it also exposes
//! fields:
//!   1. scalars                                   → Value
//!   2. opaque handles, types named in `opaque`   → Opaque
//!   3. resources, types named in `cloneable`     → Cloned
//!   4. sequences and sets                        → Container
//!   5. mappings                                  → Mapping
//!   6. coroutines                                → Suspended
//!   7. entities                                  → Instance

use crate::live::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Value,
    Opaque,
    Cloned,
    Container,
    Mapping,
    Suspended,
    Instance,
}

/// Per-type overrides supplied by configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierTable {
    /// Types shared by reference and never copied.
    #[serde(default)]
    pub opaque: BTreeSet<String>,
    /// Entity types deep-copied through `Entity::duplicate`.
    #[serde(default)]
    pub cloneable: BTreeSet<String>,
    /// Fields skipped on the named types. Left untouched by restore.
    #[serde(default)]
    pub exclusions: BTreeMap<String, BTreeSet<String>>,
}

impl ClassifierTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opaque(mut self, type_name: &str) -> Self {
        self.opaque.insert(type_name.to_string());
        self
    }

    pub fn with_cloneable(mut self, type_name: &str) -> Self {
        self.cloneable.insert(type_name.to_string());
        self
    }

    pub fn with_exclusion(mut self, type_name: &str, field: &str) -> Self {
        self.exclusions
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string());
        self
    }

    /// Merge `other` into this table. Entries only accumulate.
    pub fn extend(&mut self, other: &ClassifierTable) {
        self.opaque.extend(other.opaque.iter().cloned());
        self.cloneable.extend(other.cloneable.iter().cloned());
        for (type_name, fields) in &other.exclusions {
            self.exclusions
                .entry(type_name.clone())
                .or_default()
                .extend(fields.iter().cloned());
        }
    }

    pub fn is_opaque(&self, type_name: &str) -> bool {
        self.opaque.contains(type_name)
    }

    pub fn is_cloneable(&self, type_name: &str) -> bool {
        self.cloneable.contains(type_name)
    }

    pub fn is_excluded(&self, type_name: &str, field: &str) -> bool {
        self.exclusions
            .get(type_name)
            .is_some_and(|fields| fields.contains(field))
    }

    pub fn classify(&self, value: &Value) -> Category {
        match value {
            Value::Absent
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Text(_)
            | Value::Tag(_) => Category::Value,
            Value::Opaque(_) => Category::Opaque,
            Value::Resource(r) => {
                if self.is_opaque(r.borrow().type_name()) {
                    Category::Opaque
                } else {
                    Category::Cloned
                }
            }
            Value::Seq(_) => Category::Container,
            Value::Map(_) => Category::Mapping,
            Value::Task(t) => {
                if self.is_opaque(t.borrow().type_name()) {
                    Category::Opaque
                } else {
                    Category::Suspended
                }
            }
            Value::Object(o) => {
                let type_name = o.borrow().type_name();
                if self.is_opaque(type_name) {
                    Category::Opaque
                } else if self.is_cloneable(type_name) {
                    Category::Cloned
                } else {
                    Category::Instance
                }
            }
        }
    }
}
