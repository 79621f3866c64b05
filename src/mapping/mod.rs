// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Field Mapper
//!
//! Turns a record into a document body, one rule per document field.
//!
//! ```text
//! Company ──┬─ "name"          → scalar pass-through
//!           ├─ "uk_region"     → {id, name}
//!           ├─ "sector"        → {id, name, ancestors: [{id}]}
//!           ├─ "trading_names" → ordered array
//!           └─ "modified_by"   → ignored (never emitted)
//! ```
//!
//! Rules are plain function pointers over the loaded record, so mapping is
//! pure: the same record state always produces the same document.

mod helpers;

pub use helpers::*;

use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

use crate::entity::EntityKind;
use crate::schema::DocumentSchema;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Expected a {expected} record, got {actual}")]
    WrongKind {
        expected: EntityKind,
        actual: EntityKind,
    },
    #[error("Schema field '{field}' of '{app}' has no mapping rule")]
    UnmappedField { app: String, field: String },
    #[error("Mapping rule '{field}' of '{app}' has no schema field")]
    UndeclaredField { app: String, field: String },
    #[error("Field '{field}' of '{app}' is mapped more than once")]
    DuplicateRule { app: String, field: String },
    #[error("Ignored field '{field}' of '{app}' is declared in the schema")]
    IgnoredFieldDeclared { app: String, field: String },
}

/// Extraction function for one document field.
pub type Extractor<T> = fn(&T) -> Value;

/// Ordered set of field rules for one record type.
pub struct MappingRules<T> {
    rules: Vec<(&'static str, Extractor<T>)>,
    ignored: Vec<&'static str>,
}

impl<T> Default for MappingRules<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MappingRules<T> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            ignored: Vec::new(),
        }
    }

    /// Add a field rule.
    pub fn field(mut self, name: &'static str, extract: Extractor<T>) -> Self {
        self.rules.push((name, extract));
        self
    }

    /// Declare record attributes that must never reach the index.
    pub fn ignore(mut self, names: &[&'static str]) -> Self {
        self.ignored.extend_from_slice(names);
        self
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|(name, _)| *name)
    }

    pub fn ignored(&self) -> &[&'static str] {
        &self.ignored
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule against `entity`.
    pub fn apply(&self, entity: &T) -> Map<String, Value> {
        let mut fields = Map::new();
        for (name, extract) in &self.rules {
            fields.insert((*name).to_string(), extract(entity));
        }
        fields
    }

    /// Check the one-rule-per-declared-field invariant against `schema`.
    ///
    /// Fields that only exist as `copy_to` targets are populated by the
    /// store and need no rule.
    pub fn check_against(&self, schema: &DocumentSchema) -> Result<(), MappingError> {
        let app = schema.name.clone();
        let mut seen = HashSet::new();
        for name in self.field_names() {
            if !seen.insert(name) {
                return Err(MappingError::DuplicateRule {
                    app,
                    field: name.to_string(),
                });
            }
            if schema.field(name).is_none() {
                return Err(MappingError::UndeclaredField {
                    app,
                    field: name.to_string(),
                });
            }
        }

        let copy_targets = schema.copy_targets();
        for field in &schema.fields {
            if copy_targets.contains(field.name.as_str()) {
                continue;
            }
            if !seen.contains(field.name.as_str()) {
                return Err(MappingError::UnmappedField {
                    app,
                    field: field.name.clone(),
                });
            }
        }

        for ignored in &self.ignored {
            if schema.field(ignored).is_some() {
                return Err(MappingError::IgnoredFieldDeclared {
                    app,
                    field: (*ignored).to_string(),
                });
            }
        }
        Ok(())
    }
}
