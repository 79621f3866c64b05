// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search apps: one per searchable record type.
//!
//! Each app bundles everything the rest of the crate needs to know about a
//! record type: its document schema and mapping rules, its query surface,
//! who may see it, how it exports, and which other records it embeds.
//!
//! ```text
//! SearchApp ──┬─ schema()            → DocumentSchema (index mapping)
//!             ├─ produce_document()  → Document (mapping rules)
//!             ├─ query_rules()       → QueryRules (composer)
//!             ├─ permission_rule()   → PermissionFilter
//!             ├─ export_columns()    → export table layout
//!             └─ dependencies()      → DependencyEdge (sync cascade)
//! ```

mod company;
mod contact;
mod interaction;
mod order;

pub use company::CompanySearchApp;
pub use contact::ContactSearchApp;
pub use interaction::InteractionSearchApp;
pub use order::OrderSearchApp;

use serde_json::{Map, Value};

use crate::config::SearchConfig;
use crate::document::{values_at_path, Document};
use crate::entity::{Entity, EntityKind};
use crate::mapping::MappingError;
use crate::permissions::{PermissionFilter, RequestContext};
use crate::schema::DocumentSchema;
use crate::search::QueryRules;

/// Default number of documents per bulk request.
pub const DEFAULT_BULK_BATCH_SIZE: usize = 2000;

/// This app's documents embed a summary of `source` records, reached from
/// the app's own records through `relation`.
///
/// When a `source` record is saved, every record whose `relation` points at
/// it gets its document rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    pub source: EntityKind,
    pub relation: &'static str,
}

impl DependencyEdge {
    pub const fn new(source: EntityKind, relation: &'static str) -> Self {
        Self { source, relation }
    }
}

/// How one export cell is filled from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportCell {
    /// Value(s) at a dotted path; several values become an array
    Field(&'static str),
    /// Frontend link `{frontend_url}/{section}/{id}`
    Link(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportColumn {
    pub header: &'static str,
    pub cell: ExportCell,
}

impl ExportColumn {
    pub const fn field(header: &'static str, path: &'static str) -> Self {
        Self { header, cell: ExportCell::Field(path) }
    }

    pub const fn link(header: &'static str, section: &'static str) -> Self {
        Self { header, cell: ExportCell::Link(section) }
    }

    pub fn render(&self, source: &Map<String, Value>, config: &SearchConfig) -> Value {
        match self.cell {
            ExportCell::Field(path) => {
                let mut values: Vec<Value> = values_at_path(source, path).into_iter().cloned().collect();
                match values.len() {
                    0 => Value::Null,
                    1 => values.remove(0),
                    _ => Value::Array(values),
                }
            }
            ExportCell::Link(section) => match source.get("id").and_then(Value::as_str) {
                Some(id) => Value::String(format!("{}/{}/{}", config.frontend_url.trim_end_matches('/'), section, id)),
                None => Value::Null,
            },
        }
    }
}

/// Autocomplete surface of an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocompleteRules {
    /// Field holding lowercased suggestion inputs
    pub field: &'static str,
    /// Fields returned per suggestion
    pub source_fields: &'static [&'static str],
}

/// Everything the crate knows about one searchable record type.
pub trait SearchApp: Send + Sync {
    /// Registry key and index name component
    fn name(&self) -> &'static str;

    fn kind(&self) -> EntityKind;

    fn schema(&self) -> &DocumentSchema;

    /// Map one record to its document. Pure.
    fn produce_document(&self, entity: &Entity) -> Result<Document, MappingError>;

    /// Checks the one-rule-per-field invariant for this app.
    fn check_mapping(&self) -> Result<(), MappingError>;

    fn query_rules(&self) -> &QueryRules;

    /// Result restriction for the caller.
    fn permission_rule(&self, _ctx: &RequestContext) -> PermissionFilter {
        PermissionFilter::Unrestricted
    }

    /// Permission needed to search.
    fn view_permission(&self) -> String {
        format!("{}.view_{}", self.name(), self.name())
    }

    /// Whether the caller may search this app at all.
    fn can_view(&self, ctx: &RequestContext) -> bool {
        ctx.has_permission(&self.view_permission())
    }

    /// Permission needed to export.
    fn export_permission(&self) -> String {
        format!("{}.export_{}", self.name(), self.name())
    }

    fn export_columns(&self) -> &[ExportColumn];

    fn autocomplete(&self) -> Option<&AutocompleteRules> {
        None
    }

    /// Embedded summaries of other records.
    fn dependencies(&self) -> &[DependencyEdge] {
        &[]
    }

    fn bulk_batch_size(&self) -> usize {
        DEFAULT_BULK_BATCH_SIZE
    }
}

/// Wrong-variant error for apps whose record did not match.
pub(crate) fn wrong_kind(expected: EntityKind, entity: &Entity) -> MappingError {
    MappingError::WrongKind {
        expected,
        actual: entity.kind(),
    }
}
