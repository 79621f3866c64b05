// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document schemas.
//!
//! A [`DocumentSchema`] declares the type and analyzer of every document
//! field and renders the index creation body the document store expects.
//!
//! # Example
//!
//! ```rust
//! use datahub_search::schema::{Analyzer, DocumentSchema, id_name};
//!
//! let schema = DocumentSchema::new("company")
//!     .keyword("id")
//!     .text("name", Analyzer::LowercaseKeyword)
//!     .sortable("name")
//!     .text("name_trigram", Analyzer::Trigram)
//!     .copy_to("name", "name_trigram")
//!     .boolean("archived")
//!     .field_spec(id_name("uk_region"));
//!
//! assert!(schema.is_sortable("name"));
//! assert!(schema.field("uk_region.id").is_some());
//! assert!(schema.copy_targets().contains("name_trigram"));
//! ```
//!
//! # Rendered body
//!
//! ```text
//! PUT /datahub-company-<hash>
//! {
//!   "settings": { "analysis": { lowercase_keyword / trigram / english } },
//!   "mappings": { "properties": {
//!     "id":   { "type": "keyword" },
//!     "name": { "type": "text", "analyzer": "lowercase_keyword_analyzer",
//!               "fielddata": true, "copy_to": ["name_trigram"] },
//!     ...
//!   } }
//! }
//! ```

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Text analyzers available to text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analyzer {
    /// Lowercased words split on non-alphanumerics
    Standard,
    /// Whole value as one lowercased token (case-insensitive exact match, sortable)
    LowercaseKeyword,
    /// Lowercased 3-character grams of each word (partial matching)
    Trigram,
    /// Standard words with English stop words removed
    English,
}

impl Analyzer {
    pub fn name(&self) -> &'static str {
        match self {
            Analyzer::Standard => "standard",
            Analyzer::LowercaseKeyword => "lowercase_keyword_analyzer",
            Analyzer::Trigram => "trigram_analyzer",
            Analyzer::English => "english_analyzer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Analyzer::Standard),
            "lowercase_keyword_analyzer" => Some(Analyzer::LowercaseKeyword),
            "trigram_analyzer" => Some(Analyzer::Trigram),
            "english_analyzer" => Some(Analyzer::English),
            _ => None,
        }
    }
}

/// Field type of a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Exact-match string (ids, codes)
    Keyword,
    /// Analyzed string
    Text(Analyzer),
    Boolean,
    Integer,
    Date,
    /// Sub-object with its own properties
    Object(Vec<FieldSpec>),
}

impl FieldType {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Keyword => "keyword",
            FieldType::Text(_) => "text",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Date => "date",
            FieldType::Object(_) => "object",
        }
    }

    /// Whether filters on this type should be analyzed matches rather than
    /// exact terms.
    pub fn is_analyzed(&self) -> bool {
        matches!(self, FieldType::Text(_))
    }
}

/// Field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    /// Index-time copies of this field's value into other fields
    pub copy_to: Vec<String>,
    /// Whether the field is searchable (stored-only when false)
    pub index: bool,
    /// Whether the field can be used as a sort key
    pub sortable: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let sortable = matches!(
            field_type,
            FieldType::Keyword
                | FieldType::Boolean
                | FieldType::Integer
                | FieldType::Date
                | FieldType::Text(Analyzer::LowercaseKeyword)
        );
        Self {
            name: name.into(),
            field_type,
            copy_to: Vec::new(),
            index: true,
            sortable,
        }
    }

    pub fn unindexed(mut self) -> Self {
        self.index = false;
        self
    }

    pub fn with_copy_to(mut self, target: impl Into<String>) -> Self {
        self.copy_to.push(target.into());
        self
    }

    fn properties_of(fields: &[FieldSpec]) -> Value {
        let mut props = Map::new();
        for field in fields {
            props.insert(field.name.clone(), field.to_property());
        }
        Value::Object(props)
    }

    fn to_property(&self) -> Value {
        let mut prop = Map::new();
        match &self.field_type {
            FieldType::Object(children) => {
                prop.insert("type".into(), json!("object"));
                prop.insert("properties".into(), Self::properties_of(children));
            }
            FieldType::Text(analyzer) => {
                prop.insert("type".into(), json!("text"));
                if *analyzer != Analyzer::Standard {
                    prop.insert("analyzer".into(), json!(analyzer.name()));
                }
                if self.sortable {
                    prop.insert("fielddata".into(), json!(true));
                }
            }
            other => {
                prop.insert("type".into(), json!(other.type_name()));
            }
        }
        if !self.index {
            prop.insert("index".into(), json!(false));
        }
        if !self.copy_to.is_empty() {
            prop.insert("copy_to".into(), json!(self.copy_to));
        }
        Value::Object(prop)
    }

    fn find<'a>(fields: &'a [FieldSpec], path: &str) -> Option<&'a FieldSpec> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let field = fields.iter().find(|f| f.name == head)?;
        match (rest, &field.field_type) {
            (None, _) => Some(field),
            (Some(rest), FieldType::Object(children)) => Self::find(children, rest),
            (Some(_), _) => None,
        }
    }

    fn find_mut<'a>(fields: &'a mut [FieldSpec], path: &str) -> Option<&'a mut FieldSpec> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let field = fields.iter_mut().find(|f| f.name == head)?;
        match rest {
            None => Some(field),
            Some(rest) => match &mut field.field_type {
                FieldType::Object(children) => Self::find_mut(children, rest),
                _ => None,
            },
        }
    }

    fn collect_copy_targets(fields: &[FieldSpec], out: &mut HashSet<String>) {
        for field in fields {
            out.extend(field.copy_to.iter().cloned());
            if let FieldType::Object(children) = &field.field_type {
                Self::collect_copy_targets(children, out);
            }
        }
    }
}

/// Schema for one document type.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSchema {
    /// Document type name (the search app name)
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl DocumentSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a prebuilt field (see [`id_name`] and friends).
    pub fn field_spec(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn keyword(self, name: impl Into<String>) -> Self {
        self.field_spec(FieldSpec::new(name, FieldType::Keyword))
    }

    /// Keyword kept in the body but not searchable.
    pub fn keyword_unindexed(self, name: impl Into<String>) -> Self {
        self.field_spec(FieldSpec::new(name, FieldType::Keyword).unindexed())
    }

    pub fn text(self, name: impl Into<String>, analyzer: Analyzer) -> Self {
        self.field_spec(FieldSpec::new(name, FieldType::Text(analyzer)))
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.field_spec(FieldSpec::new(name, FieldType::Boolean))
    }

    pub fn integer(self, name: impl Into<String>) -> Self {
        self.field_spec(FieldSpec::new(name, FieldType::Integer))
    }

    pub fn integer_unindexed(self, name: impl Into<String>) -> Self {
        self.field_spec(FieldSpec::new(name, FieldType::Integer).unindexed())
    }

    pub fn date(self, name: impl Into<String>) -> Self {
        self.field_spec(FieldSpec::new(name, FieldType::Date))
    }

    pub fn object(self, name: impl Into<String>, children: Vec<FieldSpec>) -> Self {
        self.field_spec(FieldSpec::new(name, FieldType::Object(children)))
    }

    /// Mark an existing field (dotted path) as a sort key.
    pub fn sortable(mut self, path: &str) -> Self {
        if let Some(field) = FieldSpec::find_mut(&mut self.fields, path) {
            field.sortable = true;
        }
        self
    }

    /// Copy an existing field's value into `target` at index time.
    pub fn copy_to(mut self, path: &str, target: impl Into<String>) -> Self {
        if let Some(field) = FieldSpec::find_mut(&mut self.fields, path) {
            field.copy_to.push(target.into());
        }
        self
    }

    /// Field by dotted path.
    pub fn field(&self, path: &str) -> Option<&FieldSpec> {
        FieldSpec::find(&self.fields, path)
    }

    pub fn is_sortable(&self, path: &str) -> bool {
        self.field(path).is_some_and(|f| f.sortable && f.index)
    }

    /// Paths that are only written through `copy_to`.
    pub fn copy_targets(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        FieldSpec::collect_copy_targets(&self.fields, &mut out);
        out
    }

    /// `{"properties": {...}}` body, as sent for in-place mapping updates.
    pub fn to_mapping(&self) -> Value {
        json!({ "properties": FieldSpec::properties_of(&self.fields) })
    }

    /// Full index creation body: analysis settings plus mapping.
    pub fn to_index_body(&self) -> Value {
        json!({
            "settings": { "analysis": analysis_settings() },
            "mappings": self.to_mapping(),
        })
    }

    /// Stable hash of the index body; names the physical index version.
    pub fn mapping_hash(&self) -> String {
        let body = serde_json::to_vec(&self.to_index_body()).unwrap_or_default();
        hex::encode(Sha256::digest(body))
    }
}

/// Analyzer definitions referenced by text fields.
pub fn analysis_settings() -> Value {
    json!({
        "analyzer": {
            "lowercase_keyword_analyzer": {
                "type": "custom",
                "tokenizer": "keyword",
                "filter": ["lowercase"],
            },
            "trigram_analyzer": {
                "type": "custom",
                "tokenizer": "trigram",
                "filter": ["lowercase"],
            },
            "english_analyzer": {
                "type": "custom",
                "tokenizer": "standard",
                "filter": ["english_possessive_stemmer", "lowercase", "english_stop"],
            },
        },
        "tokenizer": {
            "trigram": {
                "type": "ngram",
                "min_gram": 3,
                "max_gram": 3,
                "token_chars": ["letter", "digit"],
            },
        },
        "filter": {
            "english_possessive_stemmer": { "type": "stemmer", "language": "possessive_english" },
            "english_stop": { "type": "stop", "stopwords": "_english_" },
        },
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Field helpers for the common relation shapes
// ═══════════════════════════════════════════════════════════════════════════

fn lowercase_text(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Text(Analyzer::LowercaseKeyword))
}

/// `{id, name}` sub-object.
pub fn id_name(name: &str) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Object(vec![
            FieldSpec::new("id", FieldType::Keyword),
            lowercase_text("name"),
        ]),
    )
}

/// `{id, name}` with `name` copied into `name_trigram` for partial matching.
pub fn id_name_partial(name: &str) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Object(vec![
            FieldSpec::new("id", FieldType::Keyword),
            lowercase_text("name").with_copy_to(format!("{}.name_trigram", name)),
            FieldSpec::new("name_trigram", FieldType::Text(Analyzer::Trigram)),
        ]),
    )
}

fn person_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("id", FieldType::Keyword),
        lowercase_text("first_name"),
        lowercase_text("last_name"),
        lowercase_text("name"),
    ]
}

/// Adviser/contact sub-object, optionally with the adviser's team.
pub fn contact_or_adviser(name: &str, include_dit_team: bool) -> FieldSpec {
    let mut fields = person_fields();
    if include_dit_team {
        fields.push(id_name("dit_team"));
    }
    FieldSpec::new(name, FieldType::Object(fields))
}

/// Adviser/contact sub-object whose `name` also feeds `name_trigram`.
pub fn contact_or_adviser_partial(name: &str) -> FieldSpec {
    let mut fields = person_fields();
    if let Some(full) = fields.iter_mut().find(|f| f.name == "name") {
        full.copy_to.push(format!("{}.name_trigram", name));
    }
    fields.push(FieldSpec::new("name_trigram", FieldType::Text(Analyzer::Trigram)));
    FieldSpec::new(name, FieldType::Object(fields))
}

/// Sector with materialized ancestors for hierarchical filtering.
pub fn sector(name: &str) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Object(vec![
            FieldSpec::new("id", FieldType::Keyword),
            lowercase_text("name"),
            FieldSpec::new(
                "ancestors",
                FieldType::Object(vec![FieldSpec::new("id", FieldType::Keyword)]),
            ),
        ]),
    )
}

/// Postal address block.
pub fn address(name: &str) -> FieldSpec {
    FieldSpec::new(
        name,
        FieldType::Object(vec![
            FieldSpec::new("line_1", FieldType::Text(Analyzer::Standard)),
            FieldSpec::new("line_2", FieldType::Text(Analyzer::Standard)),
            lowercase_text("town"),
            lowercase_text("county"),
            FieldSpec::new("postcode", FieldType::Text(Analyzer::Standard)),
            id_name("country"),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> DocumentSchema {
        DocumentSchema::new("company")
            .keyword("id")
            .text("name", Analyzer::LowercaseKeyword)
            .text("name_trigram", Analyzer::Trigram)
            .copy_to("name", "name_trigram")
            .boolean("archived")
            .integer_unindexed("net_cost")
            .field_spec(id_name_partial("company"))
            .field_spec(sector("sector"))
    }

    #[test]
    fn test_field_lookup_by_path() {
        let s = schema();
        assert_eq!(s.field("name").unwrap().field_type.type_name(), "text");
        assert!(s.field("sector.ancestors.id").is_some());
        assert!(s.field("sector.ancestors.name").is_none());
        assert!(s.field("archived.id").is_none());
    }

    #[test]
    fn test_sortable_defaults() {
        let s = schema();
        assert!(s.is_sortable("name"));
        assert!(s.is_sortable("archived"));
        assert!(!s.is_sortable("name_trigram"));
        // stored-only fields cannot be sorted on
        assert!(!s.is_sortable("net_cost"));
    }

    #[test]
    fn test_copy_targets_include_nested() {
        let targets = schema().copy_targets();
        assert!(targets.contains("name_trigram"));
        assert!(targets.contains("company.name_trigram"));
    }

    #[test]
    fn test_mapping_body() {
        let body = schema().to_index_body();
        let props = &body["mappings"]["properties"];
        assert_eq!(props["id"]["type"], "keyword");
        assert_eq!(props["name"]["analyzer"], "lowercase_keyword_analyzer");
        assert_eq!(props["name"]["fielddata"], true);
        assert_eq!(props["name"]["copy_to"], json!(["name_trigram"]));
        assert_eq!(props["net_cost"]["index"], false);
        assert_eq!(props["company"]["type"], "object");
        assert_eq!(props["company"]["properties"]["name_trigram"]["analyzer"], "trigram_analyzer");
        assert!(body["settings"]["analysis"]["tokenizer"]["trigram"].is_object());
    }

    #[test]
    fn test_mapping_hash_tracks_changes() {
        let a = schema();
        let b = schema();
        assert_eq!(a.mapping_hash(), b.mapping_hash());

        let c = schema().keyword("extra");
        assert_ne!(a.mapping_hash(), c.mapping_hash());
    }

    #[test]
    fn test_analyzer_names_round_trip() {
        for analyzer in [Analyzer::Standard, Analyzer::LowercaseKeyword, Analyzer::Trigram, Analyzer::English] {
            assert_eq!(Analyzer::from_name(analyzer.name()), Some(analyzer));
        }
    }
}
