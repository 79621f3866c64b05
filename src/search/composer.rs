// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Composer
//!
//! Single-pass compilation of a client [`QuerySpec`] into a [`SearchRequest`]
//! against one app's document schema.
//!
//! # Filter kinds
//!
//! ```text
//! archived=true            exact      → term(archived, true)
//! uk_region=<uuid>         remapped   → term(uk_region.id, <uuid>)
//! name=abc                 composite  → match(name) OR match(name_trigram) OR ...
//! sector_descends=<uuid>   hierarchy  → term(sector.id) OR term(sector.ancestors.id)
//! created_on_after=2020-…  range      → range(created_on, gte)
//! headquarter_type=null    null       → NOT exists(headquarter_type.id)
//! ```
//!
//! Every clause is ANDed with the others and with the caller's permission
//! filter. Unknown keys and malformed values are reported, never dropped.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use super::query_builder::{Query, QueryBuilder};
use super::request::{SearchRequest, SortKey, SortOrder};
use crate::config::SearchConfig;
use crate::permissions::PermissionFilter;
use crate::schema::{DocumentSchema, FieldType};

/// Suffixes of the range filters a date field gets.
pub const AFTER_SUFFIX: &str = "_after";
pub const BEFORE_SUFFIX: &str = "_before";

/// Key that validation errors for the sort expression are reported under.
pub const SORTBY_FIELD: &str = "sortby";

/// Client-caused problem with one request field.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A filter value as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Many(Vec<FilterValue>),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FilterValue::Null, Into::into)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::Many(values.into_iter().map(Into::into).collect())
    }
}

/// Structured search input: free text, filters, sort and window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub sortby: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn sortby(mut self, sortby: impl Into<String>) -> Self {
        self.sortby = Some(sortby.into());
        self
    }

    pub fn window(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// How one logical filter key maps onto document fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    /// One physical field (same name or remapped)
    Field(String),
    /// Several physical fields, OR-combined
    Composite(Vec<String>),
    /// Object with `id` and materialized `ancestors.id`
    Descends(String),
    /// Lower bound on a date field
    After(String),
    /// Upper bound on a date field
    Before(String),
}

impl FilterRule {
    /// Physical paths this rule reads.
    pub fn targets(&self) -> Vec<String> {
        match self {
            FilterRule::Field(f) | FilterRule::After(f) | FilterRule::Before(f) => vec![f.clone()],
            FilterRule::Composite(fields) => fields.clone(),
            FilterRule::Descends(f) => vec![format!("{}.id", f), format!("{}.ancestors.id", f)],
        }
    }
}

/// Per-app query surface: filter keys, free-text fields and sort keys.
#[derive(Debug, Clone, Default)]
pub struct QueryRules {
    filters: BTreeMap<String, FilterRule>,
    search_fields: Vec<String>,
    phrase_field: Option<String>,
    sort_fields: Vec<String>,
}

impl QueryRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on a field under its own name.
    pub fn exact(self, field: &str) -> Self {
        self.rule(field, FilterRule::Field(field.to_string()))
    }

    /// Filter key that reads a differently named field.
    pub fn remap(self, key: &str, field: &str) -> Self {
        self.rule(key, FilterRule::Field(field.to_string()))
    }

    pub fn composite(self, key: &str, fields: &[&str]) -> Self {
        let fields = fields.iter().map(|f| (*f).to_string()).collect();
        self.rule(key, FilterRule::Composite(fields))
    }

    pub fn descends(self, key: &str, field: &str) -> Self {
        self.rule(key, FilterRule::Descends(field.to_string()))
    }

    /// `<field>_after` and `<field>_before` on a date field.
    pub fn date_range(self, field: &str) -> Self {
        self.rule(&format!("{}{}", field, AFTER_SUFFIX), FilterRule::After(field.to_string()))
            .rule(&format!("{}{}", field, BEFORE_SUFFIX), FilterRule::Before(field.to_string()))
    }

    pub fn rule(mut self, key: &str, rule: FilterRule) -> Self {
        self.filters.insert(key.to_string(), rule);
        self
    }

    /// Fields scored for free text.
    pub fn search_fields(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Field whose exact phrase gets a relevance boost.
    pub fn phrase_field(mut self, field: &str) -> Self {
        self.phrase_field = Some(field.to_string());
        self
    }

    pub fn sort_fields(mut self, fields: &[&str]) -> Self {
        self.sort_fields = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    pub fn filter(&self, key: &str) -> Option<&FilterRule> {
        self.filters.get(key)
    }

    pub fn filter_keys(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn get_search_fields(&self) -> &[String] {
        &self.search_fields
    }

    pub fn get_sort_fields(&self) -> &[String] {
        &self.sort_fields
    }

    /// Every path the rules read must exist in `schema` with a filterable
    /// type, and every sort key must be sortable.
    pub fn check_against(&self, schema: &DocumentSchema) -> Result<(), String> {
        for (key, rule) in &self.filters {
            for target in rule.targets() {
                match schema.field(&target) {
                    None => return Err(format!("filter '{}' reads unknown field '{}'", key, target)),
                    Some(spec) if matches!(spec.field_type, FieldType::Object(_)) => {
                        return Err(format!("filter '{}' reads object field '{}'", key, target))
                    }
                    Some(spec) if !spec.index => {
                        return Err(format!("filter '{}' reads unindexed field '{}'", key, target))
                    }
                    Some(_) => {}
                }
            }
            if let FilterRule::After(f) | FilterRule::Before(f) = rule {
                if !matches!(schema.field(f).map(|s| &s.field_type), Some(FieldType::Date)) {
                    return Err(format!("range filter '{}' needs a date field", key));
                }
            }
        }
        for field in self.search_fields.iter().chain(self.phrase_field.iter()) {
            if schema.field(field).is_none() {
                return Err(format!("search field '{}' is not in the schema", field));
            }
        }
        for field in &self.sort_fields {
            if !schema.is_sortable(field) {
                return Err(format!("sort field '{}' is not sortable", field));
            }
        }
        Ok(())
    }
}

/// Outcome of composition.
#[derive(Debug, Clone, PartialEq)]
pub enum Composed {
    /// Run this against the store
    Request(SearchRequest),
    /// The permission filter excludes everything; answer without the store
    MatchNothing,
}

/// Compiles [`QuerySpec`]s for one app.
pub struct Composer<'a> {
    schema: &'a DocumentSchema,
    rules: &'a QueryRules,
    config: &'a SearchConfig,
}

impl<'a> Composer<'a> {
    pub fn new(schema: &'a DocumentSchema, rules: &'a QueryRules, config: &'a SearchConfig) -> Self {
        Self { schema, rules, config }
    }

    /// Compose `spec` scoped by `permission`.
    ///
    /// Validation runs first, so an excluded caller still learns about
    /// malformed input.
    pub fn compose(
        &self,
        spec: &QuerySpec,
        permission: &PermissionFilter,
    ) -> Result<Composed, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut builder = QueryBuilder::new();

        for (key, value) in &spec.filters {
            match self.filter_query(key, value) {
                Ok(query) => builder = builder.push(query),
                Err(err) => errors.push(err),
            }
        }

        let term = spec.term.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if let Some(term) = term {
            builder = builder.push(self.text_query(term));
        }

        let sort = match self.sort(spec.sortby.as_deref(), term.is_some()) {
            Ok(sort) => sort,
            Err(err) => {
                errors.push(err);
                Vec::new()
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        match permission {
            PermissionFilter::Unrestricted => {}
            PermissionFilter::ExcludeAll => return Ok(Composed::MatchNothing),
            PermissionFilter::AnyOf(rules) if rules.is_empty() => return Ok(Composed::MatchNothing),
            PermissionFilter::AnyOf(rules) => {
                let any = rules
                    .iter()
                    .fold(QueryBuilder::new(), |b, rule| b.term(rule.field.clone(), rule.value.clone()))
                    .build_or();
                builder = builder.push(any);
            }
        }

        let limit = spec.limit.unwrap_or(self.config.default_page_size);
        Ok(Composed::Request(
            SearchRequest::new(builder.build_and())
                .with_sort(sort)
                .with_window(spec.offset, limit),
        ))
    }

    fn filter_query(&self, key: &str, value: &FilterValue) -> Result<Query, ValidationError> {
        let rule = self
            .rules
            .filter(key)
            .ok_or_else(|| ValidationError::new(key, "Unknown filter."))?;

        let values = flatten(key, value)?;

        match rule {
            FilterRule::Field(field) => self.any_value(&values, |v| self.leaf(key, field, v)),
            FilterRule::Composite(fields) => self.any_value(&values, |v| {
                fields
                    .iter()
                    .map(|field| self.leaf(key, field, v))
                    .collect::<Result<Vec<_>, _>>()
                    .map(|queries| queries.into_iter().fold(QueryBuilder::new(), QueryBuilder::push).build_or())
            }),
            FilterRule::Descends(field) => self.any_value(&values, |v| {
                let id = uuid_value(key, v)?;
                Ok(Query::term(format!("{}.id", field), id.clone())
                    .or(Query::term(format!("{}.ancestors.id", field), id)))
            }),
            FilterRule::After(field) => {
                let bound = single_date(key, &values)?;
                Ok(Query::range(field.clone(), Some(bound), None))
            }
            FilterRule::Before(field) => {
                let bound = single_date(key, &values)?;
                Ok(Query::range(field.clone(), None, Some(bound)))
            }
        }
    }

    /// OR over the values of a set filter.
    fn any_value<F>(&self, values: &[&FilterValue], leaf: F) -> Result<Query, ValidationError>
    where
        F: Fn(&FilterValue) -> Result<Query, ValidationError>,
    {
        let mut builder = QueryBuilder::new();
        for value in values {
            builder = builder.push(leaf(value)?);
        }
        Ok(builder.build_or())
    }

    /// Condition for one value on one physical field, typed by the schema.
    fn leaf(&self, key: &str, field: &str, value: &FilterValue) -> Result<Query, ValidationError> {
        let spec = self
            .schema
            .field(field)
            .ok_or_else(|| ValidationError::new(key, "Unknown filter."))?;

        if matches!(value, FilterValue::Null) {
            return Ok(Query::missing(field));
        }

        match &spec.field_type {
            FieldType::Boolean => Ok(Query::term(field, bool_value(key, value)?)),
            FieldType::Integer => Ok(Query::term(field, int_value(key, value)?)),
            FieldType::Date => {
                let date = date_value(key, value)?;
                Ok(Query::range(field, Some(date.clone()), Some(date)))
            }
            FieldType::Keyword if is_id_path(field) => Ok(Query::term(field, uuid_value(key, value)?)),
            FieldType::Keyword => Ok(Query::term(field, text_value(key, value)?)),
            FieldType::Text(_) => Ok(Query::matches(field, text_value(key, value)?)),
            FieldType::Object(_) => Err(ValidationError::new(key, "Field cannot be filtered on.")),
        }
    }

    /// Phrase on the name field (boosted) or every word across the search
    /// fields.
    fn text_query(&self, term: &str) -> Query {
        let fields = self.rules.search_fields.clone();
        let multi = Query::multi_match(fields, term);
        match &self.rules.phrase_field {
            Some(field) => Query::phrase(field.clone(), term).boost(2.0).or(multi),
            None => multi,
        }
    }

    fn sort(&self, sortby: Option<&str>, has_term: bool) -> Result<Vec<SortKey>, ValidationError> {
        let Some(sortby) = sortby.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(if has_term {
                vec![SortKey::score(), SortKey::asc("id")]
            } else {
                vec![SortKey::asc("id")]
            });
        };

        let (field, order) = match sortby.split_once(':') {
            None => (sortby, SortOrder::Asc),
            Some((field, "asc")) => (field, SortOrder::Asc),
            Some((field, "desc")) => (field, SortOrder::Desc),
            Some(_) => return Err(ValidationError::new(SORTBY_FIELD, format!("Invalid sort direction in '{}'.", sortby))),
        };

        if field != "id" && !self.rules.sort_fields.iter().any(|f| f == field) {
            return Err(ValidationError::new(SORTBY_FIELD, format!("'{}' is not a valid sort field.", field)));
        }

        let primary = SortKey { field: field.to_string(), order };
        if field == "id" {
            return Ok(vec![primary]);
        }
        Ok(vec![primary, SortKey::asc("id")])
    }
}

/// Prefix query used by autocomplete on a suggestion field.
pub fn autocomplete_query(field: &str, term: &str) -> Query {
    Query::prefix(field, term.trim().to_lowercase())
}

fn flatten<'v>(key: &str, value: &'v FilterValue) -> Result<Vec<&'v FilterValue>, ValidationError> {
    match value {
        FilterValue::Many(items) if items.is_empty() => Err(ValidationError::new(key, "This list may not be empty.")),
        FilterValue::Many(items) => items
            .iter()
            .map(|item| match item {
                FilterValue::Many(_) => Err(ValidationError::new(key, "Nested lists are not supported.")),
                other => Ok(other),
            })
            .collect(),
        other => Ok(vec![other]),
    }
}

fn is_id_path(field: &str) -> bool {
    field == "id" || field.ends_with(".id")
}

fn text_value(key: &str, value: &FilterValue) -> Result<String, ValidationError> {
    match value {
        FilterValue::Text(s) => Ok(s.clone()),
        FilterValue::Int(i) => Ok(i.to_string()),
        FilterValue::Bool(b) => Ok(b.to_string()),
        _ => Err(ValidationError::new(key, "Not a valid string.")),
    }
}

fn uuid_value(key: &str, value: &FilterValue) -> Result<String, ValidationError> {
    match value {
        FilterValue::Text(s) => Uuid::parse_str(s.trim())
            .map(|id| id.to_string())
            .map_err(|_| ValidationError::new(key, format!("'{}' is not a valid UUID.", s))),
        _ => Err(ValidationError::new(key, "Must be a valid UUID.")),
    }
}

fn bool_value(key: &str, value: &FilterValue) -> Result<bool, ValidationError> {
    match value {
        FilterValue::Bool(b) => Ok(*b),
        FilterValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ValidationError::new(key, "Must be a valid boolean.")),
        },
        FilterValue::Int(1) => Ok(true),
        FilterValue::Int(0) => Ok(false),
        _ => Err(ValidationError::new(key, "Must be a valid boolean.")),
    }
}

fn int_value(key: &str, value: &FilterValue) -> Result<i64, ValidationError> {
    match value {
        FilterValue::Int(i) => Ok(*i),
        FilterValue::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| ValidationError::new(key, "A valid integer is required.")),
        _ => Err(ValidationError::new(key, "A valid integer is required.")),
    }
}

fn date_value(key: &str, value: &FilterValue) -> Result<String, ValidationError> {
    let FilterValue::Text(s) = value else {
        return Err(ValidationError::new(key, "Date has wrong format."));
    };
    let s = s.trim();
    let valid = DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok();
    if valid {
        Ok(s.to_string())
    } else {
        Err(ValidationError::new(key, "Date has wrong format. Use YYYY-MM-DD or RFC 3339."))
    }
}

fn single_date(key: &str, values: &[&FilterValue]) -> Result<String, ValidationError> {
    match values {
        [value] => date_value(key, value),
        _ => Err(ValidationError::new(key, "Expected a single date.")),
    }
}
