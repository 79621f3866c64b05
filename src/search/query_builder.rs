// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store-neutral query tree.
//!
//! The composer produces a [`Query`]; [`crate::storage::InMemoryStore`]
//! evaluates it directly and [`super::EsTranslator`] renders it as
//! Elasticsearch query DSL. Leaves always name a physical, dotted field path
//! (`sector.ancestors.id`), never a filter key.
//!
//! ```rust
//! use datahub_search::search::{Query, QueryBuilder, QueryNode};
//!
//! let region = QueryBuilder::new()
//!     .term("uk_region.id", "0a3b5c2e-0000-0000-0000-000000000000")
//!     .term("uk_region.id", "9f1c7d1a-0000-0000-0000-000000000000")
//!     .build_or();
//!
//! let query = QueryBuilder::new()
//!     .term("archived", false)
//!     .push(region)
//!     .push(Query::range("created_on", Some("2017-01-01".into()), None))
//!     .build_and();
//! assert!(matches!(query.root, QueryNode::And(ref clauses) if clauses.len() == 3));
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub root: QueryNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    MatchAll,
    MatchNone,
    Field(FieldQuery),
    MultiMatch(MultiMatchQuery),
    And(Vec<QueryNode>),
    Or(Vec<QueryNode>),
    Not(Box<QueryNode>),
}

/// A condition on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldQuery {
    pub field: String,
    pub operator: FieldOperator,
    pub value: QueryValue,
    /// Relevance multiplier; only affects scoring
    pub boost: Option<f32>,
}

/// Every token of `text` must occur in at least one of `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMatchQuery {
    pub fields: Vec<String>,
    pub text: String,
}

/// How a [`FieldQuery`] compares its value. The DSL each one becomes is
/// given in brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldOperator {
    /// Whole value [term]
    Equals,
    /// One of a list [terms]
    In,
    /// At least one value present [exists]
    Exists,
    /// All analyzed tokens [match, operator and]
    Match,
    /// Adjacent tokens in order [match_phrase]
    Phrase,
    /// Last token as a prefix [match_phrase_prefix]
    Prefix,
    /// Inclusive bounds [range]
    Range,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Null,
    Text(String),
    Numeric(f64),
    Boolean(bool),
    Tags(Vec<String>),
    Range { gte: Option<String>, lte: Option<String> },
}

macro_rules! query_value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(impl From<$ty> for QueryValue {
            fn from($v: $ty) -> Self {
                $body
            }
        })*
    };
}

query_value_from! {
    &str => |v| QueryValue::Text(v.to_owned()),
    String => |v| QueryValue::Text(v),
    bool => |v| QueryValue::Boolean(v),
    i64 => |v| QueryValue::Numeric(v as f64),
    f64 => |v| QueryValue::Numeric(v),
}

impl From<QueryNode> for Query {
    fn from(root: QueryNode) -> Self {
        Query { root }
    }
}

impl Query {
    pub fn new(root: QueryNode) -> Self {
        root.into()
    }

    pub fn match_all() -> Self {
        QueryNode::MatchAll.into()
    }

    pub fn match_none() -> Self {
        QueryNode::MatchNone.into()
    }

    pub fn term(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        leaf(field, FieldOperator::Equals, value.into())
    }

    pub fn terms(field: impl Into<String>, values: Vec<String>) -> Self {
        leaf(field, FieldOperator::In, QueryValue::Tags(values))
    }

    pub fn exists(field: impl Into<String>) -> Self {
        leaf(field, FieldOperator::Exists, QueryValue::Null)
    }

    /// No value at all: absent, null or an empty list.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::exists(field).negate()
    }

    pub fn matches(field: impl Into<String>, text: impl Into<String>) -> Self {
        leaf(field, FieldOperator::Match, QueryValue::Text(text.into()))
    }

    pub fn phrase(field: impl Into<String>, text: impl Into<String>) -> Self {
        leaf(field, FieldOperator::Phrase, QueryValue::Text(text.into()))
    }

    pub fn prefix(field: impl Into<String>, text: impl Into<String>) -> Self {
        leaf(field, FieldOperator::Prefix, QueryValue::Text(text.into()))
    }

    /// Inclusive on both ends. Stores compare bounds as dates when they
    /// parse as dates, then as numbers, then as strings.
    pub fn range(field: impl Into<String>, gte: Option<String>, lte: Option<String>) -> Self {
        leaf(field, FieldOperator::Range, QueryValue::Range { gte, lte })
    }

    pub fn multi_match(fields: Vec<String>, text: impl Into<String>) -> Self {
        QueryNode::MultiMatch(MultiMatchQuery { fields, text: text.into() }).into()
    }

    /// No-op unless the root is a field condition.
    pub fn boost(mut self, boost: f32) -> Self {
        if let QueryNode::Field(field) = &mut self.root {
            field.boost = Some(boost);
        }
        self
    }

    pub fn and(self, other: Query) -> Self {
        QueryNode::And(vec![self.root, other.root]).into()
    }

    pub fn or(self, other: Query) -> Self {
        QueryNode::Or(vec![self.root, other.root]).into()
    }

    pub fn negate(self) -> Self {
        QueryNode::Not(Box::new(self.root)).into()
    }
}

fn leaf(field: impl Into<String>, operator: FieldOperator, value: QueryValue) -> Query {
    QueryNode::Field(FieldQuery { field: field.into(), operator, value, boost: None }).into()
}

/// Collects clauses and joins them once at the end.
///
/// A single clause is returned as is. With no clauses, `build_and` matches
/// every document and `build_or` matches none.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    clauses: Vec<QueryNode>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, query: Query) -> Self {
        self.clauses.push(query.root);
        self
    }

    pub fn term(self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(Query::term(field, value))
    }

    pub fn build_and(self) -> Query {
        self.join(QueryNode::MatchAll, QueryNode::And)
    }

    pub fn build_or(self) -> Query {
        self.join(QueryNode::MatchNone, QueryNode::Or)
    }

    fn join(mut self, empty: QueryNode, combine: fn(Vec<QueryNode>) -> QueryNode) -> Query {
        let root = match self.clauses.len() {
            0 => empty,
            1 => self.clauses.swap_remove(0),
            _ => combine(self.clauses),
        };
        root.into()
    }
}
