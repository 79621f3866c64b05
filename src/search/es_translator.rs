// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Elasticsearch Translator
//!
//! Translates the Query AST to Elasticsearch query DSL.
//!
//! # Mapping
//!
//! ```text
//! MatchAll / MatchNone     - {"match_all": {}} / {"match_none": {}}
//! Equals                   - {"term":  {field: {"value": v}}}
//! In                       - {"terms": {field: [v1, v2]}}
//! Exists                   - {"exists": {"field": field}}
//! Match                    - {"match": {field: {"query": t, "operator": "and"}}}
//! Phrase                   - {"match_phrase": {field: {"query": t}}}
//! Prefix                   - {"match_phrase_prefix": {field: {"query": t}}}
//! Range                    - {"range": {field: {"gte": a, "lte": b}}}
//! MultiMatch               - {"multi_match": {type: cross_fields, operator: and}}
//! And / Or / Not           - bool must / should (min 1) / must_not
//! ```

use serde_json::{json, Map, Value};

use super::query_builder::{FieldOperator, FieldQuery, MultiMatchQuery, Query, QueryNode, QueryValue};
use super::request::SearchRequest;

/// Elasticsearch query translator
pub struct EsTranslator;

impl EsTranslator {
    /// Translate a full request to a `_search` body
    pub fn translate_request(request: &SearchRequest) -> Value {
        let sort: Vec<Value> = request
            .sort
            .iter()
            .map(|key| json!({ key.field.clone(): { "order": key.order.as_str() } }))
            .collect();

        let mut body = json!({
            "query": Self::translate(&request.query),
            "sort": sort,
            "from": request.offset,
            "size": request.limit,
            "track_total_hits": true,
        });
        if let Some(cursor) = &request.search_after {
            body["from"] = json!(0);
            body["search_after"] = json!(cursor);
        }
        body
    }

    /// Translate Query AST to query DSL
    pub fn translate(query: &Query) -> Value {
        Self::translate_node(&query.root)
    }

    fn translate_node(node: &QueryNode) -> Value {
        match node {
            QueryNode::MatchAll => json!({ "match_all": {} }),
            QueryNode::MatchNone => json!({ "match_none": {} }),
            QueryNode::Field(field_query) => Self::translate_field(field_query),
            QueryNode::MultiMatch(mm) => Self::translate_multi_match(mm),
            QueryNode::And(nodes) => {
                let parts: Vec<Value> = nodes.iter().map(Self::translate_node).collect();
                json!({ "bool": { "must": parts } })
            }
            QueryNode::Or(nodes) => {
                let parts: Vec<Value> = nodes.iter().map(Self::translate_node).collect();
                json!({ "bool": { "should": parts, "minimum_should_match": 1 } })
            }
            QueryNode::Not(inner) => {
                json!({ "bool": { "must_not": [Self::translate_node(inner)] } })
            }
        }
    }

    fn translate_field(field: &FieldQuery) -> Value {
        let name = field.field.clone();

        let mut body = match (&field.operator, &field.value) {
            (FieldOperator::Equals, value) => {
                let mut clause = Map::new();
                clause.insert("value".into(), Self::scalar(value));
                return Self::wrap("term", name, clause, field.boost);
            }
            (FieldOperator::In, QueryValue::Tags(values)) => {
                return json!({ "terms": { name: values } });
            }
            (FieldOperator::Exists, _) => {
                return json!({ "exists": { "field": name } });
            }
            (FieldOperator::Range, QueryValue::Range { gte, lte }) => {
                let mut clause = Map::new();
                if let Some(gte) = gte {
                    clause.insert("gte".into(), json!(gte));
                }
                if let Some(lte) = lte {
                    clause.insert("lte".into(), json!(lte));
                }
                return Self::wrap("range", name, clause, None);
            }
            (_, value) => {
                let mut clause = Map::new();
                clause.insert("query".into(), Self::scalar(value));
                clause
            }
        };

        let kind = match field.operator {
            FieldOperator::Match => {
                body.insert("operator".into(), json!("and"));
                "match"
            }
            FieldOperator::Phrase => "match_phrase",
            FieldOperator::Prefix => "match_phrase_prefix",
            // Remaining combinations carry an unexpected value shape; an
            // analyzed match is the closest rendering.
            _ => "match",
        };
        Self::wrap(kind, name, body, field.boost)
    }

    fn translate_multi_match(mm: &MultiMatchQuery) -> Value {
        json!({
            "multi_match": {
                "query": mm.text,
                "fields": mm.fields,
                "type": "cross_fields",
                "operator": "and",
            }
        })
    }

    fn wrap(kind: &str, field: String, mut clause: Map<String, Value>, boost: Option<f32>) -> Value {
        if let Some(boost) = boost {
            clause.insert("boost".into(), json!(boost));
        }
        let mut inner = Map::new();
        inner.insert(field, Value::Object(clause));
        let mut outer = Map::new();
        outer.insert(kind.to_string(), Value::Object(inner));
        Value::Object(outer)
    }

    fn scalar(value: &QueryValue) -> Value {
        match value {
            QueryValue::Null => Value::Null,
            QueryValue::Text(text) => json!(text),
            QueryValue::Numeric(num) => json!(num),
            QueryValue::Boolean(b) => json!(b),
            QueryValue::Tags(values) => json!(values.join(" ")),
            QueryValue::Range { gte, lte } => json!({ "gte": gte, "lte": lte }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::request::SortKey;

    #[test]
    fn test_term() {
        let q = Query::term("uk_region.id", "abc");
        assert_eq!(
            EsTranslator::translate(&q),
            json!({"term": {"uk_region.id": {"value": "abc"}}})
        );
    }

    #[test]
    fn test_boolean_term() {
        let q = Query::term("archived", false);
        assert_eq!(
            EsTranslator::translate(&q),
            json!({"term": {"archived": {"value": false}}})
        );
    }

    #[test]
    fn test_terms() {
        let q = Query::terms("status", vec!["draft".into(), "paid".into()]);
        assert_eq!(
            EsTranslator::translate(&q),
            json!({"terms": {"status": ["draft", "paid"]}})
        );
    }

    #[test]
    fn test_missing() {
        let q = Query::missing("headquarter_type");
        assert_eq!(
            EsTranslator::translate(&q),
            json!({"bool": {"must_not": [{"exists": {"field": "headquarter_type"}}]}})
        );
    }

    #[test]
    fn test_match_uses_and_operator() {
        let q = Query::matches("name", "abc defg");
        assert_eq!(
            EsTranslator::translate(&q),
            json!({"match": {"name": {"query": "abc defg", "operator": "and"}}})
        );
    }

    #[test]
    fn test_boosted_phrase() {
        let q = Query::phrase("name", "abc").boost(2.0);
        assert_eq!(
            EsTranslator::translate(&q),
            json!({"match_phrase": {"name": {"query": "abc", "boost": 2.0}}})
        );
    }

    #[test]
    fn test_range_skips_open_bounds() {
        let q = Query::range("created_on", Some("2017-01-01".into()), None);
        assert_eq!(
            EsTranslator::translate(&q),
            json!({"range": {"created_on": {"gte": "2017-01-01"}}})
        );
    }

    #[test]
    fn test_or_requires_one_clause() {
        let q = Query::term("a", "1").or(Query::term("b", "2"));
        let out = EsTranslator::translate(&q);
        assert_eq!(out["bool"]["minimum_should_match"], json!(1));
        assert_eq!(out["bool"]["should"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_multi_match() {
        let q = Query::multi_match(vec!["name".into(), "name_trigram".into()], "abc");
        let out = EsTranslator::translate(&q);
        assert_eq!(out["multi_match"]["type"], json!("cross_fields"));
        assert_eq!(out["multi_match"]["operator"], json!("and"));
    }

    #[test]
    fn test_request_body() {
        let request = SearchRequest::new(Query::match_all())
            .with_sort(vec![SortKey::score(), SortKey::asc("id")])
            .with_window(20, 5);
        let body = EsTranslator::translate_request(&request);
        assert_eq!(body["from"], json!(20));
        assert_eq!(body["size"], json!(5));
        assert_eq!(
            body["sort"],
            json!([{"_score": {"order": "desc"}}, {"id": {"order": "asc"}}])
        );
        assert_eq!(body["query"], json!({"match_all": {}}));
        assert!(body.get("search_after").is_none());
    }

    #[test]
    fn test_search_after_replaces_offset() {
        let request = SearchRequest::new(Query::match_all())
            .with_window(10_000, 500)
            .with_search_after(vec![json!("acme"), json!("a1")]);
        let body = EsTranslator::translate_request(&request);
        assert_eq!(body["from"], json!(0));
        assert_eq!(body["size"], json!(500));
        assert_eq!(body["search_after"], json!(["acme", "a1"]));
    }
}
