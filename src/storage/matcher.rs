//! Query evaluation for the in-memory store.
//!
//! Documents are matched against the [`QueryNode`] AST using the field
//! table derived from the index mapping: analyzed fields are compared on
//! their token streams, everything else on raw values. `copy_to` values are
//! materialized at write time in [`StoredDoc::copies`].

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::analysis::{analyze, contains_sequence, matches_phrase_prefix};
use crate::document::values_at_path;
use crate::schema::Analyzer;
use crate::search::{FieldOperator, FieldQuery, MultiMatchQuery, QueryNode, QueryValue, SortKey, SortOrder};

/// Field definition as read back from a mapping body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldInfo {
    pub type_name: String,
    pub analyzer: Option<Analyzer>,
    pub copy_to: Vec<String>,
}

pub(crate) type FieldTable = HashMap<String, FieldInfo>;

/// Flatten `{"properties": {...}}` into dotted paths.
pub(crate) fn field_table(mapping: &Value) -> FieldTable {
    let mut out = FieldTable::new();
    if let Some(props) = mapping.get("properties").and_then(Value::as_object) {
        walk("", props, &mut out);
    }
    out
}

fn walk(prefix: &str, props: &Map<String, Value>, out: &mut FieldTable) {
    for (name, prop) in props {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        let type_name = prop
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("object")
            .to_string();
        let analyzer = match type_name.as_str() {
            "text" => Some(
                prop.get("analyzer")
                    .and_then(Value::as_str)
                    .and_then(Analyzer::from_name)
                    .unwrap_or(Analyzer::Standard),
            ),
            _ => None,
        };
        let copy_to = match prop.get("copy_to") {
            Some(Value::String(target)) => vec![target.clone()],
            Some(Value::Array(targets)) => targets
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        if let Some(children) = prop.get("properties").and_then(Value::as_object) {
            walk(&path, children, out);
        }
        out.insert(path, FieldInfo { type_name, analyzer, copy_to });
    }
}

/// Describe the first incompatible field between two mappings, if any.
/// Added fields are compatible; changed types or analyzers are not.
pub(crate) fn mapping_conflict(current: &FieldTable, proposed: &FieldTable) -> Option<String> {
    let mut paths: Vec<&String> = proposed.keys().collect();
    paths.sort();
    for path in paths {
        let (Some(old), Some(new)) = (current.get(path), proposed.get(path)) else {
            continue;
        };
        if old.type_name != new.type_name {
            return Some(format!(
                "field '{}' cannot change type from {} to {}",
                path, old.type_name, new.type_name
            ));
        }
        if old.analyzer != new.analyzer {
            return Some(format!("field '{}' cannot change analyzer", path));
        }
    }
    None
}

/// A document as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredDoc {
    pub id: String,
    pub source: Map<String, Value>,
    /// Values written through `copy_to`, keyed by target path
    pub copies: HashMap<String, Vec<Value>>,
}

impl StoredDoc {
    pub fn new(id: String, source: Map<String, Value>, table: &FieldTable) -> Self {
        let mut copies: HashMap<String, Vec<Value>> = HashMap::new();
        for (path, info) in table {
            if info.copy_to.is_empty() {
                continue;
            }
            let values: Vec<Value> = values_at_path(&source, path).into_iter().cloned().collect();
            for target in &info.copy_to {
                copies
                    .entry(target.clone())
                    .or_default()
                    .extend(values.iter().cloned());
            }
        }
        Self { id, source, copies }
    }

    pub fn values(&self, path: &str) -> Vec<&Value> {
        let mut values = values_at_path(&self.source, path);
        if let Some(copied) = self.copies.get(path) {
            values.extend(copied.iter());
        }
        values
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Relevance score of `doc` for `node`, or `None` when it does not match.
pub(crate) fn evaluate(node: &QueryNode, doc: &StoredDoc, table: &FieldTable) -> Option<f32> {
    match node {
        QueryNode::MatchAll => Some(1.0),
        QueryNode::MatchNone => None,
        QueryNode::Field(q) => evaluate_field(q, doc, table),
        QueryNode::MultiMatch(mm) => evaluate_multi_match(mm, doc, table),
        QueryNode::And(nodes) => nodes
            .iter()
            .map(|n| evaluate(n, doc, table))
            .sum::<Option<f32>>(),
        QueryNode::Or(nodes) => {
            let scores: Vec<f32> = nodes.iter().filter_map(|n| evaluate(n, doc, table)).collect();
            if scores.is_empty() {
                None
            } else {
                Some(scores.iter().sum())
            }
        }
        QueryNode::Not(inner) => match evaluate(inner, doc, table) {
            Some(_) => None,
            None => Some(0.0),
        },
    }
}

fn evaluate_field(q: &FieldQuery, doc: &StoredDoc, table: &FieldTable) -> Option<f32> {
    let analyzer = table.get(&q.field).and_then(|info| info.analyzer);
    let values = doc.values(&q.field);
    let boost = q.boost.unwrap_or(1.0);

    let matched = match (&q.operator, &q.value) {
        (FieldOperator::Exists, _) => !values.is_empty(),
        (FieldOperator::Equals, expected) => values.iter().any(|v| term_matches(v, expected, analyzer)),
        (FieldOperator::In, QueryValue::Tags(tags)) => values.iter().any(|v| {
            tags.iter()
                .any(|t| term_matches(v, &QueryValue::Text(t.clone()), analyzer))
        }),
        (FieldOperator::Range, QueryValue::Range { gte, lte }) => {
            values.iter().any(|v| in_range(v, gte.as_deref(), lte.as_deref()))
        }
        (FieldOperator::Match, QueryValue::Text(text)) => match_all_tokens(&values, text, analyzer),
        (FieldOperator::Phrase, QueryValue::Text(text)) => {
            let needle = tokens(text, analyzer);
            values
                .iter()
                .filter_map(|v| as_text(v))
                .any(|v| contains_sequence(&tokens(&v, analyzer), &needle))
        }
        (FieldOperator::Prefix, QueryValue::Text(text)) => {
            let needle = tokens(text, analyzer);
            values
                .iter()
                .filter_map(|v| as_text(v))
                .any(|v| matches_phrase_prefix(&tokens(&v, analyzer), &needle))
        }
        _ => false,
    };
    matched.then_some(boost)
}

/// Every query token must appear in one of `fields`; tokens are produced
/// per field with that field's analyzer.
fn evaluate_multi_match(mm: &MultiMatchQuery, doc: &StoredDoc, table: &FieldTable) -> Option<f32> {
    let words: Vec<&str> = mm.text.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let mut score = 0.0;
    for word in words {
        let hits = mm
            .fields
            .iter()
            .filter(|field| {
                let analyzer = table.get(field.as_str()).and_then(|info| info.analyzer);
                match_all_tokens(&doc.values(field), word, analyzer)
            })
            .count();
        if hits == 0 {
            return None;
        }
        score += hits as f32;
    }
    Some(score)
}

fn tokens(text: &str, analyzer: Option<Analyzer>) -> Vec<String> {
    match analyzer {
        Some(analyzer) => analyze(analyzer, text),
        None => vec![text.to_string()],
    }
}

fn match_all_tokens(values: &[&Value], text: &str, analyzer: Option<Analyzer>) -> bool {
    let needle = tokens(text, analyzer);
    if needle.is_empty() {
        return false;
    }
    let haystack: Vec<String> = values
        .iter()
        .filter_map(|v| as_text(v))
        .flat_map(|v| tokens(&v, analyzer))
        .collect();
    needle.iter().all(|t| haystack.contains(t))
}

fn term_matches(value: &Value, expected: &QueryValue, analyzer: Option<Analyzer>) -> bool {
    match expected {
        QueryValue::Text(s) => match analyzer {
            // term queries on analyzed fields compare against indexed tokens
            Some(analyzer) => as_text(value).is_some_and(|v| analyze(analyzer, &v).contains(s)),
            None => as_text(value).as_deref() == Some(s.as_str()),
        },
        QueryValue::Numeric(n) => match value {
            Value::Number(v) => v.as_f64() == Some(*n),
            Value::String(v) => v.parse::<f64>().ok() == Some(*n),
            _ => false,
        },
        QueryValue::Boolean(b) => match value {
            Value::Bool(v) => v == b,
            Value::String(v) => v.parse::<bool>().ok() == Some(*b),
            _ => false,
        },
        _ => false,
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn compare_to_bound(value: &Value, bound: &str) -> Option<Ordering> {
    if let (Some(v), Ok(b)) = (value.as_f64(), bound.parse::<f64>()) {
        return v.partial_cmp(&b);
    }
    let text = as_text(value)?;
    match (parse_datetime(&text), parse_datetime(bound)) {
        (Some(v), Some(b)) => Some(v.cmp(&b)),
        _ => Some(text.as_str().cmp(bound)),
    }
}

fn in_range(value: &Value, gte: Option<&str>, lte: Option<&str>) -> bool {
    let lower_ok = gte.map_or(true, |b| {
        matches!(compare_to_bound(value, b), Some(Ordering::Greater | Ordering::Equal))
    });
    let upper_ok = lte.map_or(true, |b| {
        matches!(compare_to_bound(value, b), Some(Ordering::Less | Ordering::Equal))
    });
    lower_ok && upper_ok
}

/// Sortable projection of a field value.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum SortValue {
    Bool(bool),
    Num(f64),
    Str(String),
}

fn sort_value(doc: &StoredDoc, key: &SortKey, table: &FieldTable) -> Option<SortValue> {
    let analyzer = table.get(&key.field).and_then(|info| info.analyzer);
    let mut candidates: Vec<SortValue> = Vec::new();
    for value in doc.values(&key.field) {
        match value {
            Value::Bool(b) => candidates.push(SortValue::Bool(*b)),
            Value::Number(n) => candidates.extend(n.as_f64().map(SortValue::Num)),
            Value::String(s) => match analyzer {
                Some(analyzer) => candidates.extend(analyze(analyzer, s).into_iter().map(SortValue::Str)),
                None => candidates.push(SortValue::Str(s.clone())),
            },
            _ => {}
        }
    }
    let pick = |a: SortValue, b: SortValue| match (key.order, a.partial_cmp(&b)) {
        (SortOrder::Asc, Some(Ordering::Greater)) => b,
        (SortOrder::Desc, Some(Ordering::Less)) => b,
        _ => a,
    };
    candidates.into_iter().reduce(pick)
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

/// Missing values sort last in both directions.
fn compare_values(a: Option<SortValue>, b: Option<SortValue>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => directed(x.partial_cmp(&y).unwrap_or(Ordering::Equal), order),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_scores(a: f64, b: f64, order: SortOrder) -> Ordering {
    directed(a.partial_cmp(&b).unwrap_or(Ordering::Equal), order)
}

/// Order two scored documents by `sort`. Falls back to document id so the
/// order is total.
pub(crate) fn compare(
    a: (&StoredDoc, f32),
    b: (&StoredDoc, f32),
    sort: &[SortKey],
    table: &FieldTable,
) -> Ordering {
    for key in sort {
        let ordering = if key.is_score() {
            compare_scores(f64::from(a.1), f64::from(b.1), key.order)
        } else {
            compare_values(sort_value(a.0, key, table), sort_value(b.0, key, table), key.order)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.0.id.cmp(&b.0.id)
}

/// The values a hit was sorted on, one per key; missing values are null.
pub(crate) fn sort_values(doc: &StoredDoc, score: f32, sort: &[SortKey], table: &FieldTable) -> Vec<Value> {
    sort.iter()
        .map(|key| {
            if key.is_score() {
                return json!(score);
            }
            match sort_value(doc, key, table) {
                Some(SortValue::Bool(b)) => Value::Bool(b),
                Some(SortValue::Num(n)) => json!(n),
                Some(SortValue::Str(s)) => Value::String(s),
                None => Value::Null,
            }
        })
        .collect()
}

fn cursor_value(value: &Value) -> Option<SortValue> {
    match value {
        Value::Bool(b) => Some(SortValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(SortValue::Num),
        Value::String(s) => Some(SortValue::Str(s.clone())),
        _ => None,
    }
}

/// Whether a hit sorts strictly after `cursor`, the [`sort_values`] of an
/// earlier hit.
pub(crate) fn is_after(doc: &StoredDoc, score: f32, sort: &[SortKey], table: &FieldTable, cursor: &[Value]) -> bool {
    for (key, bound) in sort.iter().zip(cursor) {
        let ordering = if key.is_score() {
            compare_scores(f64::from(score), bound.as_f64().unwrap_or(0.0), key.order)
        } else {
            compare_values(sort_value(doc, key, table), cursor_value(bound), key.order)
        };
        if ordering != Ordering::Equal {
            return ordering == Ordering::Greater;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{id_name_partial, DocumentSchema};
    use crate::search::Query;
    use serde_json::json;

    fn table() -> FieldTable {
        let schema = DocumentSchema::new("company")
            .keyword("id")
            .text("name", Analyzer::LowercaseKeyword)
            .text("name_trigram", Analyzer::Trigram)
            .copy_to("name", "name_trigram")
            .boolean("archived")
            .integer("total_cost")
            .keyword("total_cost_string")
            .copy_to("total_cost", "total_cost_string")
            .date("created_on")
            .field_spec(id_name_partial("contact"));
        field_table(&schema.to_mapping())
    }

    fn doc(id: &str, source: Value) -> StoredDoc {
        let Value::Object(map) = source else {
            panic!("object expected")
        };
        StoredDoc::new(id.to_string(), map, &table())
    }

    fn matches(query: Query, d: &StoredDoc) -> bool {
        evaluate(&query.root, d, &table()).is_some()
    }

    #[test]
    fn test_field_table_paths() {
        let t = table();
        assert_eq!(t["name"].analyzer, Some(Analyzer::LowercaseKeyword));
        assert_eq!(t["contact.name"].copy_to, vec!["contact.name_trigram".to_string()]);
        assert_eq!(t["contact"].type_name, "object");
        assert_eq!(t["id"].analyzer, None);
    }

    #[test]
    fn test_copy_to_materialized() {
        let d = doc("1", json!({"name": "Abc Defg", "total_cost": 2000, "contact": {"name": "Ada Lovelace"}}));
        assert_eq!(d.values("name_trigram"), vec![&json!("Abc Defg")]);
        assert_eq!(d.values("contact.name_trigram"), vec![&json!("Ada Lovelace")]);
        assert!(matches(Query::term("total_cost_string", "2000"), &d));
    }

    #[test]
    fn test_term_on_lowercase_keyword_uses_token() {
        let d = doc("1", json!({"name": "Abc Defg"}));
        assert!(matches(Query::term("name", "abc defg"), &d));
        assert!(!matches(Query::term("name", "Abc Defg"), &d));
    }

    #[test]
    fn test_match_on_trigram_needs_three_chars() {
        let d = doc("1", json!({"name": "Whatever Ltd"}));
        assert!(matches(Query::matches("name_trigram", "what"), &d));
        assert!(!matches(Query::matches("name_trigram", "wh"), &d));
        assert!(!matches(Query::matches("name", "wh"), &d));
    }

    #[test]
    fn test_missing_and_exists() {
        let d = doc("1", json!({"name": "x", "archived": null}));
        assert!(matches(Query::missing("archived"), &d));
        assert!(matches(Query::exists("name"), &d));
    }

    #[test]
    fn test_boolean_and_range() {
        let d = doc("1", json!({"archived": true, "created_on": "2017-06-01T10:00:00+00:00"}));
        assert!(matches(Query::term("archived", true), &d));
        assert!(!matches(Query::term("archived", false), &d));
        assert!(matches(Query::range("created_on", Some("2017-06-01".into()), None), &d));
        assert!(!matches(Query::range("created_on", None, Some("2017-06-01".into())), &d));
    }

    #[test]
    fn test_multi_match_requires_every_word() {
        let fields = vec!["name".to_string(), "name_trigram".to_string()];
        let d = doc("1", json!({"name": "abc defg ltd"}));
        assert!(matches(Query::multi_match(fields.clone(), "abc defg"), &d));
        assert!(!matches(Query::multi_match(fields, "abc xyz"), &d));
    }

    #[test]
    fn test_missing_values_sort_last() {
        let t = table();
        let a = doc("a", json!({"name": "zed"}));
        let b = doc("b", json!({}));
        let asc = [SortKey::asc("name")];
        let desc = [SortKey::desc("name")];
        assert_eq!(compare((&a, 0.0), (&b, 0.0), &asc, &t), Ordering::Less);
        assert_eq!(compare((&a, 0.0), (&b, 0.0), &desc, &t), Ordering::Less);
    }

    #[test]
    fn test_sort_falls_back_to_id() {
        let t = table();
        let a = doc("a", json!({"name": "same"}));
        let b = doc("b", json!({"name": "Same"}));
        assert_eq!(compare((&b, 0.0), (&a, 0.0), &[SortKey::asc("name")], &t), Ordering::Greater);
    }

    #[test]
    fn test_conflict_detection() {
        let current = table();
        let mut proposed = table();
        proposed.insert(
            "extra".into(),
            FieldInfo { type_name: "keyword".into(), analyzer: None, copy_to: vec![] },
        );
        assert!(mapping_conflict(&current, &proposed).is_none());

        proposed.get_mut("name").unwrap().analyzer = Some(Analyzer::English);
        assert!(mapping_conflict(&current, &proposed).is_some());
    }
}
