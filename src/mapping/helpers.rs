//! Shared value builders for mapping rules.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};

use crate::entity::{Address, AdviserRef, ContactRef, IdName, SectorRef};

/// `{id, name}` or `null`.
pub fn id_name(value: &Option<IdName>) -> Value {
    value.as_ref().map_or(Value::Null, id_name_value)
}

pub fn id_name_value(value: &IdName) -> Value {
    json!({
        "id": value.id.to_string(),
        "name": value.name,
    })
}

/// Ordered `[{id, name}, ...]`, order preserved from the record.
pub fn id_name_list(values: &[IdName]) -> Value {
    Value::Array(values.iter().map(id_name_value).collect())
}

/// `{id, first_name, last_name, name}`, plus `dit_team` when asked for.
pub fn adviser_value(adviser: &AdviserRef, include_dit_team: bool) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), json!(adviser.id.to_string()));
    obj.insert("first_name".into(), json!(adviser.first_name));
    obj.insert("last_name".into(), json!(adviser.last_name));
    obj.insert("name".into(), json!(adviser.name()));
    if include_dit_team {
        obj.insert("dit_team".into(), id_name(&adviser.dit_team));
    }
    Value::Object(obj)
}

pub fn adviser(value: &Option<AdviserRef>, include_dit_team: bool) -> Value {
    value
        .as_ref()
        .map_or(Value::Null, |a| adviser_value(a, include_dit_team))
}

pub fn adviser_list(values: &[AdviserRef], include_dit_team: bool) -> Value {
    Value::Array(
        values
            .iter()
            .map(|a| adviser_value(a, include_dit_team))
            .collect(),
    )
}

pub fn contact(value: &Option<ContactRef>) -> Value {
    value.as_ref().map_or(Value::Null, |c| {
        json!({
            "id": c.id.to_string(),
            "first_name": c.first_name,
            "last_name": c.last_name,
            "name": c.name(),
        })
    })
}

/// `{id, name, ancestors: [{id}, ...]}` with the materialized path.
pub fn sector(value: &Option<SectorRef>) -> Value {
    value.as_ref().map_or(Value::Null, |s| {
        json!({
            "id": s.id.to_string(),
            "name": s.name,
            "ancestors": s
                .ancestors
                .iter()
                .map(|a| json!({"id": a.to_string()}))
                .collect::<Vec<_>>(),
        })
    })
}

pub fn address(value: &Address) -> Value {
    json!({
        "line_1": value.line_1,
        "line_2": value.line_2,
        "town": value.town,
        "county": value.county,
        "postcode": value.postcode,
        "country": id_name(&value.country),
    })
}

pub fn opt_str(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |s| Value::String(s.clone()))
}

pub fn datetime(value: &Option<DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, |d| Value::String(d.to_rfc3339()))
}

pub fn date(value: &Option<NaiveDate>) -> Value {
    value.map_or(Value::Null, |d| Value::String(d.format("%Y-%m-%d").to_string()))
}

/// Autocomplete inputs: each name, then every word of each name.
/// Lowercased, empties dropped, first occurrence wins.
pub fn suggestions<'a>(names: impl IntoIterator<Item = &'a str>) -> Value {
    let names: Vec<&str> = names.into_iter().collect();
    let mut out: Vec<String> = Vec::new();
    let words = names.iter().flat_map(|n| n.split_whitespace());
    for candidate in names.iter().copied().chain(words) {
        let candidate = candidate.trim().to_lowercase();
        if !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    json!(out)
}
