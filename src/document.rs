// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search document data structure.
//!
//! A [`Document`] is the flattened projection of one record. It carries no
//! state of its own: every field is recomputed from the primary store by the
//! record's mapping rules, so a document can always be thrown away and
//! rebuilt.

use std::sync::OnceLock;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::batching::SizedItem;
use crate::entity::{EntityKind, EntityRef};

/// A flattened, queryable record.
///
/// Field maps are ordered by key, so identical state serializes to
/// identical bytes.
///
/// # Example
///
/// ```
/// use datahub_search::{Document, EntityKind};
/// use serde_json::json;
/// use uuid::Uuid;
///
/// let id = Uuid::new_v4();
/// let doc = Document::from_value(EntityKind::Company, id, json!({"name": "Acme"})).unwrap();
///
/// assert_eq!(doc.get("name"), Some(&json!("Acme")));
/// assert_eq!(doc.get("id"), Some(&json!(id.to_string())));
/// assert_eq!(doc.content_hash().len(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub kind: EntityKind,
    pub fields: Map<String, Value>,

    cached_size: OnceLock<usize>,
}

impl Document {
    /// Build a document; the `id` field is always set from `id`.
    pub fn new(kind: EntityKind, id: Uuid, mut fields: Map<String, Value>) -> Self {
        fields.insert("id".to_string(), Value::String(id.to_string()));
        Self {
            id,
            kind,
            fields,
            cached_size: OnceLock::new(),
        }
    }

    /// Build from a stored `_source` body. Returns `None` unless the body is
    /// a JSON object.
    pub fn from_value(kind: EntityKind, id: Uuid, source: Value) -> Option<Self> {
        match source {
            Value::Object(fields) => Some(Self::new(kind, id, fields)),
            _ => None,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id)
    }

    /// Top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Every value reachable through a dotted path, flattening arrays on the
    /// way (`"sector.ancestors.id"`).
    pub fn values_at(&self, path: &str) -> Vec<&Value> {
        values_at_path(&self.fields, path)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Map<String, Value> always serializes
        serde_json::to_vec(&self.fields).unwrap_or_default()
    }

    /// SHA-256 of the serialized body, hex encoded.
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(self.to_bytes()))
    }
}

/// Values under a dotted path of a JSON object; arrays are flattened and
/// nulls skipped.
pub(crate) fn values_at_path<'a>(fields: &'a Map<String, Value>, path: &str) -> Vec<&'a Value> {
    let mut current: Vec<&Value> = Vec::new();
    let mut parts = path.split('.');
    match parts.next().and_then(|head| fields.get(head)) {
        Some(value) => flatten_into(value, &mut current),
        None => return Vec::new(),
    }
    for part in parts {
        let mut next = Vec::new();
        for value in current {
            if let Some(child) = value.as_object().and_then(|obj| obj.get(part)) {
                flatten_into(child, &mut next);
            }
        }
        current = next;
    }
    current
}

fn flatten_into<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Null => {}
        other => out.push(other),
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind && self.fields == other.fields
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl SizedItem for Document {
    fn size_bytes(&self) -> usize {
        *self.cached_size.get_or_init(|| {
            std::mem::size_of::<Self>() + self.to_bytes().len()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(EntityKind::Company, Uuid::new_v4(), value).unwrap()
    }

    #[test]
    fn test_id_field_is_forced() {
        let id = Uuid::new_v4();
        let d = Document::from_value(EntityKind::Contact, id, json!({"id": "bogus"})).unwrap();
        assert_eq!(d.get("id"), Some(&json!(id.to_string())));
    }

    #[test]
    fn test_from_non_object_is_rejected() {
        assert!(Document::from_value(EntityKind::Contact, Uuid::new_v4(), json!([1, 2])).is_none());
    }

    #[test]
    fn test_values_at_nested_and_arrays() {
        let d = doc(json!({
            "sector": {"id": "s3", "ancestors": [{"id": "s1"}, {"id": "s2"}]},
            "trading_names": ["helm", "nop"],
            "uk_region": null,
        }));
        assert_eq!(d.values_at("sector.id"), vec![&json!("s3")]);
        assert_eq!(d.values_at("sector.ancestors.id"), vec![&json!("s1"), &json!("s2")]);
        assert_eq!(d.values_at("trading_names").len(), 2);
        assert!(d.values_at("uk_region.id").is_empty());
        assert!(d.values_at("missing").is_empty());
    }

    #[test]
    fn test_hash_is_stable_for_equal_content() {
        let id = Uuid::new_v4();
        let a = Document::from_value(EntityKind::Company, id, json!({"b": 1, "a": 2})).unwrap();
        let b = Document::from_value(EntityKind::Company, id, json!({"a": 2, "b": 1})).unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a, b);
    }

    #[test]
    fn test_size_bytes_positive() {
        let d = doc(json!({"name": "x"}));
        assert!(d.size_bytes() > 0);
    }
}
