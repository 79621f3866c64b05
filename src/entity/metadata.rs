// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reference data and small value types embedded in records.
//!
//! Includes the sector hierarchy provider: [`SectorTree`] materializes each
//! sector's ancestor path up front so hierarchical filters never walk the
//! tree at query time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// A reference-data row (country, team, service, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdName {
    pub id: Uuid,
    pub name: String,
}

impl IdName {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// Postal address block. All parts are optional in the primary store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line_1: Option<String>,
    pub line_2: Option<String>,
    pub town: Option<String>,
    pub county: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<IdName>,
}

/// Adviser (internal user) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adviser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dit_team: Option<IdName>,
    pub is_active: bool,
}

/// Adviser summary as loaded alongside another record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviserRef {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub dit_team: Option<IdName>,
}

impl AdviserRef {
    pub fn name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

impl From<&Adviser> for AdviserRef {
    fn from(adviser: &Adviser) -> Self {
        Self {
            id: adviser.id,
            first_name: adviser.first_name.clone(),
            last_name: adviser.last_name.clone(),
            dit_team: adviser.dit_team.clone(),
        }
    }
}

pub(crate) fn full_name(first: &str, last: &str) -> String {
    match (first.trim(), last.trim()) {
        ("", last) => last.to_string(),
        (first, "") => first.to_string(),
        (first, last) => format!("{} {}", first, last),
    }
}

/// Sector reference with its materialized ancestor path (root first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorRef {
    pub id: Uuid,
    pub name: String,
    pub ancestors: Vec<Uuid>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectorTreeError {
    #[error("Sector '{0}' not found")]
    NotFound(Uuid),
    #[error("Sector '{parent}' referenced by '{child}' not found")]
    MissingParent { child: Uuid, parent: Uuid },
    #[error("Sector hierarchy contains a cycle at '{0}'")]
    Cycle(Uuid),
}

#[derive(Debug, Clone)]
struct SectorNode {
    segment: String,
    parent: Option<Uuid>,
}

/// Category hierarchy provider for sectors.
///
/// Built from flat `(id, segment, parent)` rows. Ancestor paths are computed
/// once per sector and cached in [`SectorRef`]s handed to the mapper.
#[derive(Debug, Clone, Default)]
pub struct SectorTree {
    nodes: HashMap<Uuid, SectorNode>,
}

impl SectorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: Uuid, segment: impl Into<String>, parent: Option<Uuid>) {
        self.nodes.insert(
            id,
            SectorNode {
                segment: segment.into(),
                parent,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ancestor ids of `id`, root first, excluding `id` itself.
    pub fn ancestors(&self, id: Uuid) -> Result<Vec<Uuid>, SectorTreeError> {
        let mut node = self.nodes.get(&id).ok_or(SectorTreeError::NotFound(id))?;
        let mut path = Vec::new();
        let mut child = id;

        while let Some(parent) = node.parent {
            if parent == id || path.contains(&parent) {
                return Err(SectorTreeError::Cycle(parent));
            }
            node = self
                .nodes
                .get(&parent)
                .ok_or(SectorTreeError::MissingParent { child, parent })?;
            path.push(parent);
            child = parent;
        }

        path.reverse();
        Ok(path)
    }

    /// Full reference for `id`. The name joins every segment from the root
    /// with " : ", matching how sectors are displayed.
    pub fn resolve(&self, id: Uuid) -> Result<SectorRef, SectorTreeError> {
        let ancestors = self.ancestors(id)?;
        let mut segments = Vec::with_capacity(ancestors.len() + 1);
        for ancestor in &ancestors {
            // ancestors() already proved every id on the path exists
            if let Some(node) = self.nodes.get(ancestor) {
                segments.push(node.segment.as_str());
            }
        }
        let node = self.nodes.get(&id).ok_or(SectorTreeError::NotFound(id))?;
        segments.push(node.segment.as_str());

        Ok(SectorRef {
            id,
            name: segments.join(" : "),
            ancestors,
        })
    }
}
