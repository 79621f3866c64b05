// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Primary-store records.
//!
//! These are the typed rows the CRUD layer owns. The search layer never
//! writes them; it only reads them (through [`crate::source::EntitySource`])
//! to derive documents. Related records arrive already loaded, the way a
//! joined query would hand them over, so mapping never performs I/O.

mod company;
mod contact;
mod interaction;
mod order;
pub mod metadata;

pub use company::Company;
pub use contact::{CompanyRef, Contact, ContactRef};
pub use interaction::{Interaction, InteractionKind};
pub use metadata::{Address, Adviser, AdviserRef, IdName, SectorRef, SectorTree, SectorTreeError};
pub use order::{Order, OrderStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    Contact,
    Adviser,
    Interaction,
    Order,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Company,
        EntityKind::Contact,
        EntityKind::Adviser,
        EntityKind::Interaction,
        EntityKind::Order,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Company => "company",
            EntityKind::Contact => "contact",
            EntityKind::Adviser => "adviser",
            EntityKind::Interaction => "interaction",
            EntityKind::Order => "order",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind '{}'", s))
    }
}

/// Identity of one record: its type plus primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Archival metadata shared by every searchable record.
///
/// Archived records are kept, never deleted, and can be restored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Archivable {
    pub archived: bool,
    pub archived_by: Option<AdviserRef>,
    pub archived_on: Option<DateTime<Utc>>,
    pub archived_reason: Option<String>,
}

impl Archivable {
    pub fn archive(&mut self, by: Option<AdviserRef>, reason: Option<String>, at: DateTime<Utc>) {
        self.archived = true;
        self.archived_by = by;
        self.archived_reason = reason;
        self.archived_on = Some(at);
    }

    pub fn unarchive(&mut self) {
        self.archived = false;
        self.archived_by = None;
        self.archived_reason = Some(String::new());
        self.archived_on = None;
    }
}

/// Any record the search layer can read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Company(Company),
    Contact(Contact),
    Adviser(Adviser),
    Interaction(Interaction),
    Order(Order),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Company(_) => EntityKind::Company,
            Entity::Contact(_) => EntityKind::Contact,
            Entity::Adviser(_) => EntityKind::Adviser,
            Entity::Interaction(_) => EntityKind::Interaction,
            Entity::Order(_) => EntityKind::Order,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Entity::Company(c) => c.id,
            Entity::Contact(c) => c.id,
            Entity::Adviser(a) => a.id,
            Entity::Interaction(i) => i.id,
            Entity::Order(o) => o.id,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind(), self.id())
    }

    /// Ids of the records this one points at through `relation`.
    ///
    /// Used to resolve dependency edges: a document that embeds a summary of
    /// another record names the relation it embeds it through.
    pub fn references(&self, relation: &str) -> Vec<Uuid> {
        match self {
            Entity::Company(c) => c.references(relation),
            Entity::Contact(c) => c.references(relation),
            Entity::Adviser(_) => Vec::new(),
            Entity::Interaction(i) => i.references(relation),
            Entity::Order(o) => o.references(relation),
        }
    }

    pub fn archivable(&self) -> Option<&Archivable> {
        match self {
            Entity::Company(c) => Some(&c.archivable),
            Entity::Contact(c) => Some(&c.archivable),
            Entity::Adviser(_) => None,
            Entity::Interaction(i) => Some(&i.archivable),
            Entity::Order(o) => Some(&o.archivable),
        }
    }

    pub fn archivable_mut(&mut self) -> Option<&mut Archivable> {
        match self {
            Entity::Company(c) => Some(&mut c.archivable),
            Entity::Contact(c) => Some(&mut c.archivable),
            Entity::Adviser(_) => None,
            Entity::Interaction(i) => Some(&mut i.archivable),
            Entity::Order(o) => Some(&mut o.archivable),
        }
    }

    pub fn as_company(&self) -> Option<&Company> {
        match self {
            Entity::Company(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_contact(&self) -> Option<&Contact> {
        match self {
            Entity::Contact(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_adviser(&self) -> Option<&Adviser> {
        match self {
            Entity::Adviser(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_interaction(&self) -> Option<&Interaction> {
        match self {
            Entity::Interaction(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_order(&self) -> Option<&Order> {
        match self {
            Entity::Order(o) => Some(o),
            _ => None,
        }
    }
}

impl From<Company> for Entity {
    fn from(value: Company) -> Self {
        Entity::Company(value)
    }
}

impl From<Contact> for Entity {
    fn from(value: Contact) -> Self {
        Entity::Contact(value)
    }
}

impl From<Adviser> for Entity {
    fn from(value: Adviser) -> Self {
        Entity::Adviser(value)
    }
}

impl From<Interaction> for Entity {
    fn from(value: Interaction) -> Self {
        Entity::Interaction(value)
    }
}

impl From<Order> for Entity {
    fn from(value: Order) -> Self {
        Entity::Order(value)
    }
}
