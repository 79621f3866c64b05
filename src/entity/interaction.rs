use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::contact::ContactRef;
use super::metadata::{AdviserRef, IdName};
use super::Archivable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Interaction,
    ServiceDelivery,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Interaction => "interaction",
            InteractionKind::ServiceDelivery => "service_delivery",
        }
    }
}

/// Interaction record (meeting, call, service delivery, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub kind: InteractionKind,
    pub subject: String,
    pub notes: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub company: Option<IdName>,
    pub contact: Option<ContactRef>,
    pub dit_adviser: Option<AdviserRef>,
    pub dit_team: Option<IdName>,
    pub service: Option<IdName>,
    pub communication_channel: Option<IdName>,
    pub investment_project: Option<IdName>,
    pub were_countries_discussed: bool,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_on: Option<DateTime<Utc>>,
    pub modified_by: Option<AdviserRef>,
    pub archivable: Archivable,
}

impl Interaction {
    pub fn new(id: Uuid, subject: impl Into<String>) -> Self {
        Self {
            id,
            kind: InteractionKind::Interaction,
            subject: subject.into(),
            notes: None,
            date: None,
            company: None,
            contact: None,
            dit_adviser: None,
            dit_team: None,
            service: None,
            communication_channel: None,
            investment_project: None,
            were_countries_discussed: false,
            created_on: None,
            modified_on: None,
            modified_by: None,
            archivable: Archivable::default(),
        }
    }

    pub(crate) fn references(&self, relation: &str) -> Vec<Uuid> {
        match relation {
            "company" => self.company.iter().map(|c| c.id).collect(),
            "contact" => self.contact.iter().map(|c| c.id).collect(),
            "dit_adviser" => self.dit_adviser.iter().map(|a| a.id).collect(),
            _ => Vec::new(),
        }
    }
}
