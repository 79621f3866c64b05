use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::contact::ContactRef;
use super::metadata::{Address, AdviserRef, IdName};
use super::Archivable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    QuoteAwaitingAcceptance,
    QuoteAccepted,
    Paid,
    Complete,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::QuoteAwaitingAcceptance => "quote_awaiting_acceptance",
            OrderStatus::QuoteAccepted => "quote_accepted",
            OrderStatus::Paid => "paid",
            OrderStatus::Complete => "complete",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// OMIS order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub reference: String,
    pub status: OrderStatus,
    pub company: Option<IdName>,
    pub contact: Option<ContactRef>,
    pub created_by: Option<AdviserRef>,
    pub primary_market: Option<IdName>,
    pub sector: Option<IdName>,
    pub description: Option<String>,
    pub contacts_not_to_approach: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub service_types: Vec<IdName>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub subscribers: Vec<AdviserRef>,
    pub assignees: Vec<AdviserRef>,
    pub po_number: Option<String>,
    pub discount_value: i64,
    pub vat_number: Option<String>,
    pub vat_verified: Option<bool>,
    pub net_cost: i64,
    pub subtotal_cost: i64,
    pub vat_cost: i64,
    pub total_cost: i64,
    pub billing_contact_name: Option<String>,
    pub billing_email: Option<String>,
    pub billing_phone: Option<String>,
    pub billing_address: Address,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_on: Option<DateTime<Utc>>,
    pub modified_by: Option<AdviserRef>,
    /// Customer-facing access token; never indexed.
    pub public_token: String,
    pub hourly_rate: Option<IdName>,
    pub archivable: Archivable,
}

impl Order {
    pub fn new(id: Uuid, reference: impl Into<String>) -> Self {
        Self {
            id,
            reference: reference.into(),
            status: OrderStatus::Draft,
            company: None,
            contact: None,
            created_by: None,
            primary_market: None,
            sector: None,
            description: None,
            contacts_not_to_approach: None,
            delivery_date: None,
            service_types: Vec::new(),
            contact_email: None,
            contact_phone: None,
            subscribers: Vec::new(),
            assignees: Vec::new(),
            po_number: None,
            discount_value: 0,
            vat_number: None,
            vat_verified: None,
            net_cost: 0,
            subtotal_cost: 0,
            vat_cost: 0,
            total_cost: 0,
            billing_contact_name: None,
            billing_email: None,
            billing_phone: None,
            billing_address: Address::default(),
            created_on: None,
            modified_on: None,
            modified_by: None,
            public_token: String::new(),
            hourly_rate: None,
            archivable: Archivable::default(),
        }
    }

    pub(crate) fn references(&self, relation: &str) -> Vec<Uuid> {
        match relation {
            "company" => self.company.iter().map(|c| c.id).collect(),
            "contact" => self.contact.iter().map(|c| c.id).collect(),
            "created_by" => self.created_by.iter().map(|a| a.id).collect(),
            "subscribers" => self.subscribers.iter().map(|a| a.id).collect(),
            "assignees" => self.assignees.iter().map(|a| a.id).collect(),
            _ => Vec::new(),
        }
    }
}
