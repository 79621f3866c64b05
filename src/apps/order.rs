use serde_json::json;

use super::{wrong_kind, DependencyEdge, ExportColumn, SearchApp};
use crate::document::Document;
use crate::entity::{Entity, EntityKind, Order};
use crate::mapping::{self, MappingError, MappingRules};
use crate::schema::{self, Analyzer, DocumentSchema, FieldSpec, FieldType};
use crate::search::QueryRules;

const EXPORT_COLUMNS: &[ExportColumn] = &[
    ExportColumn::field("Order reference", "reference"),
    ExportColumn::field("Net price", "net_cost"),
    ExportColumn::field("Total price", "total_cost"),
    ExportColumn::field("Status", "status"),
    ExportColumn::link("Link", "omis"),
    ExportColumn::field("Sector", "sector.name"),
    ExportColumn::field("Market", "primary_market.name"),
    ExportColumn::field("Company", "company.name"),
    ExportColumn::field("Contact", "contact.name"),
    ExportColumn::field("Contact email", "contact_email"),
    ExportColumn::field("Date created", "created_on"),
    ExportColumn::field("Delivery date", "delivery_date"),
];

const DEPENDENCIES: &[DependencyEdge] = &[
    DependencyEdge::new(EntityKind::Company, "company"),
    DependencyEdge::new(EntityKind::Contact, "contact"),
    DependencyEdge::new(EntityKind::Adviser, "created_by"),
    DependencyEdge::new(EntityKind::Adviser, "subscribers"),
    DependencyEdge::new(EntityKind::Adviser, "assignees"),
];

/// Overseas market introduction orders.
pub struct OrderSearchApp {
    schema: DocumentSchema,
    rules: MappingRules<Order>,
    query: QueryRules,
}

impl Default for OrderSearchApp {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderSearchApp {
    pub fn new() -> Self {
        Self {
            schema: document_schema(),
            rules: mapping_rules(),
            query: query_rules(),
        }
    }
}

fn document_schema() -> DocumentSchema {
    DocumentSchema::new("order")
        .keyword("id")
        .text("reference", Analyzer::LowercaseKeyword)
        .copy_to("reference", "reference_trigram")
        .text("reference_trigram", Analyzer::Trigram)
        .keyword("status")
        .field_spec(schema::id_name_partial("company"))
        .field_spec(schema::contact_or_adviser_partial("contact"))
        .field_spec(schema::contact_or_adviser("created_by", true))
        .field_spec(schema::id_name("primary_market"))
        .field_spec(schema::id_name("sector"))
        .text("description", Analyzer::English)
        .text("contacts_not_to_approach", Analyzer::English)
        .date("delivery_date")
        .field_spec(schema::id_name("service_types"))
        .text("contact_email", Analyzer::LowercaseKeyword)
        .keyword("contact_phone")
        .field_spec(schema::contact_or_adviser("subscribers", true))
        .field_spec(schema::contact_or_adviser("assignees", true))
        .keyword_unindexed("po_number")
        .integer_unindexed("discount_value")
        .keyword_unindexed("vat_number")
        .field_spec(FieldSpec::new("vat_verified", FieldType::Boolean).unindexed())
        .integer_unindexed("net_cost")
        .integer_unindexed("subtotal_cost")
        .integer_unindexed("vat_cost")
        .integer("total_cost")
        .copy_to("total_cost", "total_cost_string")
        .keyword("total_cost_string")
        .text("billing_contact_name", Analyzer::LowercaseKeyword)
        .text("billing_email", Analyzer::LowercaseKeyword)
        .keyword("billing_phone")
        .text("billing_address_1", Analyzer::Standard)
        .text("billing_address_2", Analyzer::Standard)
        .text("billing_address_town", Analyzer::LowercaseKeyword)
        .text("billing_address_county", Analyzer::LowercaseKeyword)
        .text("billing_address_postcode", Analyzer::Standard)
        .field_spec(schema::id_name("billing_address_country"))
        .date("created_on")
        .date("modified_on")
        .boolean("archived")
        .field_spec(schema::contact_or_adviser("archived_by", false))
        .date("archived_on")
        .text("archived_reason", Analyzer::Standard)
}

fn mapping_rules() -> MappingRules<Order> {
    MappingRules::<Order>::new()
        .field("id", |o| json!(o.id.to_string()))
        .field("reference", |o| json!(o.reference))
        .field("status", |o| json!(o.status.as_str()))
        .field("company", |o| mapping::id_name(&o.company))
        .field("contact", |o| mapping::contact(&o.contact))
        .field("created_by", |o| mapping::adviser(&o.created_by, true))
        .field("primary_market", |o| mapping::id_name(&o.primary_market))
        .field("sector", |o| mapping::id_name(&o.sector))
        .field("description", |o| mapping::opt_str(&o.description))
        .field("contacts_not_to_approach", |o| mapping::opt_str(&o.contacts_not_to_approach))
        .field("delivery_date", |o| mapping::date(&o.delivery_date))
        .field("service_types", |o| mapping::id_name_list(&o.service_types))
        .field("contact_email", |o| mapping::opt_str(&o.contact_email))
        .field("contact_phone", |o| mapping::opt_str(&o.contact_phone))
        .field("subscribers", |o| mapping::adviser_list(&o.subscribers, true))
        .field("assignees", |o| mapping::adviser_list(&o.assignees, true))
        .field("po_number", |o| mapping::opt_str(&o.po_number))
        .field("discount_value", |o| json!(o.discount_value))
        .field("vat_number", |o| mapping::opt_str(&o.vat_number))
        .field("vat_verified", |o| json!(o.vat_verified))
        .field("net_cost", |o| json!(o.net_cost))
        .field("subtotal_cost", |o| json!(o.subtotal_cost))
        .field("vat_cost", |o| json!(o.vat_cost))
        .field("total_cost", |o| json!(o.total_cost))
        .field("billing_contact_name", |o| mapping::opt_str(&o.billing_contact_name))
        .field("billing_email", |o| mapping::opt_str(&o.billing_email))
        .field("billing_phone", |o| mapping::opt_str(&o.billing_phone))
        .field("billing_address_1", |o| mapping::opt_str(&o.billing_address.line_1))
        .field("billing_address_2", |o| mapping::opt_str(&o.billing_address.line_2))
        .field("billing_address_town", |o| mapping::opt_str(&o.billing_address.town))
        .field("billing_address_county", |o| mapping::opt_str(&o.billing_address.county))
        .field("billing_address_postcode", |o| mapping::opt_str(&o.billing_address.postcode))
        .field("billing_address_country", |o| mapping::id_name(&o.billing_address.country))
        .field("created_on", |o| mapping::datetime(&o.created_on))
        .field("modified_on", |o| mapping::datetime(&o.modified_on))
        .field("archived", |o| json!(o.archivable.archived))
        .field("archived_by", |o| mapping::adviser(&o.archivable.archived_by, false))
        .field("archived_on", |o| mapping::datetime(&o.archivable.archived_on))
        .field("archived_reason", |o| mapping::opt_str(&o.archivable.archived_reason))
        .ignore(&["modified_by", "public_token", "hourly_rate", "billing_address"])
}

fn query_rules() -> QueryRules {
    QueryRules::new()
        .exact("status")
        .exact("reference")
        .exact("archived")
        .remap("company", "company.id")
        .remap("contact", "contact.id")
        .remap("created_by", "created_by.id")
        .remap("primary_market", "primary_market.id")
        .remap("sector", "sector.id")
        .remap("service_types", "service_types.id")
        .remap("subscribers", "subscribers.id")
        .remap("assignees", "assignees.id")
        .remap("assigned_to_team", "assignees.dit_team.id")
        .composite("company_name", &["company.name", "company.name_trigram"])
        .composite("contact_name", &["contact.name", "contact.name_trigram"])
        .date_range("created_on")
        .date_range("delivery_date")
        .search_fields(&[
            "reference",
            "reference_trigram",
            "company.name",
            "company.name_trigram",
            "contact.name",
            "contact.name_trigram",
            "total_cost_string",
        ])
        .phrase_field("reference")
        .sort_fields(&[
            "created_on",
            "modified_on",
            "delivery_date",
            "reference",
            "total_cost",
            "company.name",
        ])
}

impl SearchApp for OrderSearchApp {
    fn name(&self) -> &'static str {
        "order"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Order
    }

    fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    fn produce_document(&self, entity: &Entity) -> Result<Document, MappingError> {
        let order = entity
            .as_order()
            .ok_or_else(|| wrong_kind(EntityKind::Order, entity))?;
        Ok(Document::new(EntityKind::Order, order.id, self.rules.apply(order)))
    }

    fn check_mapping(&self) -> Result<(), MappingError> {
        self.rules.check_against(&self.schema)
    }

    fn query_rules(&self) -> &QueryRules {
        &self.query
    }

    fn export_columns(&self) -> &[ExportColumn] {
        EXPORT_COLUMNS
    }

    fn dependencies(&self) -> &[DependencyEdge] {
        DEPENDENCIES
    }
}
