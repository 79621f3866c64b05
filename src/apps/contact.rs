use serde_json::{json, Value};

use super::{wrong_kind, DependencyEdge, ExportColumn, SearchApp};
use crate::document::Document;
use crate::entity::{Contact, Entity, EntityKind};
use crate::mapping::{self, MappingError, MappingRules};
use crate::schema::{self, Analyzer, DocumentSchema};
use crate::search::QueryRules;

const EXPORT_COLUMNS: &[ExportColumn] = &[
    ExportColumn::field("Name", "name"),
    ExportColumn::field("Job title", "job_title"),
    ExportColumn::field("Date created", "created_on"),
    ExportColumn::field("Archived", "archived"),
    ExportColumn::link("Link", "contacts"),
    ExportColumn::field("Company", "company.name"),
    ExportColumn::field("Country", "address_country.name"),
    ExportColumn::field("Postcode", "address_postcode"),
    ExportColumn::field("Phone number", "telephone_number"),
    ExportColumn::field("Email address", "email"),
    ExportColumn::field("Primary contact", "primary"),
];

const DEPENDENCIES: &[DependencyEdge] = &[
    DependencyEdge::new(EntityKind::Company, "company"),
    DependencyEdge::new(EntityKind::Adviser, "adviser"),
];

/// Contacts, with the company trading address standing in for the contact
/// address when the contact shares it.
pub struct ContactSearchApp {
    schema: DocumentSchema,
    rules: MappingRules<Contact>,
    query: QueryRules,
}

impl Default for ContactSearchApp {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactSearchApp {
    pub fn new() -> Self {
        Self {
            schema: document_schema(),
            rules: mapping_rules(),
            query: query_rules(),
        }
    }
}

fn document_schema() -> DocumentSchema {
    DocumentSchema::new("contact")
        .keyword("id")
        .field_spec(schema::id_name("title"))
        .text("first_name", Analyzer::LowercaseKeyword)
        .text("last_name", Analyzer::LowercaseKeyword)
        .text("name", Analyzer::LowercaseKeyword)
        .copy_to("name", "name_trigram")
        .text("name_trigram", Analyzer::Trigram)
        .text("job_title", Analyzer::LowercaseKeyword)
        .field_spec(schema::id_name_partial("company"))
        .field_spec(schema::contact_or_adviser("adviser", true))
        .boolean("primary")
        .text("email", Analyzer::LowercaseKeyword)
        .keyword("telephone_countrycode")
        .keyword("telephone_number")
        .boolean("address_same_as_company")
        .text("address_1", Analyzer::Standard)
        .text("address_2", Analyzer::Standard)
        .text("address_town", Analyzer::LowercaseKeyword)
        .text("address_county", Analyzer::LowercaseKeyword)
        .text("address_postcode", Analyzer::Standard)
        .field_spec(schema::id_name("address_country"))
        .text("notes", Analyzer::English)
        .date("created_on")
        .date("modified_on")
        .boolean("archived")
        .field_spec(schema::contact_or_adviser("archived_by", false))
        .date("archived_on")
        .text("archived_reason", Analyzer::Standard)
}

fn mapping_rules() -> MappingRules<Contact> {
    MappingRules::<Contact>::new()
        .field("id", |c| json!(c.id.to_string()))
        .field("title", |c| mapping::id_name(&c.title))
        .field("first_name", |c| json!(c.first_name))
        .field("last_name", |c| json!(c.last_name))
        .field("name", |c| json!(c.name()))
        .field("job_title", |c| mapping::opt_str(&c.job_title))
        .field("company", |c| {
            c.company.as_ref().map_or(Value::Null, |company| {
                json!({"id": company.id.to_string(), "name": company.name})
            })
        })
        .field("adviser", |c| mapping::adviser(&c.adviser, true))
        .field("primary", |c| json!(c.primary))
        .field("email", |c| mapping::opt_str(&c.email))
        .field("telephone_countrycode", |c| mapping::opt_str(&c.telephone_countrycode))
        .field("telephone_number", |c| mapping::opt_str(&c.telephone_number))
        .field("address_same_as_company", |c| json!(c.address_same_as_company))
        .field("address_1", |c| mapping::opt_str(&c.effective_address().line_1))
        .field("address_2", |c| mapping::opt_str(&c.effective_address().line_2))
        .field("address_town", |c| mapping::opt_str(&c.effective_address().town))
        .field("address_county", |c| mapping::opt_str(&c.effective_address().county))
        .field("address_postcode", |c| mapping::opt_str(&c.effective_address().postcode))
        .field("address_country", |c| mapping::id_name(&c.effective_address().country))
        .field("notes", |c| mapping::opt_str(&c.notes))
        .field("created_on", |c| mapping::datetime(&c.created_on))
        .field("modified_on", |c| mapping::datetime(&c.modified_on))
        .field("archived", |c| json!(c.archivable.archived))
        .field("archived_by", |c| mapping::adviser(&c.archivable.archived_by, false))
        .field("archived_on", |c| mapping::datetime(&c.archivable.archived_on))
        .field("archived_reason", |c| mapping::opt_str(&c.archivable.archived_reason))
        .ignore(&["modified_by", "address"])
}

fn query_rules() -> QueryRules {
    QueryRules::new()
        .exact("archived")
        .exact("primary")
        .exact("email")
        .remap("company", "company.id")
        .remap("adviser", "adviser.id")
        .remap("address_country", "address_country.id")
        .composite("name", &["name", "name_trigram"])
        .composite("company_name", &["company.name", "company.name_trigram"])
        .date_range("created_on")
        .date_range("modified_on")
        .search_fields(&[
            "name",
            "name_trigram",
            "email",
            "job_title",
            "company.name",
            "company.name_trigram",
        ])
        .phrase_field("name")
        .sort_fields(&[
            "name",
            "first_name",
            "last_name",
            "company.name",
            "created_on",
            "modified_on",
            "archived",
        ])
}

impl SearchApp for ContactSearchApp {
    fn name(&self) -> &'static str {
        "contact"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Contact
    }

    fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    fn produce_document(&self, entity: &Entity) -> Result<Document, MappingError> {
        let contact = entity
            .as_contact()
            .ok_or_else(|| wrong_kind(EntityKind::Contact, entity))?;
        Ok(Document::new(EntityKind::Contact, contact.id, self.rules.apply(contact)))
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
