// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde_json::json;

use super::{wrong_kind, AutocompleteRules, DependencyEdge, ExportColumn, SearchApp};
use crate::document::Document;
use crate::entity::{Company, Entity, EntityKind};
use crate::mapping::{self, MappingError, MappingRules};
use crate::schema::{self, Analyzer, DocumentSchema};
use crate::search::QueryRules;

const UNITED_KINGDOM: &str = "united kingdom";

const EXPORT_COLUMNS: &[ExportColumn] = &[
    ExportColumn::field("Name", "name"),
    ExportColumn::link("Link", "companies"),
    ExportColumn::field("Sector", "sector.name"),
    ExportColumn::field("Country", "address.country.name"),
    ExportColumn::field("UK region", "uk_region.name"),
    ExportColumn::field("Archived", "archived"),
    ExportColumn::field("Date created", "created_on"),
    ExportColumn::field("Number of employees", "employee_range.name"),
    ExportColumn::field("Annual turnover", "turnover_range.name"),
    ExportColumn::field("Headquarter type", "headquarter_type.name"),
];

const DEPENDENCIES: &[DependencyEdge] = &[
    DependencyEdge::new(EntityKind::Adviser, "account_manager"),
    DependencyEdge::new(EntityKind::Company, "global_headquarters"),
];

pub struct CompanySearchApp {
    schema: DocumentSchema,
    rules: MappingRules<Company>,
    query: QueryRules,
    autocomplete: AutocompleteRules,
}

impl Default for CompanySearchApp {
    fn default() -> Self {
        Self::new()
    }
}

impl CompanySearchApp {
    pub fn new() -> Self {
        Self {
            schema: document_schema(),
            rules: mapping_rules(),
            query: query_rules(),
            autocomplete: AutocompleteRules {
                field: "suggest",
                source_fields: &["id", "name", "trading_names", "address"],
            },
        }
    }
}

fn document_schema() -> DocumentSchema {
    DocumentSchema::new("company")
        .keyword("id")
        .text("name", Analyzer::LowercaseKeyword)
        .copy_to("name", "name_trigram")
        .text("name_trigram", Analyzer::Trigram)
        .keyword("reference_code")
        .text("company_number", Analyzer::LowercaseKeyword)
        .keyword_unindexed("vat_number")
        .keyword("duns_number")
        .text("trading_names", Analyzer::LowercaseKeyword)
        .copy_to("trading_names", "trading_names_trigram")
        .text("trading_names_trigram", Analyzer::Trigram)
        .text("description", Analyzer::English)
        .keyword_unindexed("website")
        .field_spec(schema::id_name("business_type"))
        .field_spec(schema::sector("sector"))
        .field_spec(schema::id_name("employee_range"))
        .field_spec(schema::id_name("turnover_range"))
        .field_spec(schema::id_name("export_experience_category"))
        .field_spec(schema::id_name("headquarter_type"))
        .field_spec(schema::id_name("uk_region"))
        .field_spec(schema::id_name("global_headquarters"))
        .field_spec(schema::contact_or_adviser("account_manager", true))
        .field_spec(schema::address("address"))
        .field_spec(schema::address("registered_address"))
        .boolean("uk_based")
        .field_spec(schema::id_name("export_to_countries"))
        .field_spec(schema::id_name("future_interest_countries"))
        .date("created_on")
        .date("modified_on")
        .boolean("archived")
        .field_spec(schema::contact_or_adviser("archived_by", false))
        .date("archived_on")
        .text("archived_reason", Analyzer::Standard)
        .text("suggest", Analyzer::LowercaseKeyword)
}

fn mapping_rules() -> MappingRules<Company> {
    MappingRules::<Company>::new()
        .field("id", |c| json!(c.id.to_string()))
        .field("name", |c| json!(c.name))
        .field("reference_code", |c| mapping::opt_str(&c.reference_code))
        .field("company_number", |c| mapping::opt_str(&c.company_number))
        .field("vat_number", |c| mapping::opt_str(&c.vat_number))
        .field("duns_number", |c| mapping::opt_str(&c.duns_number))
        .field("trading_names", |c| json!(c.trading_names))
        .field("description", |c| mapping::opt_str(&c.description))
        .field("website", |c| mapping::opt_str(&c.website))
        .field("business_type", |c| mapping::id_name(&c.business_type))
        .field("sector", |c| mapping::sector(&c.sector))
        .field("employee_range", |c| mapping::id_name(&c.employee_range))
        .field("turnover_range", |c| mapping::id_name(&c.turnover_range))
        .field("export_experience_category", |c| mapping::id_name(&c.export_experience_category))
        .field("headquarter_type", |c| mapping::id_name(&c.headquarter_type))
        .field("uk_region", |c| mapping::id_name(&c.uk_region))
        .field("global_headquarters", |c| mapping::id_name(&c.global_headquarters))
        .field("account_manager", |c| mapping::adviser(&c.account_manager, true))
        .field("address", |c| mapping::address(&c.trading_address))
        .field("registered_address", |c| mapping::address(&c.registered_address))
        .field("uk_based", |c| json!(is_uk_based(c)))
        .field("export_to_countries", |c| mapping::id_name_list(&c.export_to_countries))
        .field("future_interest_countries", |c| mapping::id_name_list(&c.future_interest_countries))
        .field("created_on", |c| mapping::datetime(&c.created_on))
        .field("modified_on", |c| mapping::datetime(&c.modified_on))
        .field("archived", |c| json!(c.archivable.archived))
        .field("archived_by", |c| mapping::adviser(&c.archivable.archived_by, false))
        .field("archived_on", |c| mapping::datetime(&c.archivable.archived_on))
        .field("archived_reason", |c| mapping::opt_str(&c.archivable.archived_reason))
        .field("suggest", |c| {
            mapping::suggestions(std::iter::once(c.name.as_str()).chain(c.trading_names.iter().map(String::as_str)))
        })
        .ignore(&["modified_by", "trading_address"])
}

fn query_rules() -> QueryRules {
    QueryRules::new()
        .exact("archived")
        .exact("uk_based")
        .exact("reference_code")
        .exact("company_number")
        .remap("business_type", "business_type.id")
        .remap("sector", "sector.id")
        .remap("employee_range", "employee_range.id")
        .remap("turnover_range", "turnover_range.id")
        .remap("export_experience_category", "export_experience_category.id")
        .remap("headquarter_type", "headquarter_type.id")
        .remap("uk_region", "uk_region.id")
        .remap("global_headquarters", "global_headquarters.id")
        .remap("account_manager", "account_manager.id")
        .remap("export_to_countries", "export_to_countries.id")
        .remap("future_interest_countries", "future_interest_countries.id")
        .composite("name", &["name", "name_trigram", "trading_names", "trading_names_trigram"])
        .composite("country", &["address.country.id", "registered_address.country.id"])
        .descends("sector_descends", "sector")
        .date_range("created_on")
        .date_range("modified_on")
        .search_fields(&[
            "name",
            "name_trigram",
            "trading_names",
            "trading_names_trigram",
            "reference_code",
            "company_number",
            "address.postcode",
            "registered_address.postcode",
        ])
        .phrase_field("name")
        .sort_fields(&["name", "created_on", "modified_on", "archived", "uk_region.name"])
}

fn is_uk_based(company: &Company) -> bool {
    company
        .address_country()
        .is_some_and(|country| country.name.trim().eq_ignore_ascii_case(UNITED_KINGDOM))
}

impl SearchApp for CompanySearchApp {
    fn name(&self) -> &'static str {
        "company"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Company
    }

    fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    fn produce_document(&self, entity: &Entity) -> Result<Document, MappingError> {
        let company = entity
            .as_company()
            .ok_or_else(|| wrong_kind(EntityKind::Company, entity))?;
        Ok(Document::new(EntityKind::Company, company.id, self.rules.apply(company)))
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

    fn autocomplete(&self) -> Option<&AutocompleteRules> {
        Some(&self.autocomplete)
    }

    fn dependencies(&self) -> &[DependencyEdge] {
        DEPENDENCIES
    }
}
