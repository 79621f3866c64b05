// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Interactions, visible either to everyone holding the view-all permission
//! or to members of the team that recorded them.

use serde_json::json;

use super::{wrong_kind, DependencyEdge, ExportColumn, SearchApp};
use crate::document::Document;
use crate::entity::{Entity, EntityKind, Interaction};
use crate::mapping::{self, MappingError, MappingRules};
use crate::permissions::{PermissionFilter, PermissionRule, RequestContext};
use crate::schema::{self, Analyzer, DocumentSchema};
use crate::search::QueryRules;

/// Grants every interaction regardless of team.
pub const VIEW_ALL_PERMISSION: &str = "interaction.view_all_interaction";
/// Grants interactions recorded by the caller's own team.
pub const VIEW_ASSOCIATED_PERMISSION: &str = "interaction.view_associated_interaction";

const EXPORT_COLUMNS: &[ExportColumn] = &[
    ExportColumn::field("Date", "date"),
    ExportColumn::field("Type", "kind"),
    ExportColumn::field("Service", "service.name"),
    ExportColumn::field("Subject", "subject"),
    ExportColumn::link("Link", "interactions"),
    ExportColumn::field("Company", "company.name"),
    ExportColumn::field("Contact", "contact.name"),
    ExportColumn::field("Adviser", "dit_adviser.name"),
    ExportColumn::field("Service provider", "dit_team.name"),
    ExportColumn::field("Communication channel", "communication_channel.name"),
];

const DEPENDENCIES: &[DependencyEdge] = &[
    DependencyEdge::new(EntityKind::Company, "company"),
    DependencyEdge::new(EntityKind::Contact, "contact"),
    DependencyEdge::new(EntityKind::Adviser, "dit_adviser"),
];

pub struct InteractionSearchApp {
    schema: DocumentSchema,
    rules: MappingRules<Interaction>,
    query: QueryRules,
}

impl Default for InteractionSearchApp {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionSearchApp {
    pub fn new() -> Self {
        Self {
            schema: document_schema(),
            rules: mapping_rules(),
            query: query_rules(),
        }
    }
}

fn document_schema() -> DocumentSchema {
    DocumentSchema::new("interaction")
        .keyword("id")
        .keyword("kind")
        .text("subject", Analyzer::LowercaseKeyword)
        .copy_to("subject", "subject_english")
        .text("subject_english", Analyzer::English)
        .text("notes", Analyzer::English)
        .date("date")
        .field_spec(schema::id_name_partial("company"))
        .field_spec(schema::contact_or_adviser_partial("contact"))
        .field_spec(schema::contact_or_adviser("dit_adviser", true))
        .field_spec(schema::id_name("dit_team"))
        .field_spec(schema::id_name("service"))
        .field_spec(schema::id_name("communication_channel"))
        .field_spec(schema::id_name("investment_project"))
        .boolean("were_countries_discussed")
        .date("created_on")
        .date("modified_on")
        .boolean("archived")
        .field_spec(schema::contact_or_adviser("archived_by", false))
        .date("archived_on")
        .text("archived_reason", Analyzer::Standard)
}

fn mapping_rules() -> MappingRules<Interaction> {
    MappingRules::<Interaction>::new()
        .field("id", |i| json!(i.id.to_string()))
        .field("kind", |i| json!(i.kind.as_str()))
        .field("subject", |i| json!(i.subject))
        .field("notes", |i| mapping::opt_str(&i.notes))
        .field("date", |i| mapping::datetime(&i.date))
        .field("company", |i| mapping::id_name(&i.company))
        .field("contact", |i| mapping::contact(&i.contact))
        .field("dit_adviser", |i| mapping::adviser(&i.dit_adviser, true))
        .field("dit_team", |i| mapping::id_name(&i.dit_team))
        .field("service", |i| mapping::id_name(&i.service))
        .field("communication_channel", |i| mapping::id_name(&i.communication_channel))
        .field("investment_project", |i| mapping::id_name(&i.investment_project))
        .field("were_countries_discussed", |i| json!(i.were_countries_discussed))
        .field("created_on", |i| mapping::datetime(&i.created_on))
        .field("modified_on", |i| mapping::datetime(&i.modified_on))
        .field("archived", |i| json!(i.archivable.archived))
        .field("archived_by", |i| mapping::adviser(&i.archivable.archived_by, false))
        .field("archived_on", |i| mapping::datetime(&i.archivable.archived_on))
        .field("archived_reason", |i| mapping::opt_str(&i.archivable.archived_reason))
        .ignore(&["modified_by"])
}

fn query_rules() -> QueryRules {
    QueryRules::new()
        .exact("kind")
        .exact("archived")
        .exact("were_countries_discussed")
        .remap("company", "company.id")
        .remap("contact", "contact.id")
        .remap("dit_adviser", "dit_adviser.id")
        .remap("dit_team", "dit_team.id")
        .remap("service", "service.id")
        .remap("communication_channel", "communication_channel.id")
        .remap("investment_project", "investment_project.id")
        .composite("company_name", &["company.name", "company.name_trigram"])
        .composite("contact_name", &["contact.name", "contact.name_trigram"])
        .date_range("date")
        .date_range("created_on")
        .search_fields(&[
            "subject_english",
            "notes",
            "company.name",
            "company.name_trigram",
            "contact.name",
            "contact.name_trigram",
            "dit_adviser.name",
        ])
        .phrase_field("subject")
        .sort_fields(&["date", "subject", "company.name", "created_on", "modified_on"])
}

impl SearchApp for InteractionSearchApp {
    fn name(&self) -> &'static str {
        "interaction"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Interaction
    }

    fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    fn produce_document(&self, entity: &Entity) -> Result<Document, MappingError> {
        let interaction = entity
            .as_interaction()
            .ok_or_else(|| wrong_kind(EntityKind::Interaction, entity))?;
        Ok(Document::new(
            EntityKind::Interaction,
            interaction.id,
            self.rules.apply(interaction),
        ))
    }

    fn check_mapping(&self) -> Result<(), MappingError> {
        self.rules.check_against(&self.schema)
    }

    fn query_rules(&self) -> &QueryRules {
        &self.query
    }

    /// View-all sees everything. Otherwise only interactions whose team, or
    /// whose adviser's team, is the caller's; a caller with no team sees none.
    fn permission_rule(&self, ctx: &RequestContext) -> PermissionFilter {
        if ctx.has_permission(VIEW_ALL_PERMISSION) {
            return PermissionFilter::Unrestricted;
        }
        match ctx.team_id {
            Some(team) => PermissionFilter::AnyOf(vec![
                PermissionRule::new("dit_team.id", team.to_string()),
                PermissionRule::new("dit_adviser.dit_team.id", team.to_string()),
            ]),
            None => PermissionFilter::ExcludeAll,
        }
    }

    fn view_permission(&self) -> String {
        VIEW_ASSOCIATED_PERMISSION.to_string()
    }

    fn can_view(&self, ctx: &RequestContext) -> bool {
        ctx.has_permission(VIEW_ALL_PERMISSION) || ctx.has_permission(VIEW_ASSOCIATED_PERMISSION)
    }

    fn export_columns(&self) -> &[ExportColumn] {
        EXPORT_COLUMNS
    }

    fn dependencies(&self) -> &[DependencyEdge] {
        DEPENDENCIES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{AdviserRef, ContactRef, IdName, InteractionKind};
    use uuid::Uuid;

    #[test]
    fn test_mapping_covers_schema() {
        let app = InteractionSearchApp::new();
        app.check_mapping().unwrap();
        app.query_rules().check_against(app.schema()).unwrap();
    }

    #[test]
    fn test_document_embeds_summaries() {
        let team = IdName::new(Uuid::new_v4(), "Team A");
        let mut interaction = Interaction::new(Uuid::new_v4(), "Export advice");
        interaction.kind = InteractionKind::ServiceDelivery;
        interaction.contact = Some(ContactRef {
            id: Uuid::new_v4(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        });
        interaction.dit_adviser = Some(AdviserRef {
            id: Uuid::new_v4(),
            first_name: "Alan".into(),
            last_name: "Turing".into(),
            dit_team: Some(team.clone()),
        });

        let doc = InteractionSearchApp::new().produce_document(&interaction.into()).unwrap();
        assert_eq!(doc.get("kind"), Some(&json!("service_delivery")));
        assert_eq!(doc.get("contact").and_then(|c| c.get("name")), Some(&json!("Ada Lovelace")));
        assert_eq!(
            doc.values_at("dit_adviser.dit_team.id"),
            vec![&json!(team.id.to_string())]
        );
    }

    #[test]
    fn test_permission_rules() {
        let app = InteractionSearchApp::new();
        let team = Uuid::new_v4();

        let all = RequestContext::user(Uuid::new_v4()).with_permission(VIEW_ALL_PERMISSION);
        assert!(app.permission_rule(&all).is_unrestricted());

        let member = RequestContext::user(Uuid::new_v4()).with_team(team);
        match app.permission_rule(&member) {
            PermissionFilter::AnyOf(rules) => {
                assert_eq!(rules.len(), 2);
                assert_eq!(rules[0].field, "dit_team.id");
            }
            other => panic!("unexpected {:?}", other),
        }

        let loner = RequestContext::user(Uuid::new_v4());
        assert_eq!(app.permission_rule(&loner), PermissionFilter::ExcludeAll);

        assert!(app.can_view(&all));
        assert!(!app.can_view(&member));
        assert!(app.can_view(&member.with_permission(VIEW_ASSOCIATED_PERMISSION)));
    }
}
