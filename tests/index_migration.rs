//! Index lifecycle tests: creation, in-place mapping updates and versioned
//! migrations with backfill.
//!
//! An "old" index version is simulated by creating a physical index with a
//! different mapping and binding both aliases to it, which is what a
//! deployment with an older schema leaves behind.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use datahub_search::entity::Company;
use datahub_search::permissions::RequestContext;
use datahub_search::schema::{Analyzer, DocumentSchema};
use datahub_search::search::{MigrationOutcome, QuerySpec};
use datahub_search::source::InMemorySource;
use datahub_search::storage::AliasAction;
use datahub_search::{
    AppRegistry, DocumentStore, InMemoryStore, RetryConfig, SearchConfig, SearchService,
};

const OLD_INDEX: &str = "datahub-company-0000000000";

struct Deployment {
    store: Arc<InMemoryStore>,
    source: Arc<InMemorySource>,
    config: Arc<SearchConfig>,
    service: SearchService,
}

fn deployment() -> Deployment {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(InMemorySource::new());
    let config = Arc::new(SearchConfig::default());
    let service = SearchService::new(
        store.clone(),
        source.clone(),
        Arc::new(AppRegistry::datahub().unwrap()),
        config.clone(),
    )
    .with_retry(RetryConfig::none());
    Deployment { store, source, config, service }
}

impl Deployment {
    /// Leave `schema` behind as the live company index.
    async fn with_old_index(&self, schema: DocumentSchema) {
        self.store.create_index(OLD_INDEX, &schema.to_index_body()).await.unwrap();
        self.store
            .update_aliases(&[
                AliasAction::add(self.config.read_alias("company"), OLD_INDEX),
                AliasAction::add(self.config.write_alias("company"), OLD_INDEX),
            ])
            .await
            .unwrap();
    }

    async fn aliases(&self) -> (Vec<String>, Vec<String>) {
        (
            self.store.get_alias(&self.config.read_alias("company")).await.unwrap(),
            self.store.get_alias(&self.config.write_alias("company")).await.unwrap(),
        )
    }
}

fn viewer() -> RequestContext {
    RequestContext::user(Uuid::new_v4()).with_permission("company.view_company")
}

#[tokio::test]
async fn fresh_init_creates_versioned_index_behind_both_aliases() {
    let d = deployment();
    let outcome = d.service.init("company", false).await.unwrap();
    let target = d.service.index_manager().target_index("company").unwrap();

    assert_eq!(outcome, MigrationOutcome::Created { index: target.clone() });
    assert!(target.starts_with("datahub-company-"));
    assert_eq!(d.aliases().await, (vec![target.clone()], vec![target]));
    assert!(d.service.is_initialized("company").await.unwrap());
}

#[tokio::test]
async fn init_is_idempotent() {
    let d = deployment();
    d.service.init("company", false).await.unwrap();
    let before = d.store.index_names();

    let outcome = d.service.init("company", true).await.unwrap();
    assert!(matches!(outcome, MigrationOutcome::Unchanged { .. }));
    assert_eq!(d.store.index_names(), before);
}

#[tokio::test]
async fn schema_change_migrates_and_backfills() {
    let d = deployment();
    d.with_old_index(DocumentSchema::new("company").keyword("id")).await;
    for i in 0..5 {
        d.source.put(Company::new(Uuid::new_v4(), format!("Company {}", i)));
    }

    let outcome = d.service.init("company", false).await.unwrap();
    let target = d.service.index_manager().target_index("company").unwrap();
    assert_eq!(
        outcome,
        MigrationOutcome::Migrated {
            from: OLD_INDEX.to_string(),
            to: target.clone(),
            backfilled: 5,
            conflict: None,
        }
    );
    assert_eq!(d.aliases().await, (vec![target.clone()], vec![target.clone()]));
    assert!(!d.store.index_names().contains(&OLD_INDEX.to_string()));
    assert_eq!(d.store.doc_count(&target), 5);

    let found = d.service.search(&viewer(), "company", &QuerySpec::new()).await.unwrap();
    assert_eq!(found.count, 5);
}

#[tokio::test]
async fn forced_compatible_change_updates_in_place() {
    let d = deployment();
    d.with_old_index(DocumentSchema::new("company").keyword("id")).await;

    let outcome = d.service.init("company", true).await.unwrap();
    assert_eq!(outcome, MigrationOutcome::UpdatedInPlace { index: OLD_INDEX.to_string() });

    let mapping = d.store.get_mapping(OLD_INDEX).await.unwrap();
    assert_eq!(mapping["properties"]["company_number"]["type"], json!("text"));
    assert_eq!(d.aliases().await, (vec![OLD_INDEX.to_string()], vec![OLD_INDEX.to_string()]));
}

#[tokio::test]
async fn forced_conflicting_change_falls_back_to_migration() {
    let d = deployment();
    // `name` was a plain keyword in the old version
    d.with_old_index(DocumentSchema::new("company").keyword("id").keyword("name")).await;
    d.source.put(Company::new(Uuid::new_v4(), "Acme"));

    let outcome = d.service.init("company", true).await.unwrap();
    match outcome {
        MigrationOutcome::Migrated { from, backfilled, conflict, .. } => {
            assert_eq!(from, OLD_INDEX);
            assert_eq!(backfilled, 1);
            assert!(conflict.is_some());
        }
        other => panic!("expected a migration, got {:?}", other),
    }
}

#[tokio::test]
async fn documents_written_during_migration_land_in_new_version() {
    let d = deployment();
    d.with_old_index(DocumentSchema::new("company").keyword("id").text("name", Analyzer::Standard))
        .await;
    d.service.init("company", false).await.unwrap();
    let target = d.service.index_manager().target_index("company").unwrap();

    // After the swap, writes through the write alias reach the new index
    let key = d.source.put(Company::new(Uuid::new_v4(), "Late Arrival"));
    let report = d.service.resync("company").await.unwrap();
    assert_eq!(report.index, d.config.write_alias("company"));
    assert!(d
        .store
        .get_document(&target, &key.id.to_string())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn unknown_app_is_rejected() {
    let d = deployment();
    assert!(d.service.init("referral", false).await.is_err());
    assert!(d.service.is_initialized("referral").await.is_err());
}
