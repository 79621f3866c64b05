//! Sync consistency tests.
//!
//! Every mutation of a primary-store record must leave the search documents
//! matching the store: the record's own document, and every document that
//! embeds a summary of it.
//!
//! # Running
//! ```bash
//! cargo test --test sync_consistency
//! ```

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use datahub_search::entity::{
    Adviser, AdviserRef, Company, CompanyRef, Contact, IdName, Interaction, Order,
};
use datahub_search::permissions::RequestContext;
use datahub_search::search::QuerySpec;
use datahub_search::source::InMemorySource;
use datahub_search::{
    AppRegistry, DocumentStore, Entity, EntityKind, EntityRef, InMemoryStore, MutationEvent, RetryConfig,
    SearchConfig, SearchService, SyncEngine,
};

// =============================================================================
// Fixture
// =============================================================================

struct Hub {
    source: Arc<InMemorySource>,
    store: Arc<InMemoryStore>,
    config: Arc<SearchConfig>,
    engine: Arc<SyncEngine>,
    service: SearchService,
}

async fn hub() -> Hub {
    let source = Arc::new(InMemorySource::new());
    let store = Arc::new(InMemoryStore::new());
    let registry = Arc::new(AppRegistry::datahub().unwrap());
    let config = Arc::new(SearchConfig::default());

    let service = SearchService::new(store.clone(), source.clone(), registry.clone(), config.clone())
        .with_retry(RetryConfig::none());
    service.init_all(false).await.unwrap();

    let engine = Arc::new(
        SyncEngine::new(source.clone(), store.clone(), registry, config.clone()).with_retry(RetryConfig::none()),
    );
    Hub { source, store, config, engine, service }
}

impl Hub {
    async fn doc(&self, app: &str, id: Uuid) -> Option<Value> {
        self.store
            .get_document(&self.config.read_alias(app), &id.to_string())
            .await
            .unwrap()
    }

    async fn save(&self, key: EntityRef) {
        let report = self.engine.handle(MutationEvent::Saved(key)).await;
        assert!(report.is_success(), "sync of {} failed: {:?}", key, report.failed);
    }
}

fn adviser(first: &str, last: &str) -> Adviser {
    Adviser {
        id: Uuid::new_v4(),
        first_name: first.into(),
        last_name: last.into(),
        email: format!("{}.{}@example.gov.uk", first.to_lowercase(), last.to_lowercase()),
        dit_team: Some(IdName::new(Uuid::new_v4(), "Team A")),
        is_active: true,
    }
}

fn admin() -> RequestContext {
    RequestContext::user(Uuid::new_v4())
        .with_permission("company.view_company")
        .with_permission("contact.view_contact")
}

// =============================================================================
// Own document
// =============================================================================

#[tokio::test]
async fn create_update_delete_tracks_primary_store() {
    let hub = hub().await;
    let mut company = Company::new(Uuid::new_v4(), "Acme");
    let key = hub.source.put(company.clone());
    hub.save(key).await;
    assert_eq!(hub.doc("company", key.id).await.unwrap()["name"], json!("Acme"));

    company.name = "Acme Holdings".into();
    hub.source.put(company);
    hub.save(key).await;
    assert_eq!(hub.doc("company", key.id).await.unwrap()["name"], json!("Acme Holdings"));

    hub.source.remove(key);
    let report = hub.engine.handle(MutationEvent::Deleted(key)).await;
    assert_eq!(report.deleted, vec![key]);
    assert!(hub.doc("company", key.id).await.is_none());
}

#[tokio::test]
async fn document_always_reflects_latest_state_not_event_payload() {
    let hub = hub().await;
    let mut company = Company::new(Uuid::new_v4(), "First");
    let key = hub.source.put(company.clone());

    // Two saves land before the event is handled
    company.name = "Second".into();
    hub.source.put(company);
    hub.save(key).await;
    hub.save(key).await;

    assert_eq!(hub.doc("company", key.id).await.unwrap()["name"], json!("Second"));
}

#[tokio::test]
async fn saved_event_for_missing_record_removes_document() {
    let hub = hub().await;
    let key = hub.source.put(Company::new(Uuid::new_v4(), "Gone Soon"));
    hub.save(key).await;
    hub.source.remove(key);

    let report = hub.engine.handle(MutationEvent::Saved(key)).await;
    assert_eq!(report.deleted, vec![key]);
    assert!(hub.doc("company", key.id).await.is_none());
}

#[tokio::test]
async fn archiving_is_visible_to_filters() {
    let hub = hub().await;
    let mut company = Company::new(Uuid::new_v4(), "Acme");
    let key = hub.source.put(company.clone());
    hub.save(key).await;

    let by = AdviserRef::from(&adviser("Ada", "Lovelace"));
    company.archivable.archive(Some(by), Some("Dissolved".into()), chrono::Utc::now());
    hub.source.put(company);
    hub.save(key).await;

    let active = hub
        .service
        .search(&admin(), "company", &QuerySpec::new().filter("archived", false))
        .await
        .unwrap();
    assert_eq!(active.count, 0);

    let archived = hub
        .service
        .search(&admin(), "company", &QuerySpec::new().filter("archived", "true"))
        .await
        .unwrap();
    assert_eq!(archived.count, 1);
    assert_eq!(archived.results[0]["archived_reason"], json!("Dissolved"));
}

// =============================================================================
// Cascade
// =============================================================================

#[tokio::test]
async fn adviser_rename_reaches_every_embedding_document() {
    let hub = hub().await;
    let mut ada = adviser("Ada", "Lovelace");
    let ada_key = hub.source.put(ada.clone());

    let mut company = Company::new(Uuid::new_v4(), "Acme");
    company.account_manager = Some(AdviserRef::from(&ada));
    let company_key = hub.source.put(company.clone());

    let mut contact = Contact::new(Uuid::new_v4(), "Grace", "Hopper");
    contact.adviser = Some(AdviserRef::from(&ada));
    contact.company = Some(CompanyRef::from(&company));
    let contact_key = hub.source.put(contact);

    let mut interaction = Interaction::new(Uuid::new_v4(), "Export advice");
    interaction.dit_adviser = Some(AdviserRef::from(&ada));
    let interaction_key = hub.source.put(interaction);

    let mut order = Order::new(Uuid::new_v4(), "ABC123/24");
    order.assignees = vec![AdviserRef::from(&ada)];
    let order_key = hub.source.put(order);

    for key in [company_key, contact_key, interaction_key, order_key] {
        hub.save(key).await;
    }

    ada.last_name = "King".into();
    hub.source.put(ada.clone());
    // The primary store refreshes its denormalized copies on save
    for key in [company_key, contact_key, interaction_key, order_key] {
        hub.source.update(key, |entity| {
            let renamed = Some(AdviserRef::from(&ada));
            match entity {
                Entity::Company(c) => c.account_manager = renamed,
                Entity::Contact(c) => c.adviser = renamed,
                Entity::Interaction(i) => i.dit_adviser = renamed,
                Entity::Order(o) => o.assignees = renamed.into_iter().collect(),
                Entity::Adviser(_) => {}
            }
        });
    }

    let report = hub.engine.handle(MutationEvent::Saved(ada_key)).await;
    assert!(report.is_success());
    for key in [company_key, contact_key, interaction_key, order_key] {
        assert!(report.indexed.contains(&key), "{} was not refreshed", key);
    }

    assert_eq!(
        hub.doc("company", company_key.id).await.unwrap()["account_manager"]["name"],
        json!("Ada King")
    );
    assert_eq!(hub.doc("contact", contact_key.id).await.unwrap()["adviser"]["name"], json!("Ada King"));
    assert_eq!(
        hub.doc("interaction", interaction_key.id).await.unwrap()["dit_adviser"]["last_name"],
        json!("King")
    );
    assert_eq!(
        hub.doc("order", order_key.id).await.unwrap()["assignees"][0]["name"],
        json!("Ada King")
    );
}

#[tokio::test]
async fn cascade_leaves_unrelated_documents_alone() {
    let hub = hub().await;
    let company = Company::new(Uuid::new_v4(), "Acme");
    let company_key = hub.source.put(company.clone());
    let other = Company::new(Uuid::new_v4(), "Other");

    let mut linked = Contact::new(Uuid::new_v4(), "Grace", "Hopper");
    linked.company = Some(CompanyRef::from(&company));
    let linked_key = hub.source.put(linked);
    let mut unlinked = Contact::new(Uuid::new_v4(), "Alan", "Turing");
    unlinked.company = Some(CompanyRef::from(&other));
    let unlinked_key = hub.source.put(unlinked);

    let report = hub.engine.handle(MutationEvent::Saved(company_key)).await;
    assert!(report.indexed.contains(&linked_key));
    assert!(!report.indexed.contains(&unlinked_key));
}

#[tokio::test]
async fn deleting_a_referenced_record_keeps_dependent_snapshots() {
    let hub = hub().await;
    let company = Company::new(Uuid::new_v4(), "Acme");
    let company_key = hub.source.put(company.clone());
    let mut contact = Contact::new(Uuid::new_v4(), "Grace", "Hopper");
    contact.company = Some(CompanyRef::from(&company));
    let contact_key = hub.source.put(contact);
    hub.save(company_key).await;

    hub.source.remove(company_key);
    let report = hub.engine.handle(MutationEvent::Deleted(company_key)).await;
    assert_eq!(report.deleted, vec![company_key]);
    assert!(!report.indexed.contains(&contact_key));
    assert_eq!(
        hub.doc("contact", contact_key.id).await.unwrap()["company"]["name"],
        json!("Acme")
    );
}

// =============================================================================
// Control and failures
// =============================================================================

#[tokio::test]
async fn disconnected_kind_is_brought_back_by_resync() {
    let hub = hub().await;
    hub.engine.disconnect(EntityKind::Company);
    let key = hub.source.put(Company::new(Uuid::new_v4(), "Bulk Import Ltd"));
    let report = hub.engine.handle(MutationEvent::Saved(key)).await;
    assert_eq!(report.skipped, vec![key]);
    hub.engine.connect(EntityKind::Company);

    assert!(hub.doc("company", key.id).await.is_none());
    let resync = hub.service.resync("company").await.unwrap();
    assert!(resync.is_success());
    assert!(hub.doc("company", key.id).await.is_some());
}

#[tokio::test]
async fn source_outage_parks_and_retry_recovers() {
    let hub = hub().await;
    let key = hub.source.put(Company::new(Uuid::new_v4(), "Acme"));

    hub.source.set_unavailable(true);
    let report = hub.engine.handle(MutationEvent::Saved(key)).await;
    assert!(!report.is_success());
    assert_eq!(hub.engine.failed(), vec![key]);

    // Still down: stays parked
    let report = hub.engine.retry_failed().await;
    assert!(!report.is_success());
    assert_eq!(hub.engine.failed(), vec![key]);

    hub.source.set_unavailable(false);
    let report = hub.engine.retry_failed().await;
    assert!(report.is_success());
    assert!(hub.engine.failed().is_empty());
    assert!(hub.doc("company", key.id).await.is_some());
}

#[tokio::test]
async fn notify_after_worker_stops_parks_the_entity() {
    let hub = hub().await;
    let (sender, worker) = Arc::clone(&hub.engine).spawn();
    let probe = sender.clone();
    drop(sender);
    worker.abort();
    let _ = worker.await;

    let key = hub.source.put(Company::new(Uuid::new_v4(), "Late Ltd"));
    probe.notify(MutationEvent::Saved(key));
    assert_eq!(hub.engine.failed(), vec![key]);

    hub.engine.retry_failed().await;
    assert!(hub.doc("company", key.id).await.is_some());
}

#[tokio::test]
async fn worker_drains_queue_before_stopping() {
    let hub = hub().await;
    let (sender, worker) = Arc::clone(&hub.engine).spawn();

    let keys: Vec<EntityRef> = (0..20)
        .map(|i| hub.source.put(Company::new(Uuid::new_v4(), format!("Company {}", i))))
        .collect();
    for key in &keys {
        sender.send(MutationEvent::Saved(*key)).await.unwrap();
    }
    drop(sender);
    worker.await.unwrap();

    for key in keys {
        assert!(hub.doc("company", key.id).await.is_some());
    }
}
