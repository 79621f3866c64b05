// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Data Hub Search
//!
//! Keeps a search document store in step with the Data Hub CRM records and
//! turns user search requests into permission-scoped document store queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Primary store (EntitySource)              │
//! │  • Companies, contacts, interactions, OMIS orders           │
//! └─────────────────────────────────────────────────────────────┘
//!            │ MutationEvent                 │ scan (re-sync)
//!            ▼                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 SyncEngine / Resyncer                       │
//! │  • SearchApp::produce_document (mapping rules)             │
//! │  • Cascade to documents embedding the saved record         │
//! │  • HybridBatcher bounds bulk requests by count and bytes   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ write alias
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                DocumentStore (Elasticsearch)                │
//! │  • One versioned index per app, read and write aliases     │
//! │  • IndexManager creates and migrates index versions        │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲ read alias
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SearchService                         │
//! │  • Composer: QuerySpec + QueryRules + permission filter    │
//! │  • search, export, autocomplete                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use datahub_search::entity::Company;
//! use datahub_search::permissions::RequestContext;
//! use datahub_search::search::QuerySpec;
//! use datahub_search::source::InMemorySource;
//! use datahub_search::{
//!     AppRegistry, ElasticsearchStore, MutationEvent, SearchConfig, SearchService, SyncEngine,
//! };
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(SearchConfig::default());
//!     let store = Arc::new(ElasticsearchStore::from_config(&config).expect("http client"));
//!     let source = Arc::new(InMemorySource::new());
//!     let registry = Arc::new(AppRegistry::datahub().expect("valid apps"));
//!
//!     let service = SearchService::new(store.clone(), source.clone(), registry.clone(), config.clone());
//!     service.init_all(false).await.expect("indices ready");
//!
//!     let engine = Arc::new(SyncEngine::new(source.clone(), store, registry, config));
//!     let (sender, _worker) = engine.spawn();
//!
//!     let key = source.put(Company::new(Uuid::new_v4(), "Acme Ltd"));
//!     sender.notify(MutationEvent::Saved(key));
//!
//!     let ctx = RequestContext::user(Uuid::new_v4()).with_permission("company.view_company");
//!     let page = service
//!         .search(&ctx, "company", &QuerySpec::new().term("acme"))
//!         .await
//!         .expect("search");
//!     println!("{} matches", page.count);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`entity`]: Primary-store record types
//! - [`schema`]: Document schemas and index mappings
//! - [`mapping`]: Record to document mapping rules
//! - [`apps`]: One [`apps::SearchApp`] per searchable record type
//! - [`registry`]: The validated set of apps
//! - [`sync`]: Event-driven sync and full re-sync
//! - [`search`]: Query composition and index lifecycle
//! - [`service`]: Search, export and autocomplete entry points
//! - [`storage`]: Document store backends (Elasticsearch, memory)

pub mod apps;
pub mod batching;
pub mod config;
pub mod document;
pub mod entity;
pub mod mapping;
pub mod metrics;
pub mod permissions;
pub mod registry;
pub mod resilience;
pub mod schema;
pub mod search;
pub mod service;
pub mod source;
pub mod storage;
pub mod sync;

pub use apps::SearchApp;
pub use config::SearchConfig;
pub use document::Document;
pub use entity::{Entity, EntityKind, EntityRef};
pub use registry::{AppRegistry, RegistryError};
pub use resilience::RetryConfig;
pub use service::{ApiError, SearchService};
pub use storage::{DocumentStore, ElasticsearchStore, InMemoryStore, StorageError};
pub use sync::{MutationEvent, MutationSender, SyncEngine, SyncError, SyncReport};
pub use metrics::LatencyTimer;
