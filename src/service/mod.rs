// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Service
//!
//! The surface the rest of the system calls: search, export and
//! autocomplete for users, plus index administration.
//!
//! ```text
//! search(ctx, app, spec)
//!       │
//!       ├─→ authenticated? may view app?
//!       ├─→ Composer (app QueryRules + permission filter)
//!       │        │
//!       │        └─→ MatchNothing? answer {count: 0} without the store
//!       └─→ DocumentStore::search(read alias)
//! ```
//!
//! The `impl SearchService` is split by concern: `search_api` holds the
//! user-facing reads, `admin_api` the index lifecycle and re-sync calls.

mod admin_api;
mod search_api;
mod types;

pub use types::{ApiError, AutocompleteRequest, ExportTable, SearchResponse};

use std::sync::Arc;

use crate::config::SearchConfig;
use crate::registry::AppRegistry;
use crate::resilience::RetryConfig;
use crate::search::IndexManager;
use crate::source::EntitySource;
use crate::storage::DocumentStore;
use crate::sync::Resyncer;

/// Search, export, autocomplete and index administration over one store.
pub struct SearchService {
    store: Arc<dyn DocumentStore>,
    registry: Arc<AppRegistry>,
    config: Arc<SearchConfig>,
    index_manager: IndexManager,
    resyncer: Resyncer,
    query_retry: RetryConfig,
}

impl SearchService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        source: Arc<dyn EntitySource>,
        registry: Arc<AppRegistry>,
        config: Arc<SearchConfig>,
    ) -> Self {
        let index_manager = IndexManager::new(store.clone(), registry.clone(), config.clone());
        let resyncer = Resyncer::new(source, store.clone(), registry.clone(), config.clone());
        Self {
            store,
            registry,
            config,
            index_manager,
            resyncer,
            query_retry: RetryConfig::query(),
        }
    }

    /// Replace every retry policy (index setup, bulk writes and reads).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.index_manager = self.index_manager.with_retry(retry.clone());
        self.resyncer = self.resyncer.with_retry(retry.clone());
        self.query_retry = retry;
        self
    }

    pub fn registry(&self) -> &Arc<AppRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn index_manager(&self) -> &IndexManager {
        &self.index_manager
    }

    pub fn resyncer(&self) -> &Resyncer {
        &self.resyncer
    }
}
