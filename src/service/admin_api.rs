// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index lifecycle and re-sync entry points.

use futures::future::try_join_all;
use tracing::{info, instrument};

use super::SearchService;
use crate::search::{LifecycleError, MigrationOutcome};
use crate::sync::{ResyncReport, SyncError};

impl SearchService {
    /// Create the app's index if needed, or bring an existing one in line
    /// with the current schema.
    ///
    /// With `force_remap`, a mapping change that cannot be merged in place
    /// is handled by building a new index version and backfilling it.
    pub async fn init(&self, app: &str, force_remap: bool) -> Result<MigrationOutcome, LifecycleError> {
        self.index_manager.migrate_mapping(app, force_remap, &self.resyncer).await
    }

    /// [`init`](Self::init) for every registered app. Apps are initialized
    /// concurrently; outcomes come back in registration order.
    #[instrument(skip(self))]
    pub async fn init_all(&self, force_remap: bool) -> Result<Vec<MigrationOutcome>, LifecycleError> {
        try_join_all(self.registry.names().map(|name| async move {
            let outcome = self.init(name, force_remap).await?;
            info!(app = name, outcome = ?outcome, "App index ready");
            Ok::<_, LifecycleError>(outcome)
        }))
        .await
    }

    /// Whether both aliases of `app` are bound.
    pub async fn is_initialized(&self, app: &str) -> Result<bool, LifecycleError> {
        self.index_manager.is_initialized(app).await
    }

    /// Rewrite every document of `app` from the primary store.
    pub async fn resync(&self, app: &str) -> Result<ResyncReport, SyncError> {
        self.resyncer.resync(app).await
    }

    pub async fn resync_all(&self) -> Result<Vec<ResyncReport>, SyncError> {
        self.resyncer.resync_all().await
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SearchConfig;
    use crate::entity::Company;
    use crate::registry::AppRegistry;
    use crate::resilience::RetryConfig;
    use crate::search::MigrationOutcome;
    use crate::service::SearchService;
    use crate::source::InMemorySource;
    use crate::storage::InMemoryStore;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_init_all_then_resync() {
        let source = Arc::new(InMemorySource::new());
        source.put(Company::new(Uuid::new_v4(), "Acme"));
        let service = SearchService::new(
            Arc::new(InMemoryStore::new()),
            source,
            Arc::new(AppRegistry::datahub().unwrap()),
            Arc::new(SearchConfig::default()),
        )
        .with_retry(RetryConfig::test());

        assert!(!service.is_initialized("company").await.unwrap());
        let outcomes = service.init_all(false).await.unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| matches!(o, MigrationOutcome::Created { .. })));
        assert!(service.is_initialized("company").await.unwrap());

        let again = service.init("company", false).await.unwrap();
        assert!(matches!(again, MigrationOutcome::Unchanged { .. }));

        let reports = service.resync_all().await.unwrap();
        assert_eq!(reports.iter().map(|r| r.written()).sum::<usize>(), 1);
    }
}
