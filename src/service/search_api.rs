//! Search, export and autocomplete.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{ApiError, AutocompleteRequest, ExportTable, SearchResponse, SearchService};
use crate::apps::SearchApp;
use crate::metrics;
use crate::permissions::{PermissionFilter, RequestContext};
use crate::resilience::retry_if;
use crate::search::{autocomplete_query, Composed, Composer, QuerySpec, SearchRequest, SortKey, ValidationError};
use crate::storage::{SearchHits, StorageError};

impl SearchService {
    // ═══════════════════════════════════════════════════════════════════════════
    // Search
    // ═══════════════════════════════════════════════════════════════════════════

    /// One page of matches for `spec`, scoped to what the caller may see.
    pub async fn search(
        &self,
        ctx: &RequestContext,
        app: &str,
        spec: &QuerySpec,
    ) -> Result<SearchResponse, ApiError> {
        let app = self.authorize_view(ctx, app)?;
        let _timer = metrics::LatencyTimer::new(app.name(), "search");

        let request = match self.compose(app.as_ref(), ctx, spec, "search")? {
            Some(request) => request,
            None => return Ok(SearchResponse::empty()),
        };
        let hits = self.run(app.as_ref(), "search", &request).await?;
        metrics::record_query_results(app.name(), hits.total);
        debug!(app = app.name(), total = hits.total, returned = hits.hits.len(), "Search complete");

        Ok(SearchResponse {
            count: hits.total,
            results: hits.hits.into_iter().map(|hit| hit.source).collect(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Export
    // ═══════════════════════════════════════════════════════════════════════════

    /// Every match of `spec` as a table, in the app's column order.
    ///
    /// The requested window is ignored; matches are read page by page in
    /// the composed sort order, which always ends with `id`.
    pub async fn export(
        &self,
        ctx: &RequestContext,
        app: &str,
        spec: &QuerySpec,
    ) -> Result<ExportTable, ApiError> {
        let app = self.authorize_view(ctx, app)?;
        let permission = app.export_permission();
        if !ctx.has_permission(&permission) {
            metrics::record_query(app.name(), "export", "forbidden");
            return Err(ApiError::Forbidden { permission });
        }
        let _timer = metrics::LatencyTimer::new(app.name(), "export");
        let start = Instant::now();

        let columns = app.export_columns();
        let mut table = ExportTable {
            headers: columns.iter().map(|c| c.header.to_string()).collect(),
            rows: Vec::new(),
        };
        let Some(request) = self.compose(app.as_ref(), ctx, spec, "export")? else {
            return Ok(table);
        };

        // Pages after the first resume from the last hit's sort values, so an
        // export is not capped by the store's result window.
        let page = self.config.export_batch_size.max(1);
        let mut paged = request.clone().with_window(0, page);
        loop {
            let hits = self.run(app.as_ref(), "export", &paged).await?;
            let fetched = hits.hits.len();
            let cursor = hits.hits.last().map(|hit| hit.sort.clone()).unwrap_or_default();
            for hit in hits.hits {
                let source = match hit.source {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                table
                    .rows
                    .push(columns.iter().map(|c| c.render(&source, &self.config)).collect());
            }
            if fetched < page || table.rows.len() as u64 >= hits.total || cursor.is_empty() {
                break;
            }
            paged = request.clone().with_window(0, page).with_search_after(cursor);
        }

        info!(
            app = app.name(),
            rows = table.rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Export complete"
        );
        Ok(table)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Autocomplete
    // ═══════════════════════════════════════════════════════════════════════════

    /// Prefix suggestions on the app's suggestion field.
    ///
    /// Autocomplete has no filter support, so a caller whose results would
    /// need restricting is refused rather than shown unfiltered matches.
    pub async fn autocomplete(
        &self,
        ctx: &RequestContext,
        app: &str,
        request: &AutocompleteRequest,
    ) -> Result<SearchResponse, ApiError> {
        let app = self.authorize_view(ctx, app)?;
        let rules = app.autocomplete().ok_or_else(|| {
            ApiError::Validation(vec![ValidationError::new(
                "term",
                format!("Autocomplete is not available for {}.", app.name()),
            )])
        })?;

        let term = request.term.trim();
        if term.is_empty() {
            return Err(ApiError::Validation(vec![ValidationError::new(
                "term",
                "This field may not be blank.",
            )]));
        }

        match app.permission_rule(ctx) {
            PermissionFilter::Unrestricted => {}
            PermissionFilter::ExcludeAll => {
                metrics::record_query(app.name(), "autocomplete", "excluded");
                return Ok(SearchResponse::empty());
            }
            PermissionFilter::AnyOf(_) => {
                metrics::record_query(app.name(), "autocomplete", "rejected");
                return Err(ApiError::AutocompleteFilteringUnsupported);
            }
        }

        let limit = request.limit.unwrap_or(self.config.autocomplete_default_limit);
        let search = SearchRequest::new(autocomplete_query(rules.field, term))
            .with_sort(vec![SortKey::score(), SortKey::asc("id")])
            .with_window(0, limit);
        let hits = self.run(app.as_ref(), "autocomplete", &search).await?;

        let results = hits
            .hits
            .into_iter()
            .map(|hit| {
                let mut projected = Map::new();
                if let Value::Object(source) = hit.source {
                    for field in rules.source_fields {
                        if let Some(value) = source.get(*field) {
                            projected.insert((*field).to_string(), value.clone());
                        }
                    }
                }
                Value::Object(projected)
            })
            .collect();
        Ok(SearchResponse {
            count: hits.total,
            results,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════════

    fn authorize_view(&self, ctx: &RequestContext, app: &str) -> Result<&Arc<dyn SearchApp>, ApiError> {
        if !ctx.is_authenticated() {
            return Err(ApiError::Unauthenticated);
        }
        let app = self.registry.get(app)?;
        if !app.can_view(ctx) {
            metrics::record_query(app.name(), "search", "forbidden");
            return Err(ApiError::Forbidden {
                permission: app.view_permission(),
            });
        }
        Ok(app)
    }

    /// `None` when the caller may see nothing at all.
    fn compose(
        &self,
        app: &dyn SearchApp,
        ctx: &RequestContext,
        spec: &QuerySpec,
        kind: &str,
    ) -> Result<Option<SearchRequest>, ApiError> {
        let composer = Composer::new(app.schema(), app.query_rules(), &self.config);
        match composer.compose(spec, &app.permission_rule(ctx)) {
            Ok(Composed::Request(request)) => Ok(Some(request)),
            Ok(Composed::MatchNothing) => {
                debug!(app = app.name(), kind, "Permission excludes every result");
                metrics::record_query(app.name(), kind, "excluded");
                Ok(None)
            }
            Err(errors) => {
                metrics::record_query(app.name(), kind, "invalid");
                Err(ApiError::Validation(errors))
            }
        }
    }

    async fn run(&self, app: &dyn SearchApp, kind: &str, request: &SearchRequest) -> Result<SearchHits, ApiError> {
        let alias = self.config.read_alias(app.name());
        let result = retry_if(
            kind,
            &self.query_retry,
            || self.store.search(&alias, request),
            StorageError::is_transient,
        )
        .await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_query(app.name(), kind, status);
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::entity::{Company, EntityKind};
    use crate::registry::AppRegistry;
    use crate::resilience::RetryConfig;
    use crate::source::InMemorySource;
    use crate::storage::InMemoryStore;
    use serde_json::json;
    use uuid::Uuid;

    async fn service(names: &[&str]) -> SearchService {
        let source = Arc::new(InMemorySource::new());
        for name in names {
            source.put(Company::new(Uuid::new_v4(), *name));
        }
        let service = SearchService::new(
            Arc::new(InMemoryStore::new()),
            source,
            Arc::new(AppRegistry::datahub().unwrap()),
            Arc::new(SearchConfig::default()),
        )
        .with_retry(RetryConfig::test());
        service.init("company", false).await.unwrap();
        service.resync("company").await.unwrap();
        service
    }

    fn viewer() -> RequestContext {
        RequestContext::user(Uuid::new_v4()).with_permission("company.view_company")
    }

    #[tokio::test]
    async fn test_search_requires_authentication_and_permission() {
        let service = service(&["Acme"]).await;
        let spec = QuerySpec::new();

        assert_eq!(
            service.search(&RequestContext::anonymous(), "company", &spec).await,
            Err(ApiError::Unauthenticated)
        );
        assert_eq!(
            service.search(&RequestContext::user(Uuid::new_v4()), "company", &spec).await,
            Err(ApiError::Forbidden { permission: "company.view_company".into() })
        );
        let found = service.search(&viewer(), "company", &spec).await.unwrap();
        assert_eq!(found.count, 1);
        assert_eq!(found.results[0]["name"], json!("Acme"));
    }

    #[tokio::test]
    async fn test_search_unknown_app() {
        let service = service(&[]).await;
        assert!(matches!(
            service.search(&viewer(), "referral", &QuerySpec::new()).await,
            Err(ApiError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn test_export_needs_export_permission() {
        let service = service(&["Acme", "Beta"]).await;
        let err = service.export(&viewer(), "company", &QuerySpec::new()).await.unwrap_err();
        assert_eq!(err, ApiError::Forbidden { permission: "company.export_company".into() });

        let ctx = viewer().with_permission("company.export_company");
        let table = service.export(&ctx, "company", &QuerySpec::new().window(0, 1)).await.unwrap();
        assert_eq!(table.headers[0], "Name");
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_autocomplete_projects_source_fields() {
        let service = service(&["Abc Defg Ltd", "Zeta"]).await;
        let response = service
            .autocomplete(&viewer(), "company", &AutocompleteRequest::new("DEF"))
            .await
            .unwrap();
        assert_eq!(response.count, 1);
        let result = response.results[0].as_object().unwrap();
        assert_eq!(result["name"], json!("Abc Defg Ltd"));
        assert!(result.contains_key("id"));
        assert!(!result.contains_key("suggest"));

        let blank = service
            .autocomplete(&viewer(), "company", &AutocompleteRequest::new("  "))
            .await;
        assert!(matches!(blank, Err(ApiError::Validation(_))));
        assert_eq!(EntityKind::Company.as_str(), "company");
    }
}
