//! Counters, gauges and histograms emitted through the `metrics` facade.
//!
//! Nothing here installs a recorder. The host process picks the exporter;
//! without one every call is a no-op.
//!
//! | Metric                                   | Kind      | Labels                      |
//! |------------------------------------------|-----------|-----------------------------|
//! | `datahub_search_sync_operations_total`   | counter   | app, operation, status      |
//! | `datahub_search_sync_failures_total`     | counter   | app, error_type             |
//! | `datahub_search_sync_failed_pending`     | gauge     |                             |
//! | `datahub_search_cascade_documents`       | histogram | app                         |
//! | `datahub_search_operation_seconds`       | histogram | app, operation              |
//! | `datahub_search_bulk_batches_total`      | counter   | app, status                 |
//! | `datahub_search_bulk_batch_size`         | histogram | app                         |
//! | `datahub_search_bulk_batch_bytes`        | histogram | app                         |
//! | `datahub_search_queries_total`           | counter   | app, kind, status           |
//! | `datahub_search_query_results`           | histogram | app                         |
//! | `datahub_search_index_operations_total`  | counter   | app, operation, status      |

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

const SYNC_OPERATIONS: &str = "datahub_search_sync_operations_total";
const SYNC_FAILURES: &str = "datahub_search_sync_failures_total";
const SYNC_FAILED_PENDING: &str = "datahub_search_sync_failed_pending";
const CASCADE_DOCUMENTS: &str = "datahub_search_cascade_documents";
const OPERATION_SECONDS: &str = "datahub_search_operation_seconds";
const BULK_BATCHES: &str = "datahub_search_bulk_batches_total";
const BULK_BATCH_SIZE: &str = "datahub_search_bulk_batch_size";
const BULK_BATCH_BYTES: &str = "datahub_search_bulk_batch_bytes";
const QUERIES: &str = "datahub_search_queries_total";
const QUERY_RESULTS: &str = "datahub_search_query_results";
const INDEX_OPERATIONS: &str = "datahub_search_index_operations_total";

fn status(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

// sync

/// `status` is one of success, error or skipped (unchanged content hash).
pub fn record_sync(app: &str, operation: &str, status: &str) {
    counter!(
        SYNC_OPERATIONS,
        "app" => app.to_owned(),
        "operation" => operation.to_owned(),
        "status" => status.to_owned()
    )
    .increment(1);
}

pub fn record_sync_failure(app: &str, error_type: &str) {
    counter!(SYNC_FAILURES, "app" => app.to_owned(), "error_type" => error_type.to_owned()).increment(1);
}

/// Size of the failed-sync registry.
pub fn set_failed_pending(count: usize) {
    gauge!(SYNC_FAILED_PENDING).set(count as f64);
}

pub fn record_cascade_size(app: &str, count: usize) {
    histogram!(CASCADE_DOCUMENTS, "app" => app.to_owned()).record(count as f64);
}

pub fn record_latency(app: &str, operation: &str, duration: Duration) {
    histogram!(OPERATION_SECONDS, "app" => app.to_owned(), "operation" => operation.to_owned())
        .record(duration.as_secs_f64());
}

// bulk

pub fn record_bulk_batch(app: &str, count: usize, bytes: usize, success: bool) {
    let app = app.to_owned();
    counter!(BULK_BATCHES, "app" => app.clone(), "status" => status(success)).increment(1);
    histogram!(BULK_BATCH_SIZE, "app" => app.clone()).record(count as f64);
    histogram!(BULK_BATCH_BYTES, "app" => app).record(bytes as f64);
}

// queries

/// `kind` is search, export or autocomplete.
pub fn record_query(app: &str, kind: &str, status: &str) {
    counter!(
        QUERIES,
        "app" => app.to_owned(),
        "kind" => kind.to_owned(),
        "status" => status.to_owned()
    )
    .increment(1);
}

pub fn record_query_results(app: &str, total: u64) {
    histogram!(QUERY_RESULTS, "app" => app.to_owned()).record(total as f64);
}

// index lifecycle

pub fn record_index_operation(app: &str, operation: &str, success: bool) {
    counter!(
        INDEX_OPERATIONS,
        "app" => app.to_owned(),
        "operation" => operation.to_owned(),
        "status" => status(success)
    )
    .increment(1);
}

/// Records `datahub_search_operation_seconds` when dropped, so early returns
/// and `?` are timed too.
#[must_use = "the timer records when dropped"]
pub struct LatencyTimer {
    app: String,
    operation: &'static str,
    started: Instant,
}

impl LatencyTimer {
    pub fn new(app: impl Into<String>, operation: &'static str) -> Self {
        Self { app: app.into(), operation, started: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(&self.app, self.operation, self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // No recorder is installed, so these only check the calls are safe.

    #[test]
    fn test_recording_without_recorder() {
        record_sync("company", "upsert", "success");
        record_sync_failure("order", "storage");
        set_failed_pending(3);
        record_cascade_size("interaction", 12);
        record_bulk_batch("company", 2000, 1 << 20, true);
        record_query("contact", "autocomplete", "excluded");
        record_query_results("company", 42);
        record_index_operation("company", "swap_read_alias", false);
    }

    #[test]
    fn test_timer_measures_until_drop() {
        let timer = LatencyTimer::new("company", "search");
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() >= Duration::from_millis(2));
        drop(timer);
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status(true), "success");
        assert_eq!(status(false), "failure");
    }
}
