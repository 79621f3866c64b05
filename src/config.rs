// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the search layer.
//!
//! # Example
//!
//! ```
//! use datahub_search::SearchConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SearchConfig::default();
//! assert_eq!(config.bulk_batch_size, 2000);
//! assert_eq!(config.read_alias("company"), "datahub-company-read");
//!
//! // Full config
//! let config = SearchConfig {
//!     es_url: "http://es.internal:9200".into(),
//!     index_prefix: "test".into(),
//!     bulk_batch_size: 500,
//!     ..Default::default()
//! };
//! assert_eq!(config.write_alias("order"), "test-order-write");
//! ```

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the search layer.
///
/// All fields have sensible defaults; only `es_url` normally needs setting
/// outside tests.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Document store base URL (e.g., "http://localhost:9200")
    #[serde(default = "default_es_url")]
    pub es_url: String,

    /// Prefix of every index and alias name
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Bulk write settings (resync and migration backfill)
    #[serde(default = "default_bulk_batch_size")]
    pub bulk_batch_size: usize,
    #[serde(default = "default_bulk_batch_bytes")]
    pub bulk_batch_bytes: usize,

    /// Page size used internally when exporting every match
    #[serde(default = "default_export_batch_size")]
    pub export_batch_size: usize,

    /// Search limit when the request gives none
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Autocomplete limit when the request gives none
    #[serde(default = "default_autocomplete_limit")]
    pub autocomplete_default_limit: usize,

    /// Bound of the mutation event channel
    #[serde(default = "default_sync_channel_capacity")]
    pub sync_channel_capacity: usize,

    /// Per-request timeout towards the document store
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Base of the links written into export rows
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

fn default_es_url() -> String { "http://localhost:9200".to_string() }
fn default_index_prefix() -> String { "datahub".to_string() }
fn default_bulk_batch_size() -> usize { 2000 }
fn default_bulk_batch_bytes() -> usize { 8 * 1024 * 1024 } // 8 MB
fn default_export_batch_size() -> usize { 1000 }
fn default_page_size() -> usize { 10 }
fn default_autocomplete_limit() -> usize { 10 }
fn default_sync_channel_capacity() -> usize { 1024 }
fn default_request_timeout_ms() -> u64 { 10_000 }
fn default_frontend_url() -> String { "http://localhost:3000".to_string() }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            es_url: default_es_url(),
            index_prefix: default_index_prefix(),
            bulk_batch_size: default_bulk_batch_size(),
            bulk_batch_bytes: default_bulk_batch_bytes(),
            export_batch_size: default_export_batch_size(),
            default_page_size: default_page_size(),
            autocomplete_default_limit: default_autocomplete_limit(),
            sync_channel_capacity: default_sync_channel_capacity(),
            request_timeout_ms: default_request_timeout_ms(),
            frontend_url: default_frontend_url(),
        }
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Alias searches read from.
    pub fn read_alias(&self, app: &str) -> String {
        format!("{}-{}-read", self.index_prefix, app)
    }

    /// Alias documents are written through.
    pub fn write_alias(&self, app: &str) -> String {
        format!("{}-{}-write", self.index_prefix, app)
    }

    /// Physical index name for one mapping version.
    pub fn index_name(&self, app: &str, mapping_hash: &str) -> String {
        let version = &mapping_hash[..mapping_hash.len().min(10)];
        format!("{}-{}-{}", self.index_prefix, app, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: SearchConfig = serde_json::from_str(r#"{"index_prefix": "test"}"#).unwrap();
        assert_eq!(config.index_prefix, "test");
        assert_eq!(config.bulk_batch_size, 2000);
        assert_eq!(config.bulk_batch_bytes, 8 * 1024 * 1024);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_names() {
        let config = SearchConfig::default();
        assert_eq!(config.read_alias("contact"), "datahub-contact-read");
        assert_eq!(config.write_alias("contact"), "datahub-contact-write");
        assert_eq!(config.index_name("contact", "0123456789abcdef"), "datahub-contact-0123456789");
        assert_eq!(config.index_name("contact", "abc"), "datahub-contact-abc");
    }
}
