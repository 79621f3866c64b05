//! Document store backends.

mod analysis;
mod matcher;
pub mod elasticsearch;
pub mod memory;
pub mod traits;

pub use elasticsearch::ElasticsearchStore;
pub use memory::InMemoryStore;
pub use traits::{AliasAction, BulkResult, DocumentStore, SearchHit, SearchHits, StorageError};
