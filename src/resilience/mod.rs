//! Resilience for document store calls.

pub mod retry;

pub use retry::{retry, retry_if, RetryConfig};
