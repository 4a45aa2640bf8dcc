//! Shared TTL-capable key-value store used for rate-limit, lockout,
//! session, and one-time exchange-code state.
//!
//! All login-path state lives behind this trait so that the brute-force
//! counters stay correct across multiple service instances. The Postgres
//! backend synchronizes state across nodes; the in-memory backend covers
//! tests and single-node deployments.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;
pub mod postgres;

pub use memory::MemoryCounterStore;
pub use postgres::PgCounterStore;

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter at `key`, creating it at 1 when absent.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Set a TTL on an existing key. Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining TTL, `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Set `key` only when absent. Returns true when the value was written.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// Atomic read-and-remove. At most one caller observes the value.
    async fn get_and_delete(&self, key: &str) -> Result<Option<String>>;
}
