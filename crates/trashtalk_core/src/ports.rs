//! crates/trashtalk_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! relational store or the upstream generation API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;

use crate::domain::{CounterObservation, VisitorVisit};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services
/// (e.g. database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The raw upstream content generation API. Implementations receive a fully
/// composed prompt and return the model's text verbatim; prompt assembly,
/// timeouts and fallback handling live in the gateway, not here.
#[async_trait]
pub trait ContentGenerationService: Send + Sync {
    async fn complete(&self, prompt: &str) -> PortResult<String>;
}

/// Storage operations for named global stat rows. The store is the sole
/// arbiter of concurrent writes; `increment` must be a single atomic
/// statement, while `fetch`/`put` compose the explicitly racy fallback path.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn fetch(&self, name: &str) -> PortResult<Option<CounterObservation>>;

    /// Creates the named row with a seed value. Must treat "already exists"
    /// as success so concurrent first readers cannot fail each other.
    async fn create_if_absent(&self, name: &str, seed: i64) -> PortResult<()>;

    /// Atomic server-side increment, returning the post-increment row.
    async fn increment(&self, name: &str) -> PortResult<CounterObservation>;

    /// Unconditional overwrite, returning the written row.
    async fn put(&self, name: &str, value: i64) -> PortResult<CounterObservation>;
}

/// The request-facing counter operations as seen by a synchronizing client.
/// The server-side `GlobalCounterService` implements this directly; remote
/// clients implement it over their transport of choice.
#[async_trait]
pub trait CounterApi: Send + Sync {
    async fn read(&self) -> PortResult<CounterObservation>;
    async fn increment(&self) -> PortResult<CounterObservation>;
    async fn reset(&self) -> PortResult<CounterObservation>;
}

/// A push-based change feed over the counter row. Subscribing yields a
/// stream of observations; the stream ending or erroring is not fatal to
/// consumers, whose periodic poll is the designed compensating control.
#[async_trait]
pub trait CounterFeed: Send + Sync {
    async fn subscribe(
        &self,
    ) -> PortResult<Pin<Box<dyn Stream<Item = CounterObservation> + Send>>>;
}

/// Per-identity visit tracking. `track` must be one atomic server-side
/// operation so two tabs opening simultaneously cannot both count as a new
/// visitor.
#[async_trait]
pub trait VisitorStore: Send + Sync {
    async fn track(
        &self,
        user_id: &str,
        user_agent: Option<&str>,
        timezone: Option<&str>,
        language: Option<&str>,
    ) -> PortResult<VisitorVisit>;

    async fn total_unique_visitors(&self) -> PortResult<i64>;
}

/// The append-only log of generation requests the rate limiter counts
/// against.
#[async_trait]
pub trait RequestLog: Send + Sync {
    async fn record(&self, identity: &str, at: DateTime<Utc>) -> PortResult<()>;

    /// Number of requests attributed to `identity` with a timestamp >= `since`.
    async fn count_since(&self, identity: &str, since: DateTime<Utc>) -> PortResult<i64>;
}
