//! crates/trashtalk_core/src/counter.rs
//!
//! The Global Counter Service: read, increment and reset one shared,
//! store-owned integer row.
//!
//! Increments run a two-step state machine: try the store's atomic
//! server-side increment first; if that path is unavailable, fall back to a
//! manual read-modify-write. The fallback is inherently racy (two concurrent
//! fallback calls can both read the same pre-increment value and each write
//! `value + 1`, losing one increment). That drift is an accepted, documented
//! weakness of the degraded mode, not something this service masks.

use std::sync::Arc;
use tracing::warn;

use crate::domain::CounterObservation;
use crate::ports::{CounterApi, CounterStore, PortResult};

/// The stat row this service owns.
pub const COUNTER_NAME: &str = "total_generations";

/// Seed value used when the row does not exist yet. Carried over from the
/// launch deployment so a fresh store does not reset the public display.
pub const COUNTER_SEED: i64 = 42_847;

pub struct GlobalCounterService {
    store: Arc<dyn CounterStore>,
}

impl GlobalCounterService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Reads the current counter, creating the row with the seed value if it
    /// is absent. Creation treats "already exists" as success, so concurrent
    /// first readers converge on one row.
    pub async fn read(&self) -> PortResult<CounterObservation> {
        if let Some(observation) = self.store.fetch(COUNTER_NAME).await? {
            return Ok(observation);
        }

        self.store.create_if_absent(COUNTER_NAME, COUNTER_SEED).await?;
        match self.store.fetch(COUNTER_NAME).await? {
            Some(observation) => Ok(observation),
            None => Err(crate::ports::PortError::NotFound(format!(
                "Counter row '{}' missing after creation",
                COUNTER_NAME
            ))),
        }
    }

    /// Increments the counter: atomic store increment first, manual
    /// read-modify-write if the primary path fails. A fallback failure
    /// surfaces to the caller with the counter unchanged.
    pub async fn increment(&self) -> PortResult<CounterObservation> {
        match self.store.increment(COUNTER_NAME).await {
            Ok(observation) => Ok(observation),
            Err(primary_err) => {
                warn!(
                    "Atomic counter increment failed, falling back to read-modify-write: {}",
                    primary_err
                );
                let current = self.read().await?;
                self.store.put(COUNTER_NAME, current.value + 1).await
            }
        }
    }

    /// Administrative reset to zero. Unconditional overwrite.
    pub async fn reset(&self) -> PortResult<CounterObservation> {
        self.store.put(COUNTER_NAME, 0).await
    }
}

// The server-side service is itself a valid `CounterApi`, so in-process
// consumers (and the sync client's tests) can talk to it without a
// transport.
#[async_trait::async_trait]
impl CounterApi for GlobalCounterService {
    async fn read(&self) -> PortResult<CounterObservation> {
        GlobalCounterService::read(self).await
    }

    async fn increment(&self) -> PortResult<CounterObservation> {
        GlobalCounterService::increment(self).await
    }

    async fn reset(&self) -> PortResult<CounterObservation> {
        GlobalCounterService::reset(self).await
    }
}
