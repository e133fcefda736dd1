//! services/api/src/adapters/feed.rs
//!
//! The Postgres-backed change feed over the global counter row. A trigger on
//! `global_stats` (see the migrations) emits a `pg_notify` on every insert
//! or update; this adapter turns those notifications into the `CounterFeed`
//! stream the synchronization side consumes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::pin::Pin;
use tracing::warn;

use trashtalk_core::counter::COUNTER_NAME;
use trashtalk_core::domain::CounterObservation;
use trashtalk_core::ports::{CounterFeed, PortError, PortResult};

/// Channel name the migration's trigger notifies on.
pub const CHANNEL: &str = "global_stats_changes";

/// Payload shape produced by the `notify_global_stats_change` trigger.
#[derive(Deserialize)]
struct StatChangePayload {
    stat_name: String,
    stat_value: i64,
    updated_at: DateTime<Utc>,
}

/// A `CounterFeed` implementation over Postgres LISTEN/NOTIFY.
#[derive(Clone)]
pub struct PgCounterFeed {
    pool: PgPool,
}

impl PgCounterFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterFeed for PgCounterFeed {
    async fn subscribe(
        &self,
    ) -> PortResult<Pin<Box<dyn Stream<Item = CounterObservation> + Send>>> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| PortError::Upstream(e.to_string()))?;
        listener
            .listen(CHANNEL)
            .await
            .map_err(|e| PortError::Upstream(e.to_string()))?;

        // `PgListener::recv` re-establishes the connection after a drop;
        // notifications raised while disconnected are lost, which is exactly
        // the gap the consumers' poll backstop exists for.
        let stream = async_stream::stream! {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<StatChangePayload>(notification.payload()) {
                            Ok(payload) if payload.stat_name == COUNTER_NAME => {
                                yield CounterObservation {
                                    value: payload.stat_value,
                                    updated_at: payload.updated_at,
                                };
                            }
                            // Other stat rows share the trigger; skip them.
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Ignoring malformed change-feed payload: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Change-feed listener error, retrying: {}", e);
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
