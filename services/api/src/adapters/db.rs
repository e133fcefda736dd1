//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the store-facing ports from the `core` crate (`CounterStore`,
//! `VisitorStore`, `RequestLog`). It handles all interactions with the
//! PostgreSQL database using `sqlx`.
//!
//! Every write the core treats as atomic is a single SQL statement here; the
//! store's row-level atomicity is the only concurrency control in play.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use trashtalk_core::domain::{CounterObservation, VisitorVisit};
use trashtalk_core::ports::{CounterStore, PortError, PortResult, RequestLog, VisitorStore};

/// The stat row the visitor tracker maintains alongside per-user rows.
const VISITORS_STAT: &str = "total_visitors";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter implementing the relational-store ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct StatRecord {
    stat_value: i64,
    updated_at: DateTime<Utc>,
}

impl StatRecord {
    fn to_domain(self) -> CounterObservation {
        CounterObservation {
            value: self.stat_value,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct VisitRecord {
    visit_count: i64,
    is_new: bool,
    total_unique: i64,
}

impl VisitRecord {
    fn to_domain(self) -> VisitorVisit {
        VisitorVisit {
            is_new_visitor: self.is_new,
            user_visit_count: self.visit_count,
            total_unique_visitors: self.total_unique,
        }
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `CounterStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CounterStore for PgStore {
    async fn fetch(&self, name: &str) -> PortResult<Option<CounterObservation>> {
        let record = sqlx::query_as::<_, StatRecord>(
            "SELECT stat_value, updated_at FROM global_stats WHERE stat_name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(StatRecord::to_domain))
    }

    async fn create_if_absent(&self, name: &str, seed: i64) -> PortResult<()> {
        // "Already exists" is success: a concurrent reader won the race.
        sqlx::query(
            "INSERT INTO global_stats (stat_name, stat_value) VALUES ($1, $2) \
             ON CONFLICT (stat_name) DO NOTHING",
        )
        .bind(name)
        .bind(seed)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn increment(&self, name: &str) -> PortResult<CounterObservation> {
        let record = sqlx::query_as::<_, StatRecord>(
            "UPDATE global_stats \
             SET stat_value = stat_value + 1, updated_at = now() \
             WHERE stat_name = $1 \
             RETURNING stat_value, updated_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Stat row '{}' not found", name))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn put(&self, name: &str, value: i64) -> PortResult<CounterObservation> {
        let record = sqlx::query_as::<_, StatRecord>(
            "INSERT INTO global_stats (stat_name, stat_value) VALUES ($1, $2) \
             ON CONFLICT (stat_name) DO UPDATE \
                 SET stat_value = EXCLUDED.stat_value, updated_at = now() \
             RETURNING stat_value, updated_at",
        )
        .bind(name)
        .bind(value)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }
}

//=========================================================================================
// `VisitorStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl VisitorStore for PgStore {
    /// One statement covers the whole visit: upsert the visitor row, detect
    /// whether this insert was the first sighting (`xmax = 0` on a freshly
    /// inserted row), and bump the unique-visitor stat only in that case.
    /// Two tabs racing on the same fresh user id resolve inside the store;
    /// exactly one sees `is_new = true`.
    async fn track(
        &self,
        user_id: &str,
        user_agent: Option<&str>,
        timezone: Option<&str>,
        language: Option<&str>,
    ) -> PortResult<VisitorVisit> {
        let record = sqlx::query_as::<_, VisitRecord>(
            "WITH upsert AS ( \
                 INSERT INTO visitors (user_id, user_agent, timezone, language) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (user_id) DO UPDATE \
                     SET visit_count = visitors.visit_count + 1, \
                         last_seen_at = now(), \
                         user_agent = COALESCE($2, visitors.user_agent) \
                 RETURNING visit_count, (xmax = 0) AS is_new \
             ), bump AS ( \
                 UPDATE global_stats \
                 SET stat_value = stat_value + 1, updated_at = now() \
                 WHERE stat_name = $5 AND (SELECT is_new FROM upsert) \
                 RETURNING stat_value \
             ) \
             SELECT u.visit_count, u.is_new, \
                    COALESCE( \
                        (SELECT stat_value FROM bump), \
                        (SELECT stat_value FROM global_stats WHERE stat_name = $5), \
                        0 \
                    ) AS total_unique \
             FROM upsert u",
        )
        .bind(user_id)
        .bind(user_agent)
        .bind(timezone)
        .bind(language)
        .bind(VISITORS_STAT)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn total_unique_visitors(&self) -> PortResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT stat_value FROM global_stats WHERE stat_name = $1",
        )
        .bind(VISITORS_STAT)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(total.unwrap_or(0))
    }
}

//=========================================================================================
// `RequestLog` Trait Implementation
//=========================================================================================

#[async_trait]
impl RequestLog for PgStore {
    async fn record(&self, identity: &str, at: DateTime<Utc>) -> PortResult<()> {
        sqlx::query("INSERT INTO requests_log (identity, created_at) VALUES ($1, $2)")
            .bind(identity)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn count_since(&self, identity: &str, since: DateTime<Utc>) -> PortResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM requests_log WHERE identity = $1 AND created_at >= $2",
        )
        .bind(identity)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(count)
    }
}
