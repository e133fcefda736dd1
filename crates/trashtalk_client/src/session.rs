//! crates/trashtalk_client/src/session.rs
//!
//! Client-local session analytics: the per-session generation count, the
//! last few generated posts, and the display metrics derived from them.
//! Everything here is ephemeral presentation state; nothing is persisted
//! server-side.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::storage::KeyValueStore;
use trashtalk_core::analytics;

const SESSION_COUNT_KEY: &str = "trashtalk_session_count";
const HISTORY_KEY: &str = "trashtalk_history";

/// How many recent posts the history keeps.
const HISTORY_LIMIT: usize = 5;

/// Derived metrics for the dashboard, recomputed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetrics {
    pub chaos_level: &'static str,
    pub sanity_remaining: u32,
    pub viral_potential: u32,
    pub session_duration: String,
}

/// The client-local analytics snapshot. Initialized from local storage on
/// load, updated after every generation, clearable via explicit reset.
pub struct SessionSnapshot<S: KeyValueStore> {
    store: S,
    generation_count: u32,
    session_start: DateTime<Utc>,
    history: Vec<String>,
}

impl<S: KeyValueStore> SessionSnapshot<S> {
    /// Loads persisted counters from `store`. Corrupt or missing entries
    /// reset to defaults; loading never fails.
    pub fn load(store: S) -> Self {
        let generation_count = match store.load(SESSION_COUNT_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                warn!("Failed to load session count, starting at zero: {}", e);
                0
            }
        };

        let history = match store.load(HISTORY_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to load history, starting empty: {}", e);
                Vec::new()
            }
        };

        Self {
            store,
            generation_count,
            session_start: Utc::now(),
            history,
        }
    }

    pub fn generation_count(&self) -> u32 {
        self.generation_count
    }

    /// Most recent first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Records one generated post: bumps the session count, prepends to the
    /// history (trimmed to the last few entries) and persists both.
    pub fn record_generation(&mut self, text: &str) {
        self.generation_count += 1;
        self.history.insert(0, text.to_string());
        self.history.truncate(HISTORY_LIMIT);
        self.persist();
    }

    /// Clears all session state and restarts the session clock.
    pub fn reset(&mut self) {
        self.generation_count = 0;
        self.history.clear();
        self.session_start = Utc::now();
        if let Err(e) = self.store.remove(SESSION_COUNT_KEY) {
            warn!("Failed to clear session count: {}", e);
        }
        if let Err(e) = self.store.remove(HISTORY_KEY) {
            warn!("Failed to clear history: {}", e);
        }
    }

    /// Recomputes the display metrics from the current counters.
    pub fn metrics(&self, now: DateTime<Utc>, random_factor: impl FnOnce() -> u32) -> SessionMetrics {
        let minutes = (now - self.session_start).num_minutes().max(0) as u64;
        SessionMetrics {
            chaos_level: analytics::chaos_level(self.generation_count),
            sanity_remaining: analytics::sanity_remaining(self.generation_count),
            viral_potential: analytics::viral_potential(self.generation_count, random_factor),
            session_duration: analytics::format_session_duration(minutes),
        }
    }

    fn persist(&self) {
        if let Err(e) = self
            .store
            .store(SESSION_COUNT_KEY, &self.generation_count.to_string())
        {
            warn!("Failed to persist session count: {}", e);
        }
        match serde_json::to_string(&self.history) {
            Ok(json) => {
                if let Err(e) = self.store.store(HISTORY_KEY, &json) {
                    warn!("Failed to persist history: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize history: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::Duration;

    #[test]
    fn starts_empty_and_counts_generations() {
        let mut snapshot = SessionSnapshot::load(MemoryStore::new());
        assert_eq!(snapshot.generation_count(), 0);

        snapshot.record_generation("post one");
        snapshot.record_generation("post two");
        assert_eq!(snapshot.generation_count(), 2);
        assert_eq!(snapshot.history(), &["post two", "post one"]);
    }

    #[test]
    fn history_keeps_only_the_last_five() {
        let mut snapshot = SessionSnapshot::load(MemoryStore::new());
        for i in 0..8 {
            snapshot.record_generation(&format!("post {}", i));
        }
        assert_eq!(snapshot.history().len(), 5);
        assert_eq!(snapshot.history()[0], "post 7");
        assert_eq!(snapshot.history()[4], "post 3");
    }

    #[test]
    fn state_survives_a_reload_from_the_same_store() {
        let store = std::sync::Arc::new(MemoryStore::new());
        {
            let mut snapshot = SessionSnapshot::load(store.clone());
            snapshot.record_generation("persisted post");
        }
        let reloaded = SessionSnapshot::load(store);
        assert_eq!(reloaded.generation_count(), 1);
        assert_eq!(reloaded.history(), &["persisted post"]);
    }

    #[test]
    fn reset_clears_counters_and_storage() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mut snapshot = SessionSnapshot::load(store.clone());
        snapshot.record_generation("doomed post");
        snapshot.reset();

        assert_eq!(snapshot.generation_count(), 0);
        assert!(snapshot.history().is_empty());
        assert_eq!(SessionSnapshot::load(store).generation_count(), 0);
    }

    #[test]
    fn metrics_reflect_the_session_counters() {
        let mut snapshot = SessionSnapshot::load(MemoryStore::new());
        for _ in 0..5 {
            snapshot.record_generation("post");
        }

        let now = snapshot.session_start + Duration::minutes(75);
        let metrics = snapshot.metrics(now, || 3);
        assert_eq!(metrics.chaos_level, "Full Chaos");
        assert_eq!(metrics.sanity_remaining, 50);
        assert_eq!(metrics.viral_potential, 78);
        assert_eq!(metrics.session_duration, "1h 15m");
    }
}
