//! crates/trashtalk_client/src/identity.rs
//!
//! Anonymous pseudo-identity for one client install, with no server-side
//! account. The user id is derived once from semi-stable environment signals
//! plus a random component and persisted; the session id is regenerated per
//! process lifetime.
//!
//! This is explicitly NOT a security identity: the fingerprint is
//! low-entropy and collisions across installs are tolerated. Its only job is
//! to return the same value on the next call in the same storage state.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::storage::{KeyValueStore, MemoryStore};

const USER_ID_KEY: &str = "trashtalk_user_id";
const SESSION_ID_KEY: &str = "trashtalk_session_id";

/// Semi-stable signals the fingerprint is derived from. Captured once and
/// hashed; the raw values never leave the process.
#[derive(Debug, Clone)]
pub struct EnvironmentSignals {
    pub engine_signature: String,
    pub language: String,
    pub display: String,
    pub timezone_offset_minutes: i32,
    pub concurrency: usize,
}

impl EnvironmentSignals {
    /// Captures best-effort signals from the local environment. Every field
    /// has a fixed default so capture itself can never fail.
    pub fn capture() -> Self {
        let language = std::env::var("LANG")
            .or_else(|_| std::env::var("LC_ALL"))
            .unwrap_or_else(|_| "en_US".to_string());
        let display = std::env::var("DISPLAY").unwrap_or_else(|_| "headless".to_string());
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let timezone_offset_minutes = chrono::Local::now().offset().local_minus_utc() / 60;

        Self {
            engine_signature: format!("trashtalk/{} {}", env!("CARGO_PKG_VERSION"), std::env::consts::OS),
            language,
            display,
            timezone_offset_minutes,
            concurrency,
        }
    }

    /// Hashes the joined signals with a 32-bit rolling hash and encodes the
    /// result in base 36. Low entropy by design.
    fn fingerprint(&self) -> String {
        let characteristics = format!(
            "{}|{}|{}|{}|{}",
            self.engine_signature,
            self.language,
            self.display,
            self.timezone_offset_minutes,
            self.concurrency
        );

        let mut hash: i32 = 0;
        for c in characteristics.chars() {
            hash = (hash << 5).wrapping_sub(hash).wrapping_add(c as i32);
        }

        to_base36(hash.unsigned_abs() as u64)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Random component: random base-36 digits plus the current millisecond
/// timestamp in base 36.
fn random_component() -> String {
    use rand::Rng;
    let random: u64 = rand::thread_rng().gen();
    let now_ms = Utc::now().timestamp_millis().max(0) as u64;
    format!("{}{}", to_base36(random), to_base36(now_ms))
}

/// Read-only identity snapshot suitable for transmission to the server.
/// Carries only the final opaque ids, never the fingerprint's raw inputs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityAnalytics {
    pub user_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub user_agent: String,
    pub language: String,
    pub timezone: String,
}

/// Derives and persists the anonymous user id and the per-process session
/// id. All accessors degrade silently to temporary ids if storage fails;
/// they never return an error.
pub struct IdentityProvider {
    durable: Arc<dyn KeyValueStore>,
    session: MemoryStore,
    signals: EnvironmentSignals,
}

impl IdentityProvider {
    pub fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self {
            durable,
            session: MemoryStore::new(),
            signals: EnvironmentSignals::capture(),
        }
    }

    /// Like `new`, but with injected signals for deterministic tests.
    pub fn with_signals(durable: Arc<dyn KeyValueStore>, signals: EnvironmentSignals) -> Self {
        Self {
            durable,
            session: MemoryStore::new(),
            signals,
        }
    }

    /// Returns the persisted user id, deriving and storing a fresh one on
    /// first access. Storage failure degrades to a non-persisted `temp_` id.
    pub fn user_id(&self) -> String {
        match self.durable.load(USER_ID_KEY) {
            Ok(Some(existing)) => return existing,
            Ok(None) => {}
            Err(e) => {
                warn!("Durable storage unavailable for user id, using temporary id: {}", e);
                return format!("temp_{}", random_component());
            }
        }

        let user_id = format!("user_{}_{}", self.signals.fingerprint(), random_component());
        if let Err(e) = self.durable.store(USER_ID_KEY, &user_id) {
            warn!("Failed to persist user id, using temporary id: {}", e);
            return format!("temp_{}", random_component());
        }
        user_id
    }

    /// Returns the session id, generating one on first access. The backing
    /// store lives only as long as this provider, so restarts get fresh ids.
    pub fn session_id(&self) -> String {
        match self.session.load(SESSION_ID_KEY) {
            Ok(Some(existing)) => return existing,
            Ok(None) => {}
            Err(e) => {
                warn!("Session storage unavailable, using temporary session id: {}", e);
                return format!("temp_session_{}", random_component());
            }
        }

        let session_id = format!("session_{}", random_component());
        if let Err(e) = self.session.store(SESSION_ID_KEY, &session_id) {
            warn!("Failed to persist session id, using temporary session id: {}", e);
            return format!("temp_session_{}", random_component());
        }
        session_id
    }

    /// Clears the persisted user id and the session id, then re-derives and
    /// returns a fresh user id.
    pub fn reset_user_id(&self) -> String {
        if let Err(e) = self.durable.remove(USER_ID_KEY) {
            warn!("Failed to clear persisted user id: {}", e);
        }
        if let Err(e) = self.session.remove(SESSION_ID_KEY) {
            warn!("Failed to clear session id: {}", e);
        }
        self.user_id()
    }

    /// Snapshot of the identity plus coarse environment metadata for the
    /// visitor tracker.
    pub fn analytics(&self) -> IdentityAnalytics {
        IdentityAnalytics {
            user_id: self.user_id(),
            session_id: self.session_id(),
            timestamp: Utc::now().to_rfc3339(),
            user_agent: self.signals.engine_signature.clone(),
            language: self.signals.language.clone(),
            timezone: format!("UTC{:+}", self.signals.timezone_offset_minutes / 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    fn signals() -> EnvironmentSignals {
        EnvironmentSignals {
            engine_signature: "trashtalk/0.1.0 linux".to_string(),
            language: "en_US".to_string(),
            display: ":0".to_string(),
            timezone_offset_minutes: -300,
            concurrency: 8,
        }
    }

    /// A store whose every operation fails, standing in for denied storage.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
        fn store(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".into()))
        }
    }

    #[test]
    fn user_id_is_stable_across_calls() {
        let provider = IdentityProvider::with_signals(Arc::new(MemoryStore::new()), signals());
        let first = provider.user_id();
        for _ in 0..10 {
            assert_eq!(provider.user_id(), first);
        }
        assert!(first.starts_with("user_"));
    }

    #[test]
    fn user_id_survives_a_new_provider_over_the_same_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = IdentityProvider::with_signals(store.clone(), signals()).user_id();
        let second = IdentityProvider::with_signals(store, signals()).user_id();
        assert_eq!(first, second);
    }

    #[test]
    fn session_id_is_stable_within_one_provider_only() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let provider = IdentityProvider::with_signals(store.clone(), signals());
        let session = provider.session_id();
        assert_eq!(provider.session_id(), session);
        assert!(session.starts_with("session_"));

        // A new provider models a new process: fresh session, same user.
        let next = IdentityProvider::with_signals(store, signals());
        assert_ne!(next.session_id(), session);
    }

    #[test]
    fn reset_clears_and_rederives_the_user_id() {
        let provider = IdentityProvider::with_signals(Arc::new(MemoryStore::new()), signals());
        let original = provider.user_id();
        let fresh = provider.reset_user_id();
        assert_ne!(original, fresh);
        // The fresh id is now the persisted one.
        assert_eq!(provider.user_id(), fresh);
    }

    #[test]
    fn broken_storage_degrades_to_temporary_ids_without_panicking() {
        let provider = IdentityProvider::with_signals(Arc::new(BrokenStore), signals());
        let id = provider.user_id();
        assert!(id.starts_with("temp_"));
        // Temporary ids are not stable, and that is fine.
        assert_ne!(provider.user_id(), id);
    }

    #[test]
    fn analytics_exposes_only_opaque_ids() {
        let provider = IdentityProvider::with_signals(Arc::new(MemoryStore::new()), signals());
        let analytics = provider.analytics();
        assert_eq!(analytics.user_id, provider.user_id());
        assert_eq!(analytics.session_id, provider.session_id());
        // Raw fingerprint inputs must not appear anywhere in the snapshot.
        let json = serde_json::to_string(&analytics).unwrap();
        assert!(!json.contains("display"));
        assert!(!json.contains("concurrency"));
    }

    #[test]
    fn fingerprint_is_deterministic_for_fixed_signals() {
        assert_eq!(signals().fingerprint(), signals().fingerprint());
    }
}
