pub mod identity;
pub mod session;
pub mod storage;
pub mod sync;

// Re-export the pieces a consumer wires together to build a dashboard:
// identity, storage scopes, the synchronization client and the local
// analytics snapshot.
pub use identity::{EnvironmentSignals, IdentityAnalytics, IdentityProvider};
pub use session::{SessionMetrics, SessionSnapshot};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use sync::{apply_observation, CounterSync, DEFAULT_POLL_INTERVAL};
