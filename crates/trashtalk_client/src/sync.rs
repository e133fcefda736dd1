//! crates/trashtalk_client/src/sync.rs
//!
//! The Counter Synchronization Client: presents a single, eventually
//! consistent global count despite three independent update sources racing
//! against each other.
//!
//!   1. the increment response adopted after each generation,
//!   2. the push-based change feed from the store,
//!   3. a fixed-interval poll as a backstop for a silently dropped feed.
//!
//! No ordering is enforced between the three; the last observation to
//! arrive wins. A slow poll response landing after a fresh push can
//! therefore transiently roll the displayed value backward, which the next
//! push or poll corrects.

use chrono::Utc;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use trashtalk_core::counter::COUNTER_SEED;
use trashtalk_core::domain::CounterObservation;
use trashtalk_core::ports::{CounterApi, CounterFeed};

/// The reducer folding an incoming observation into the current one.
///
/// Deliberately ignores `updated_at`: arrival order is the only ordering the
/// three sources share, so the freshest arrival is adopted unconditionally.
pub fn apply_observation(
    _current: CounterObservation,
    incoming: CounterObservation,
) -> CounterObservation {
    incoming
}

/// Default interval for the poll backstop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// A running synchronization client. Owns one background task that listens
/// to the change feed and runs the poll loop; `shutdown` (or dropping the
/// client) releases both.
pub struct CounterSync {
    api: Arc<dyn CounterApi>,
    latest: watch::Sender<CounterObservation>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CounterSync {
    /// Performs the initial read and spawns the feed/poll task.
    ///
    /// Neither a failed initial read nor a failed feed subscription is
    /// fatal: the value degrades to the documented seed and the poll loop
    /// keeps retrying the store.
    pub async fn start(
        api: Arc<dyn CounterApi>,
        feed: Arc<dyn CounterFeed>,
        poll_interval: Duration,
    ) -> Self {
        let initial = match api.read().await {
            Ok(observation) => observation,
            Err(e) => {
                warn!("Initial counter read failed, starting from seed value: {}", e);
                CounterObservation {
                    value: COUNTER_SEED,
                    updated_at: Utc::now(),
                }
            }
        };

        let (latest, _) = watch::channel(initial);
        let shutdown = CancellationToken::new();

        let feed_stream: Pin<Box<dyn Stream<Item = CounterObservation> + Send>> =
            match feed.subscribe().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Change feed subscription failed, relying on polling: {}", e);
                    Box::pin(futures::stream::pending())
                }
            };

        let task = tokio::spawn(run_sync_loop(
            api.clone(),
            latest.clone(),
            feed_stream,
            poll_interval,
            shutdown.clone(),
        ));

        Self {
            api,
            latest,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// The most recently adopted observation.
    pub fn latest(&self) -> CounterObservation {
        *self.latest.borrow()
    }

    /// A watch receiver over the adopted observations, for UI bindings.
    pub fn observe(&self) -> watch::Receiver<CounterObservation> {
        self.latest.subscribe()
    }

    /// Issues an increment against the counter service. On success the
    /// returned observation is adopted; on failure the client answers with a
    /// local optimistic `current + 1` that is never persisted and may be
    /// overwritten by the next push or poll.
    pub async fn increment(&self) -> CounterObservation {
        match self.api.increment().await {
            Ok(observation) => {
                let current = self.latest();
                self.latest.send_replace(apply_observation(current, observation));
                observation
            }
            Err(e) => {
                warn!("Counter increment failed, applying optimistic local bump: {}", e);
                let optimistic = CounterObservation {
                    value: self.latest.borrow().value + 1,
                    updated_at: Utc::now(),
                };
                self.latest.send_replace(optimistic);
                optimistic
            }
        }
    }

    /// Administrative reset. On failure the current observation is returned
    /// unchanged.
    pub async fn reset(&self) -> CounterObservation {
        match self.api.reset().await {
            Ok(observation) => {
                self.latest.send_replace(observation);
                observation
            }
            Err(e) => {
                warn!("Counter reset failed: {}", e);
                *self.latest.borrow()
            }
        }
    }

    /// Cancels the feed subscription and the poll timer, then waits for the
    /// background task to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!("Counter sync task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for CounterSync {
    fn drop(&mut self) {
        // Unblocks the background task if `shutdown` was never awaited.
        self.shutdown.cancel();
    }
}

async fn run_sync_loop(
    api: Arc<dyn CounterApi>,
    latest: watch::Sender<CounterObservation>,
    mut feed: Pin<Box<dyn Stream<Item = CounterObservation> + Send>>,
    poll_interval: Duration,
    shutdown: CancellationToken,
) {
    // The first poll fires one full interval after startup; the initial
    // read already happened.
    let mut poll = tokio::time::interval_at(
        tokio::time::Instant::now() + poll_interval,
        poll_interval,
    );
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Counter sync shutting down");
                break;
            }
            pushed = feed.next() => {
                match pushed {
                    Some(observation) => {
                        let current = *latest.borrow();
                        latest.send_replace(apply_observation(current, observation));
                    }
                    None => {
                        // A dead feed is not an error state; the poll loop
                        // is the compensating control.
                        warn!("Counter change feed ended, relying on polling");
                        feed = Box::pin(futures::stream::pending());
                    }
                }
            }
            _ = poll.tick() => {
                match api.read().await {
                    Ok(observation) => {
                        let current = *latest.borrow();
                        latest.send_replace(apply_observation(current, observation));
                    }
                    Err(e) => {
                        warn!("Counter poll failed, keeping last known value: {}", e);
                    }
                }
            }
        }
    }
}
