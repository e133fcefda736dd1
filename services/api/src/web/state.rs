//! services/api/src/web/state.rs
//!
//! Defines the application's shared state. Handlers are short-lived and
//! stateless; everything mutable they touch lives in the relational store,
//! reached through the services held here.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;
use trashtalk_core::counter::GlobalCounterService;
use trashtalk_core::domain::CounterObservation;
use trashtalk_core::gateway::ContentGateway;
use trashtalk_core::ports::VisitorStore;
use trashtalk_core::rate_limit::RateLimiter;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub counter: Arc<GlobalCounterService>,
    pub gateway: Arc<ContentGateway>,
    pub visitors: Arc<dyn VisitorStore>,
    pub limiter: Arc<RateLimiter>,
    /// Fan-out of the store's change feed to connected WebSocket clients.
    pub counter_updates: broadcast::Sender<CounterObservation>,
}
