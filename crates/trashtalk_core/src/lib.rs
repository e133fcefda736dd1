pub mod analytics;
pub mod counter;
pub mod domain;
pub mod gateway;
pub mod ports;
pub mod rate_limit;

pub use domain::{CounterObservation, GeneratedPost, Tone, VisitorVisit};
pub use gateway::ContentGateway;
pub use counter::GlobalCounterService;
pub use ports::{ContentGenerationService, CounterApi, CounterFeed, CounterStore, PortError,
    PortResult, RequestLog, VisitorStore};
pub use rate_limit::{RateLimitError, RateLimiter};
