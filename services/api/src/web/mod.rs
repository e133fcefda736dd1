pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the binary wires into the router.
pub use rest::{
    generate_handler, health_handler, read_counter_handler, track_visitor_handler,
    update_counter_handler, visitor_count_handler,
};
pub use ws_handler::counter_ws_handler;
