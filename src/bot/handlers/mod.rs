//! Discord gateway handlers
//!
//! Reaction and deletion events are routed into the suggestion service; the
//! scheduler drives the periodic sweep.

/// Gateway event routing
pub mod events;
/// Background sweep loop
pub mod scheduler;

pub use events::event_handler;
pub use scheduler::spawn_scheduler;
