//! intervue gateway: session-scoped WebSocket interview endpoints.
//!
//! The control-plane HTTP API creates context records and starts one
//! listening endpoint per session; each endpoint gates connections on
//! the declared session id, loads the context exactly once, and drives
//! the timed conversation state machine until a terminal event.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod endpoint;
pub mod state;
