//! Session-scoped interview endpoints: registry, per-session listener,
//! conversation state machine, and teardown.

pub mod listener;
pub mod machine;
pub mod registry;
pub mod teardown;

pub use listener::{start_endpoint, EndpointShared};
pub use machine::Timing;
pub use registry::{EndpointInfo, EndpointRegistry};
