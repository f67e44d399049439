//! Shared types for the intervue workspace: errors, configuration, and the
//! core interview vocabulary (session kinds, phases, turns, contexts).

pub mod config;
pub mod error;
pub mod interview;

pub use error::{Error, Result};
