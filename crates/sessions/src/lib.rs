//! Session persistence for intervue.
//!
//! The context store holds pending interview records between creation by
//! the HTTP layer and consumption by the first valid WebSocket peer; the
//! archive keeps finished transcripts as append-only JSONL.

pub mod archive;
pub mod store;

pub use archive::TranscriptArchive;
pub use store::{ContextStore, MemoryContextStore};
