//! Pending-interview context records.
//!
//! The HTTP layer creates one record per session; the endpoint loads it
//! exactly once when the first valid peer connects and deletes it
//! immediately after, so no second endpoint can consume the same
//! context. Deleting an already-absent record is success, not an error.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use iv_domain::interview::InterviewContext;
use iv_domain::Result;

/// The persistence collaborator consumed by the orchestration layer.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Store a context record for a newly created session.
    async fn put(&self, session_id: &str, context: InterviewContext) -> Result<()>;

    /// Fetch a session's context. `Ok(None)` means no record exists
    /// (never created, already consumed, or expired).
    async fn load(&self, session_id: &str) -> Result<Option<InterviewContext>>;

    /// Delete a session's context record. Must be safe to call when the
    /// record was already removed.
    async fn delete(&self, session_id: &str) -> Result<()>;
}

/// In-memory context store. Records live only as long as the process;
/// a session whose record was lost simply fails context load, which the
/// state machine already treats as fatal for that session.
#[derive(Default)]
pub struct MemoryContextStore {
    records: RwLock<HashMap<String, InterviewContext>>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending records (for monitoring).
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn put(&self, session_id: &str, context: InterviewContext) -> Result<()> {
        let kind = context.kind();
        self.records
            .write()
            .insert(session_id.to_owned(), context);
        tracing::debug!(session_id, %kind, "context record stored");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<InterviewContext>> {
        Ok(self.records.read().get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        if self.records.write().remove(session_id).is_some() {
            tracing::debug!(session_id, "context record deleted");
        } else {
            tracing::debug!(session_id, "context record already absent");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iv_domain::interview::{ProjectContext, SessionKind};

    fn project_ctx() -> InterviewContext {
        InterviewContext::Project(ProjectContext {
            description: "recommendation engine".into(),
            interview_duration_minutes: None,
        })
    }

    #[tokio::test]
    async fn put_load_delete_cycle() {
        let store = MemoryContextStore::new();
        store.put("s1", project_ctx()).await.unwrap();

        let loaded = store.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.kind(), SessionKind::Project);

        store.delete("s1").await.unwrap();
        assert!(store.load("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_absent_record_is_ok() {
        let store = MemoryContextStore::new();
        store.delete("never-existed").await.unwrap();
        // Twice in a row, too.
        store.put("s1", project_ctx()).await.unwrap();
        store.delete("s1").await.unwrap();
        store.delete("s1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn load_missing_is_none_not_error() {
        let store = MemoryContextStore::new();
        assert!(store.load("ghost").await.unwrap().is_none());
    }
}
