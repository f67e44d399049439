//! Idempotent session teardown.
//!
//! Teardown competes between several triggers: the state machine
//! finishing, a rejected first connection, and an explicit stop from
//! the control plane. The registry's `remove` returns the entry at
//! most once, so exactly one caller performs the cleanup and everyone
//! else observes a no-op.

use std::sync::atomic::Ordering;

use iv_sessions::ContextStore;

use super::registry::EndpointRegistry;

/// Cooperative teardown: remove the registry entry and delete the
/// context record. Cancels the listener only when no peer is still
/// attached; the last departing peer cancels it itself.
///
/// Returns whether this call won the removal.
pub async fn teardown(
    registry: &EndpointRegistry,
    store: &dyn ContextStore,
    session_id: &str,
) -> bool {
    let Some(removed) = registry.remove(session_id) else {
        tracing::debug!(session_id, "teardown: endpoint already removed");
        return false;
    };

    if removed.peers.load(Ordering::Acquire) == 0 {
        removed.cancel.cancel();
    }

    // Best-effort: the record may already be consumed by the machine.
    if let Err(e) = store.delete(session_id).await {
        tracing::warn!(session_id, error = %e, "failed to delete context record");
    }
    true
}

/// Forced stop from the control plane: like `teardown` but always
/// cancels the listener, closing the accept loop immediately even with
/// peers attached. An in-flight conversation runs to its own terminal
/// event.
pub async fn stop(
    registry: &EndpointRegistry,
    store: &dyn ContextStore,
    session_id: &str,
) -> bool {
    let Some(removed) = registry.remove(session_id) else {
        tracing::debug!(session_id, "stop: endpoint already removed");
        return false;
    };

    removed.cancel.cancel();
    if let Err(e) = store.delete(session_id).await {
        tracing::warn!(session_id, error = %e, "failed to delete context record");
    }
    tracing::info!(session_id, port = removed.port, "endpoint stopped");
    true
}
