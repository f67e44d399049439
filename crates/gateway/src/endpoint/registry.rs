//! In-memory registry of live interview endpoints.
//!
//! Existence of an entry is the single source of truth for "is this
//! session already being served": port allocation scans registry-held
//! ports (never the OS socket table), and teardown removes the entry
//! exactly once. Reservation and port allocation happen under one
//! write lock so concurrent starts can neither double-serve a session
//! nor pick the same port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use iv_domain::config::BasePorts;
use iv_domain::interview::SessionKind;
use iv_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whether an endpoint's listener has come up yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed,
}

/// A live (or still-binding) endpoint.
struct EndpointEntry {
    kind: SessionKind,
    port: u16,
    url: String,
    ready: watch::Receiver<Readiness>,
    cancel: CancellationToken,
    peers: Arc<AtomicUsize>,
    established: Arc<AtomicBool>,
}

/// Shared per-endpoint handles given to the listener task.
#[derive(Clone)]
pub struct EndpointHandles {
    pub session_id: String,
    pub kind: SessionKind,
    pub port: u16,
    pub url: String,
    pub cancel: CancellationToken,
    /// Currently connected peers on this endpoint.
    pub peers: Arc<AtomicUsize>,
    /// Set once a peer has passed the connection gate; a never-established
    /// endpoint is torn down on the first invalid attempt.
    pub established: Arc<AtomicBool>,
}

/// What `reserve` decided.
pub enum Reservation {
    /// The session already has an endpoint; await readiness, reuse it.
    Existing {
        url: String,
        ready: watch::Receiver<Readiness>,
    },
    /// Slot reserved. The caller must now bind the listener and report
    /// success or failure through `ready_tx` / `fail`.
    Reserved {
        handles: EndpointHandles,
        ready_tx: watch::Sender<Readiness>,
    },
}

/// The pieces teardown needs after an entry has been removed.
pub struct RemovedEntry {
    pub kind: SessionKind,
    pub port: u16,
    pub cancel: CancellationToken,
    pub peers: Arc<AtomicUsize>,
}

/// Summary info returned by list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    pub session_id: String,
    pub kind: SessionKind,
    pub port: u16,
    pub url: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EndpointRegistry {
    advertised_host: String,
    base_ports: BasePorts,
    entries: RwLock<HashMap<String, EndpointEntry>>,
}

impl EndpointRegistry {
    pub fn new(advertised_host: String, base_ports: BasePorts) -> Self {
        Self {
            advertised_host,
            base_ports,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Smallest port at or above the kind's base port not held by any
    /// registry entry of that kind. Pure read over registry state; a
    /// port released by a just-closed session is immediately reusable.
    pub fn next_available_port(&self, kind: SessionKind) -> u16 {
        let entries = self.entries.read();
        Self::scan_port(kind, self.base_ports.for_kind(kind), &entries)
    }

    fn scan_port(
        kind: SessionKind,
        base: u16,
        entries: &HashMap<String, EndpointEntry>,
    ) -> u16 {
        let mut port = base;
        let used: std::collections::HashSet<u16> = entries
            .values()
            .filter(|e| e.kind == kind)
            .map(|e| e.port)
            .collect();
        while used.contains(&port) {
            port += 1;
        }
        port
    }

    /// Reserve an endpoint slot for a session, allocating its port in
    /// the same atomic step.
    ///
    /// Idempotent: a second reservation for an id that already has an
    /// entry returns the existing URL and its readiness watch instead
    /// of a new slot.
    pub fn reserve(&self, session_id: &str, kind: SessionKind) -> Reservation {
        let mut entries = self.entries.write();

        if let Some(entry) = entries.get(session_id) {
            return Reservation::Existing {
                url: entry.url.clone(),
                ready: entry.ready.clone(),
            };
        }

        let port = Self::scan_port(kind, self.base_ports.for_kind(kind), &entries);
        let url = format!(
            "ws://{}:{}/?sessionId={}",
            self.advertised_host, port, session_id
        );
        let (ready_tx, ready_rx) = watch::channel(Readiness::Pending);
        let cancel = CancellationToken::new();
        let peers = Arc::new(AtomicUsize::new(0));
        let established = Arc::new(AtomicBool::new(false));

        entries.insert(
            session_id.to_owned(),
            EndpointEntry {
                kind,
                port,
                url: url.clone(),
                ready: ready_rx,
                cancel: cancel.clone(),
                peers: peers.clone(),
                established: established.clone(),
            },
        );
        tracing::info!(session_id, %kind, port, "endpoint slot reserved");

        Reservation::Reserved {
            handles: EndpointHandles {
                session_id: session_id.to_owned(),
                kind,
                port,
                url,
                cancel,
                peers,
                established,
            },
            ready_tx,
        }
    }

    /// Drop a reservation whose listener failed to bind. The readiness
    /// watch is flipped to `Failed` so concurrent waiters error out too.
    pub fn fail(&self, session_id: &str, ready_tx: &watch::Sender<Readiness>) {
        self.entries.write().remove(session_id);
        let _ = ready_tx.send(Readiness::Failed);
        tracing::warn!(session_id, "endpoint reservation dropped after bind failure");
    }

    /// Remove an entry, releasing its port. Returns `None` when the
    /// entry was already gone, which is the basis of exactly-once
    /// teardown.
    pub fn remove(&self, session_id: &str) -> Option<RemovedEntry> {
        let removed = self.entries.write().remove(session_id);
        removed.map(|e| {
            tracing::info!(session_id, %e.kind, port = e.port, "endpoint removed");
            RemovedEntry {
                kind: e.kind,
                port: e.port,
                cancel: e.cancel,
                peers: e.peers,
            }
        })
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.read().contains_key(session_id)
    }

    pub fn list(&self) -> Vec<EndpointInfo> {
        self.entries
            .read()
            .iter()
            .map(|(id, e)| EndpointInfo {
                session_id: id.clone(),
                kind: e.kind,
                port: e.port,
                url: e.url.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Await an existing endpoint's readiness and return its URL.
pub async fn await_ready(
    url: String,
    mut ready: watch::Receiver<Readiness>,
) -> Result<String> {
    let state = ready
        .wait_for(|r| *r != Readiness::Pending)
        .await
        .map(|r| *r)
        .unwrap_or(Readiness::Failed);
    match state {
        Readiness::Ready => Ok(url),
        _ => Err(Error::EndpointClosed),
    }
}
