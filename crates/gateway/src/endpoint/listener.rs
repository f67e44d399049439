//! Per-session WebSocket listener.
//!
//! Each session gets its own `TcpListener` on its allocated port. The
//! accept loop runs under the endpoint's cancellation token; every
//! accepted connection passes the gate (declared session id must match
//! the endpoint's owner) before any context is touched, then the
//! socket is bridged over channels to the conversation state machine.

use std::sync::atomic::Ordering;

use futures_util::{SinkExt, StreamExt};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use iv_domain::interview::{CloseReason, SessionKind};
use iv_domain::{Error, Result};
use iv_providers::Generator;
use iv_sessions::archive::ArchivedTurn;
use iv_sessions::{ContextStore, TranscriptArchive};

use super::machine::{OutboundFrame, PeerEvent, SessionMachine, Timing};
use super::registry::{self, EndpointHandles, EndpointRegistry, Readiness, Reservation};
use super::teardown::teardown;

use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared endpoint dependencies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything an endpoint needs besides its own registry handles.
#[derive(Clone)]
pub struct EndpointShared {
    pub registry: Arc<EndpointRegistry>,
    pub store: Arc<dyn ContextStore>,
    pub generator: Arc<dyn Generator>,
    pub archive: Option<Arc<TranscriptArchive>>,
    /// Interface the per-session listeners bind to.
    pub bind_host: String,
    /// Configured default timing; per-record overrides apply inside
    /// the machine after context load.
    pub timing: Timing,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Endpoint startup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Start (or join) the endpoint for a session and return its URL.
///
/// Idempotent: a concurrent or repeated start for the same id resolves
/// to the same URL once the single listener is ready. Bind failure
/// drops the reservation and surfaces the error so the caller may
/// request a fresh port and retry.
pub async fn start_endpoint(
    shared: &EndpointShared,
    session_id: &str,
    kind: SessionKind,
) -> Result<String> {
    match shared.registry.reserve(session_id, kind) {
        Reservation::Existing { url, ready } => registry::await_ready(url, ready).await,
        Reservation::Reserved { handles, ready_tx } => {
            let addr = format!("{}:{}", shared.bind_host, handles.port);
            let listener = match TcpListener::bind(&addr).await {
                Ok(l) => l,
                Err(e) => {
                    shared.registry.fail(session_id, &ready_tx);
                    return Err(Error::PortBind {
                        port: handles.port,
                        message: e.to_string(),
                    });
                }
            };

            tracing::info!(
                session_id,
                %kind,
                port = handles.port,
                "interview endpoint listening"
            );
            let url = handles.url.clone();
            tokio::spawn(accept_loop(listener, shared.clone(), handles));
            let _ = ready_tx.send(Readiness::Ready);
            Ok(url)
        }
    }
}

async fn accept_loop(listener: TcpListener, shared: EndpointShared, handles: EndpointHandles) {
    loop {
        tokio::select! {
            _ = handles.cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(
                        session_id = %handles.session_id,
                        peer = %peer,
                        "inbound connection"
                    );
                    tokio::spawn(handle_connection(stream, shared.clone(), handles.clone()));
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %handles.session_id,
                        error = %e,
                        "accept failed"
                    );
                }
            }
        }
    }
    tracing::info!(session_id = %handles.session_id, "endpoint listener closed");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection gate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Constant-time session-id comparison via SHA-256 digest. Hashing
/// normalizes lengths so `ct_eq` always compares 32 bytes.
fn session_id_eq(a: &str, b: &str) -> bool {
    let ha = Sha256::digest(a.as_bytes());
    let hb = Sha256::digest(b.as_bytes());
    ha.ct_eq(&hb).into()
}

/// Pull a query parameter out of a raw query string. Session ids are
/// opaque tokens without reserved characters, so no percent-decoding.
fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == name).then_some(v)
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn handle_connection(stream: TcpStream, shared: EndpointShared, handles: EndpointHandles) {
    // Capture the declared session id during the handshake.
    let mut declared: Option<String> = None;
    let ws = match tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        declared = req
            .uri()
            .query()
            .and_then(|q| query_param(q, "sessionId"))
            .map(str::to_owned);
        Ok(resp)
    })
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(
                session_id = %handles.session_id,
                error = %e,
                "websocket handshake failed"
            );
            return;
        }
    };

    // Gate: the declared id must match the endpoint's owner before any
    // further work. No context load for unauthenticated peers.
    let valid = declared
        .as_deref()
        .map(|d| session_id_eq(d, &handles.session_id))
        .unwrap_or(false);
    if !valid {
        tracing::warn!(
            session_id = %handles.session_id,
            declared = declared.as_deref().unwrap_or("<none>"),
            "rejecting connection with mismatched session id"
        );
        let mut ws = ws;
        let _ = ws
            .close(Some(CloseFrame {
                code: CloseReason::PolicyViolation.code().into(),
                reason: CloseReason::PolicyViolation.message().into(),
            }))
            .await;

        // A bad first connection on a never-established endpoint means
        // misrouting: take the whole endpoint down.
        if !handles.established.load(Ordering::Acquire) {
            teardown(&shared.registry, shared.store.as_ref(), &handles.session_id).await;
            handles.cancel.cancel();
        }
        return;
    }

    handles.established.store(true, Ordering::Release);
    handles.peers.fetch_add(1, Ordering::AcqRel);

    // Bridge the socket to the machine: a writer task drains the
    // outbound channel, a reader task feeds peer events in.
    let (mut sink, mut ws_stream) = ws.split();
    let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(32);
    let (peer_tx, mut peer_rx) = mpsc::channel::<PeerEvent>(32);

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close(reason) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: reason.code().into(),
                            reason: reason.message().into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if peer_tx.send(PeerEvent::Message(text)).await.is_err() {
                        return;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
        let _ = peer_tx.send(PeerEvent::Disconnected).await;
    });

    let machine = SessionMachine::new(
        handles.session_id.clone(),
        shared.store.clone(),
        shared.generator.clone(),
        shared.timing,
    );
    let outcome = machine.run(&mut peer_rx, &out_tx).await;

    // Let the writer drain any queued frames, then stop both bridges.
    drop(out_tx);
    let _ = writer.await;
    reader.abort();

    if let Some(archive) = &shared.archive {
        let turns: Vec<ArchivedTurn> = outcome
            .transcript
            .turns()
            .iter()
            .map(|t| ArchivedTurn::from_turn(handles.kind, t))
            .collect();
        if let Err(e) = archive.append(&handles.session_id, &turns).await {
            tracing::warn!(
                session_id = %handles.session_id,
                error = %e,
                "failed to archive transcript"
            );
        }
    }

    // Every machine outcome is terminal for the session. The endpoint
    // itself is only closed once the last peer is gone.
    let remaining = handles.peers.fetch_sub(1, Ordering::AcqRel) - 1;
    teardown(&shared.registry, shared.store.as_ref(), &handles.session_id).await;
    if remaining == 0 {
        handles.cancel.cancel();
    }
}
