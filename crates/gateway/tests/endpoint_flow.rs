//! End-to-end endpoint tests over real sockets: a per-session listener,
//! a real WebSocket client, and a scripted generator.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use iv_domain::config::BasePorts;
use iv_domain::interview::{InterviewContext, ProjectContext, RoleContext, SessionKind};
use iv_gateway::endpoint::{self, teardown, EndpointRegistry, EndpointShared, Timing};
use iv_providers::ScriptedGenerator;
use iv_sessions::{ContextStore, MemoryContextStore};

const SUMMARY_JSON: &str = r#"{"Communication_skills":"75%","strengths":["clarity"]}"#;

fn harness(base: u16) -> (EndpointShared, Arc<MemoryContextStore>) {
    let registry = Arc::new(EndpointRegistry::new(
        "127.0.0.1".into(),
        BasePorts {
            role: base,
            project: base + 100,
            repository: base + 200,
        },
    ));
    let store = Arc::new(MemoryContextStore::new());
    let generator = Arc::new(ScriptedGenerator::new(["Q1", "Q2", "Q3"], SUMMARY_JSON));
    let shared = EndpointShared {
        registry,
        store: store.clone(),
        generator,
        archive: None,
        bind_host: "127.0.0.1".into(),
        timing: Timing::from_minutes(15, 5),
    };
    (shared, store)
}

fn project_ctx() -> InterviewContext {
    InterviewContext::Project(ProjectContext {
        description: "churn prediction model".into(),
        interview_duration_minutes: None,
    })
}

fn role_ctx() -> InterviewContext {
    InterviewContext::Role(RoleContext {
        name: "Dana".into(),
        role: "Backend Engineer".into(),
        experience: "4 years".into(),
        company_applying: "Acme".into(),
        job_description: "Own the billing services".into(),
    })
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition never became true");
}

#[tokio::test]
async fn full_session_over_real_socket() {
    let (shared, store) = harness(46000);
    store.put("s-full", project_ctx()).await.unwrap();

    let url = endpoint::start_endpoint(&shared, "s-full", SessionKind::Project)
        .await
        .unwrap();
    assert!(url.starts_with("ws://127.0.0.1:46100/?sessionId=s-full"));

    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    // First interviewer question arrives unprompted.
    let first = ws.next().await.unwrap().unwrap();
    assert_eq!(
        first,
        Message::Text("\nInterviewer: Q1\n".to_string())
    );

    ws.send(Message::Text("I led the data pipeline work.".into()))
        .await
        .unwrap();
    let second = ws.next().await.unwrap().unwrap();
    assert_eq!(
        second,
        Message::Text("\nInterviewer: Q2\n".to_string())
    );

    // Exit keyword: END marker, summary, then a normal close.
    ws.send(Message::Text("exit".into())).await.unwrap();
    assert_eq!(
        ws.next().await.unwrap().unwrap(),
        Message::Text("END".to_string())
    );
    let summary = ws.next().await.unwrap().unwrap();
    match summary {
        Message::Text(t) => {
            assert!(t.starts_with("\nInterview Summary:"));
            assert!(t.contains("Communication_skills"));
        }
        other => panic!("expected summary text, got {other:?}"),
    }
    match ws.next().await.unwrap().unwrap() {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
        other => panic!("expected close frame, got {other:?}"),
    }

    // The session tears itself down: registry entry and record gone.
    let registry = shared.registry.clone();
    wait_until(move || registry.is_empty()).await;
    assert!(store.load("s-full").await.unwrap().is_none());
}

#[tokio::test]
async fn mismatched_session_id_is_rejected_with_policy_close() {
    let (shared, store) = harness(46500);
    store.put("s-real", role_ctx()).await.unwrap();

    endpoint::start_endpoint(&shared, "s-real", SessionKind::Role)
        .await
        .unwrap();

    let bad_url = "ws://127.0.0.1:46500/?sessionId=s-guessed";
    let (mut ws, _) = tokio_tungstenite::connect_async(bad_url).await.unwrap();

    match ws.next().await.unwrap().unwrap() {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Policy);
            assert_eq!(frame.reason, "invalid session ID");
        }
        other => panic!("expected policy close, got {other:?}"),
    }

    // A bad first connection takes the never-established endpoint down
    // and purges the pending record.
    let registry = shared.registry.clone();
    wait_until(move || registry.is_empty()).await;
    assert!(store.load("s-real").await.unwrap().is_none());
}

#[tokio::test]
async fn established_session_survives_later_invalid_connection() {
    let (shared, store) = harness(46800);
    store.put("s-live", project_ctx()).await.unwrap();

    let url = endpoint::start_endpoint(&shared, "s-live", SessionKind::Project)
        .await
        .unwrap();

    // Establish the real session first.
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let first = ws.next().await.unwrap().unwrap();
    assert!(matches!(first, Message::Text(t) if t.contains("Q1")));

    // A later invalid attempt is rejected without killing the endpoint.
    let bad_url = "ws://127.0.0.1:46900/?sessionId=s-guessed";
    let (mut bad_ws, _) = tokio_tungstenite::connect_async(bad_url).await.unwrap();
    match bad_ws.next().await.unwrap().unwrap() {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Policy),
        other => panic!("expected policy close, got {other:?}"),
    }
    assert!(shared.registry.contains("s-live"));

    // The established session still works end to end.
    ws.send(Message::Text("exit".into())).await.unwrap();
    assert_eq!(
        ws.next().await.unwrap().unwrap(),
        Message::Text("END".to_string())
    );
    let _summary = ws.next().await.unwrap().unwrap();
    match ws.next().await.unwrap().unwrap() {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
        other => panic!("expected close frame, got {other:?}"),
    }
    let registry = shared.registry.clone();
    wait_until(move || registry.is_empty()).await;
}

#[tokio::test]
async fn repeated_start_returns_same_url() {
    let (shared, store) = harness(47000);
    store.put("s-dup", project_ctx()).await.unwrap();

    let (a, b) = tokio::join!(
        endpoint::start_endpoint(&shared, "s-dup", SessionKind::Project),
        endpoint::start_endpoint(&shared, "s-dup", SessionKind::Project),
    );
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(shared.registry.len(), 1);

    // A later repeat also joins the live endpoint.
    let c = endpoint::start_endpoint(&shared, "s-dup", SessionKind::Project)
        .await
        .unwrap();
    assert_eq!(a, c);
}

#[tokio::test]
async fn categories_allocate_from_disjoint_port_ranges() {
    let (shared, store) = harness(47500);
    store.put("s-role", role_ctx()).await.unwrap();
    store.put("s-proj", project_ctx()).await.unwrap();

    let role_url = endpoint::start_endpoint(&shared, "s-role", SessionKind::Role)
        .await
        .unwrap();
    let proj_url = endpoint::start_endpoint(&shared, "s-proj", SessionKind::Project)
        .await
        .unwrap();

    assert!(role_url.contains(":47500/"));
    assert!(proj_url.contains(":47600/"));
}

#[tokio::test]
async fn stop_is_idempotent_and_closes_the_listener() {
    let (shared, store) = harness(48000);
    store.put("s-stop", project_ctx()).await.unwrap();

    endpoint::start_endpoint(&shared, "s-stop", SessionKind::Project)
        .await
        .unwrap();
    assert!(shared.registry.contains("s-stop"));

    assert!(teardown::stop(&shared.registry, store.as_ref(), "s-stop").await);
    assert!(!teardown::stop(&shared.registry, store.as_ref(), "s-stop").await);
    assert!(shared.registry.is_empty());
    assert!(store.load("s-stop").await.unwrap().is_none());

    // The accept loop shuts down: new connections stop being served.
    wait_until(|| {
        std::net::TcpStream::connect_timeout(
            &"127.0.0.1:48100".parse().unwrap(),
            Duration::from_millis(50),
        )
        .is_err()
    })
    .await;
}
