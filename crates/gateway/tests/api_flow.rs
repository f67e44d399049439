//! Control-plane HTTP API tests against a real bound server.

use serde_json::{json, Value};

use iv_domain::config::{BasePorts, Config};
use iv_gateway::{api, bootstrap};

async fn spawn_api(base: u16) -> String {
    let mut config = Config::default();
    config.gateway.base_ports = BasePorts {
        role: base,
        project: base + 100,
        repository: base + 200,
    };
    let state = bootstrap::build(config).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_reports_ok() {
    let base = spawn_api(45000).await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_list_and_stop_a_session() {
    let base = spawn_api(45300).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/interviews/project"))
        .json(&json!({ "description": "recommendation engine" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    let session_id = created["session_id"].as_str().unwrap().to_owned();
    let url = created["websocket_url"].as_str().unwrap();
    assert!(url.starts_with("ws://"));
    assert!(url.contains(&format!("sessionId={session_id}")));
    assert!(url.contains(":45400/"));

    let listed: Value = client
        .get(format!("{base}/v1/interviews"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let interviews = listed["interviews"].as_array().unwrap();
    assert_eq!(interviews.len(), 1);
    assert_eq!(interviews[0]["session_id"], session_id.as_str());
    assert_eq!(interviews[0]["kind"], "project");

    // Stop is idempotent: the second call reports nothing to stop.
    let stopped: Value = client
        .delete(format!("{base}/v1/interviews/{session_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stopped["stopped"], true);

    let stopped_again: Value = client
        .delete(format!("{base}/v1/interviews/{session_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stopped_again["stopped"], false);

    let listed: Value = client
        .get(format!("{base}/v1/interviews"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed["interviews"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn create_role_session_with_full_payload() {
    let base = spawn_api(45600).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/interviews/role"))
        .json(&json!({
            "name": "Dana",
            "role": "Backend Engineer",
            "experience": "4 years",
            "company_applying": "Acme",
            "job_description": "Own the billing services"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert!(created["websocket_url"]
        .as_str()
        .unwrap()
        .contains(":45600/"));

    // Clean up the live endpoint.
    let session_id = created["session_id"].as_str().unwrap();
    client
        .delete(format!("{base}/v1/interviews/{session_id}"))
        .send()
        .await
        .unwrap();
}
