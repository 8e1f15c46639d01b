//! HTTP surface of the job service, served on an ephemeral port.

mod common;

use std::sync::Arc;

use common::{game, Script, StaticSource};
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};

const OWNER_HEADER: &str = "x-user-id";

/// Start the router in the background and return its base URL
async fn spawn_server() -> String {
    let source = StaticSource::default().with_user("alice", vec![game("g1", "e4 e5")]);
    let coordinator = common::coordinator(Arc::new(Script::new()), source, 1);
    let app = server::router(coordinator);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn submit(client: &reqwest::Client, base: &str, owner: &str) -> String {
    let resp = client
        .post(format!("{base}/api/jobs"))
        .header(OWNER_HEADER, owner)
        .json(&json!({ "platform": "LICHESS", "username": "alice", "gameLimit": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: JsonValue = resp.json().await.unwrap();
    assert_eq!(body["status"], "QUEUED");
    body["jobId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let base = spawn_server().await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: JsonValue = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_job_routes_need_an_owner() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/jobs"))
        .json(&json!({ "platform": "LICHESS", "username": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: JsonValue = resp.json().await.unwrap();
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_submit_then_poll_until_completed() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let job_id = submit(&client, &base, "u1").await;

    let mut body = JsonValue::Null;
    for _ in 0..500 {
        let resp = client
            .get(format!("{base}/api/jobs/{job_id}"))
            .header(OWNER_HEADER, "u1")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body = resp.json().await.unwrap();
        if body["status"] == "COMPLETED" || body["status"] == "FAILED" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["jobId"], job_id.as_str());
    assert_eq!(body["progress"]["gamesDone"], 1);

    let resp = client
        .get(format!("{base}/api/jobs/{job_id}/games"))
        .header(OWNER_HEADER, "u1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let games: JsonValue = resp.json().await.unwrap();
    assert_eq!(games["total"], 1);
    assert_eq!(games["games"][0]["gameId"], "g1");
}

#[tokio::test]
async fn test_foreign_and_malformed_ids_are_not_found() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    let job_id = submit(&client, &base, "u1").await;

    for path in [
        format!("/api/jobs/{job_id}"),
        format!("/api/jobs/{job_id}/games"),
        "/api/jobs/not-a-uuid".to_string(),
    ] {
        let resp = client
            .get(format!("{base}{path}"))
            .header(OWNER_HEADER, "u2")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
    }

    let resp = client
        .post(format!("{base}/api/jobs/{job_id}/cancel"))
        .header(OWNER_HEADER, "u2")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_request_is_bad_request() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/jobs"))
        .header(OWNER_HEADER, "u1")
        .json(&json!({ "platform": "LICHESS", "username": "alice", "gameLimit": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
