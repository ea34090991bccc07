use super::*;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::error::describe_failure;

#[derive(Clone, Default)]
struct Captured {
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn spawn_server(app: Router) -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn sample_snapshot() -> CounterSnapshot {
    CounterSnapshot {
        http_count: 2,
        http_last_message: Some("hi".into()),
        local_count: 1,
        local_last_message: None,
        remote_count: 0,
        remote_last_message: None,
    }
}

async fn answer_ok(
    State(captured): State<Captured>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    captured.bodies.lock().await.push(body);
    Json(serde_json::json!({ "Ok": sample_snapshot() }))
}

#[tokio::test]
async fn call_posts_envelope_and_parses_snapshot() {
    let captured = Captured::default();
    let app = Router::new()
        .route("/api", post(answer_ok))
        .with_state(captured.clone());
    let server_url = spawn_server(app).await.expect("spawn server");
    let client = HttpRemoteClient::new(&server_url).expect("client");

    let snapshot = client
        .call("ping_http", "{\"message\":\"hi\"}".to_string())
        .await
        .expect("call");

    assert_eq!(snapshot, sample_snapshot());
    assert_eq!(
        captured.bodies.lock().await.as_slice(),
        &[serde_json::json!({ "PingHttp": "{\"message\":\"hi\"}" })]
    );
}

#[tokio::test]
async fn err_payload_becomes_remote_failure_details() {
    let app = Router::new().route(
        "/api",
        post(|| async { Json(serde_json::json!({ "Err": "unknown remote node zed.os" })) }),
    );
    let server_url = spawn_server(app).await.expect("spawn server");
    let client = HttpRemoteClient::new(&server_url).expect("client");

    let err = client
        .call("send_message", "{}".to_string())
        .await
        .expect_err("must fail");

    let failure = err.downcast_ref::<RemoteFailure>().expect("remote failure");
    assert_eq!(failure.message.as_deref(), Some("send_message failed"));
    assert_eq!(describe_failure(&err), "unknown remote node zed.os");
}

#[tokio::test]
async fn non_success_status_keeps_body_as_details() {
    let app = Router::new().route(
        "/api",
        post(|| async { (StatusCode::BAD_REQUEST, "unknown variant `PingLocal`") }),
    );
    let server_url = spawn_server(app).await.expect("spawn server");
    let client = HttpRemoteClient::new(&server_url).expect("client");

    let err = client
        .call("get_counters", "\"\"".to_string())
        .await
        .expect_err("must fail");

    let failure = err.downcast_ref::<RemoteFailure>().expect("remote failure");
    assert_eq!(
        failure.message.as_deref(),
        Some("HTTP request failed with status 400")
    );
    assert_eq!(describe_failure(&err), "unknown variant `PingLocal`");
}

#[tokio::test]
async fn non_success_status_without_body_reports_status() {
    let app = Router::new().route("/api", post(|| async { StatusCode::BAD_GATEWAY }));
    let server_url = spawn_server(app).await.expect("spawn server");
    let client = HttpRemoteClient::new(&server_url).expect("client");

    let err = client
        .call("get_counters", "\"\"".to_string())
        .await
        .expect_err("must fail");

    assert_eq!(describe_failure(&err), "HTTP request failed with status 502");
}

#[tokio::test]
async fn unknown_operation_is_rejected_before_sending() {
    let client = HttpRemoteClient::new("http://127.0.0.1:9").expect("client");
    let err = client
        .call("ping_local", String::new())
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("unsupported node operation"));
}

#[tokio::test]
async fn post_api_returns_status_and_body_verbatim() {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/api",
            post(
                |State(captured): State<Captured>, Json(body): Json<serde_json::Value>| async move {
                    captured.bodies.lock().await.push(body);
                    (StatusCode::BAD_REQUEST, "boom")
                },
            ),
        )
        .with_state(captured.clone());
    let server_url = spawn_server(app).await.expect("spawn server");
    let client = HttpRemoteClient::new(&server_url).expect("client");

    let response = client
        .post_api(serde_json::json!({ "PingLocal": "x" }))
        .await
        .expect("raw response");

    assert_eq!(
        response,
        RawResponse {
            status: 400,
            body: "boom".into()
        }
    );
    assert!(!response.is_success());
    assert_eq!(
        captured.bodies.lock().await.as_slice(),
        &[serde_json::json!({ "PingLocal": "x" })]
    );
}

#[tokio::test]
async fn resolves_identity_from_node() {
    let app = Router::new().route("/our", get(|| async { "alice.os\n" }));
    let server_url = spawn_server(app).await.expect("spawn server");
    let client = HttpRemoteClient::new(&server_url).expect("client");

    assert_eq!(client.resolve_node_identity().await.as_deref(), Some("alice.os"));
}

#[tokio::test]
async fn unreachable_node_has_no_identity() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let client = HttpRemoteClient::new(&format!("http://{addr}")).expect("client");

    assert_eq!(client.resolve_node_identity().await, None);
}

#[test]
fn api_url_is_rooted_at_node() {
    let client = HttpRemoteClient::new("http://node.local:8080/ui/").expect("client");
    assert_eq!(client.api_url().as_str(), "http://node.local:8080/api");
    assert!(HttpRemoteClient::new("not a url").is_err());
}
