//! Remote worker against an in-process JSON-RPC endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use sv_domain::config::WorkerConfig;
use sv_tools::{RemoteAgentWorker, ToolRegistry, WorkerTool};

async fn spawn_worker(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn query_round_trips_through_message_send() {
    let app = Router::new().route(
        "/",
        post(|Json(req): Json<Value>| async move {
            let query = req["params"]["message"]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default()
                .to_owned();
            Json(json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "result": {
                    "kind": "message",
                    "role": "agent",
                    "parts": [{"kind": "text", "text": format!("handled: {query}")}]
                }
            }))
        }),
    );
    let addr = spawn_worker(app).await;
    let worker = RemoteAgentWorker::from_config(&WorkerConfig::email(format!("http://{addr}/")))
        .unwrap();

    assert_eq!(worker.definition().name, "email_tool");
    assert_eq!(worker.call("unread mail").await.unwrap(), "handled: unread mail");
}

#[tokio::test]
async fn json_rpc_error_reaches_model_as_labelled_text() {
    let app = Router::new().route(
        "/",
        post(|| async {
            Json(json!({
                "jsonrpc": "2.0",
                "id": "1",
                "error": {"code": -32603, "message": "credentials expired"}
            }))
        }),
    );
    let addr = spawn_worker(app).await;
    let worker = RemoteAgentWorker::from_config(&WorkerConfig::aws_cloudwatch(format!(
        "http://{addr}/"
    )))
    .unwrap();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(worker));
    let out = registry
        .invoke("aws_cloudwatch_tool", &json!({"query": "alarms"}))
        .await;
    assert_eq!(out, "AWS CloudWatch Agent Error: credentials expired");
}

#[tokio::test]
async fn unreachable_worker_is_an_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let worker = RemoteAgentWorker::from_config(&WorkerConfig::email(format!("http://{addr}/")))
        .unwrap();
    assert!(worker.call("anything").await.is_err());
}
