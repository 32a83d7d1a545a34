//! OpenAI-compatible adapter against an in-process mock endpoint.

use std::net::SocketAddr;

use axum::routing::post;
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::{json, Value};
use sv_domain::config::LlmConfig;
use sv_domain::stream::StreamEvent;
use sv_domain::tool::{Message, ToolDefinition};
use sv_providers::{ChatRequest, LanguageModel, OpenAiCompatModel, ToolCallAssembler};

async fn spawn_mock(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr) -> LlmConfig {
    LlmConfig {
        base_url: format!("http://{addr}/v1/"),
        api_key_env: String::new(),
        timeout_ms: 5_000,
        ..LlmConfig::default()
    }
}

#[tokio::test]
async fn chat_posts_tools_and_parses_reply() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["stream"], false);
            assert_eq!(body["tools"][0]["function"]["name"], "aws_cloudwatch_tool");
            Json(json!({
                "model": body["model"],
                "choices": [{
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": "All alarms are OK."}
                }],
                "usage": {"prompt_tokens": 7, "completion_tokens": 4, "total_tokens": 11}
            }))
        }),
    );
    let addr = spawn_mock(app).await;
    let model = OpenAiCompatModel::from_config(&config_for(addr)).unwrap();

    let req = ChatRequest {
        messages: vec![Message::user("any alarms firing?")],
        tools: vec![ToolDefinition::query_tool("aws_cloudwatch_tool", "cloudwatch")],
        ..ChatRequest::default()
    };
    let resp = model.chat(&req).await.unwrap();
    assert_eq!(resp.content, "All alarms are OK.");
    assert_eq!(resp.model, "gpt-4o-mini");
    assert_eq!(resp.usage.unwrap().total_tokens, 11);
}

#[tokio::test]
async fn non_success_status_becomes_provider_error() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad key") }),
    );
    let addr = spawn_mock(app).await;
    let model = OpenAiCompatModel::from_config(&config_for(addr)).unwrap();

    let err = model.chat(&ChatRequest::default()).await.unwrap_err();
    let text = err.to_string();
    assert!(text.contains("401"), "{text}");
    assert!(text.contains("bad key"), "{text}");
}

#[tokio::test]
async fn stream_yields_tokens_then_assembled_tool_call() {
    let sse = [
        r#"{"choices":[{"delta":{"content":"Checking"}}]}"#,
        r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"email_tool","arguments":"{\"query\":"}}]}}]}"#,
        r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"unread\"}"}}]},"finish_reason":"tool_calls"}]}"#,
        "[DONE]",
    ]
    .iter()
    .map(|d| format!("data: {d}\n\n"))
    .collect::<String>();

    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let sse = sse.clone();
            async move { ([("content-type", "text/event-stream")], sse) }
        }),
    );
    let addr = spawn_mock(app).await;
    let model = OpenAiCompatModel::from_config(&config_for(addr)).unwrap();

    let mut stream = model.chat_stream(&ChatRequest::default()).await.unwrap();
    let mut text = String::new();
    let mut asm = ToolCallAssembler::default();
    let mut finish = None;
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        if asm.push(&event) {
            continue;
        }
        match event {
            StreamEvent::Token { text: t } => text.push_str(&t),
            StreamEvent::Done { finish_reason, .. } => finish = finish_reason,
            other => panic!("unexpected {other:?}"),
        }
    }

    assert_eq!(text, "Checking");
    assert_eq!(finish.as_deref(), Some("tool_calls"));
    let calls = asm.finish();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool_name, "email_tool");
    assert_eq!(calls[0].arguments["query"], "unread");
}
