//! Agent-to-agent endpoints.
//!
//! - `GET  /.well-known/agent.json`, `GET /card`: agent card
//! - `POST /`                      : JSON-RPC `message/send`, `message/stream`
//! - `POST /send-message`          : REST, full reply
//! - `POST /send-streaming-message`: REST, SSE chunks

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use sv_domain::message::{CallHints, InboundMessage};
use sv_domain::stream::ResponseChunk;

use super::{error_response, error_status};
use crate::runtime::RoutedStream;
use crate::state::AppState;

/// Header a caller may use to pin the session without touching the message.
pub const CONTEXT_ID_HEADER: &str = "x-context-id";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent card
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn agent_card(State(state): State<AppState>) -> Response {
    let profile = match state.router.introspect() {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };
    let skills: Vec<Value> = profile
        .tools
        .iter()
        .map(|t| {
            json!({
                "id": t.name,
                "name": t.name,
                "description": t.description,
                "tags": [],
            })
        })
        .collect();

    Json(json!({
        "name": profile.name,
        "description": profile.description,
        "url": format!("{}/", state.server.advertised_url()),
        "version": state.server.protocol_version,
        "capabilities": { "streaming": true },
        "defaultInputModes": ["text"],
        "defaultOutputModes": ["text"],
        "skills": skills,
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON-RPC
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

fn rpc_result(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: &Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message.into() },
    })
}

/// `POST /`
///
/// The body is parsed by hand so malformed requests still get a JSON-RPC
/// error object instead of a framework rejection.
pub async fn json_rpc(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return Json(rpc_error(&Value::Null, PARSE_ERROR, e.to_string())).into_response(),
    };
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let req: RpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => return Json(rpc_error(&id, INVALID_REQUEST, e.to_string())).into_response(),
    };

    let Some(message) = req.params.get("message").cloned() else {
        return Json(rpc_error(&req.id, INVALID_PARAMS, "params.message is required"))
            .into_response();
    };
    let hints = rpc_hints(&headers, &req.params);
    let message = InboundMessage::from_json(message);

    match req.method.as_str() {
        "message/send" => match state.router.respond(message, &hints).await {
            Ok(routed) => {
                let result = agent_message(&routed.session_id, &routed.reply.content, &routed.reply.tools_used);
                Json(rpc_result(&req.id, result)).into_response()
            }
            Err(e) => {
                tracing::warn!(error = %e, "message/send failed");
                Json(rpc_error(&req.id, INTERNAL_ERROR, e.to_string())).into_response()
            }
        },
        "message/stream" => match state.router.respond_stream(message, &hints).await {
            Ok(routed) => Sse::new(rpc_event_stream(req.id, routed))
                .keep_alive(KeepAlive::default())
                .into_response(),
            Err(e) => {
                tracing::warn!(error = %e, "message/stream failed");
                Json(rpc_error(&req.id, INTERNAL_ERROR, e.to_string())).into_response()
            }
        },
        other => Json(rpc_error(
            &req.id,
            METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        ))
        .into_response(),
    }
}

/// Routing hints for a JSON-RPC call: `params.metadata` first, then the
/// context-id header.
fn rpc_hints(headers: &HeaderMap, params: &Value) -> CallHints {
    let meta = |keys: [&str; 2]| {
        keys.iter().find_map(|k| {
            params
                .pointer(&format!("/metadata/{k}"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        })
    };
    CallHints {
        context_id: meta(["contextId", "context_id"]).or_else(|| header_context_id(headers)),
        task_id: meta(["taskId", "task_id"]),
    }
}

fn header_context_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTEXT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// A complete agent reply as a protocol message.
fn agent_message(session_id: &str, content: &str, tools_used: &[String]) -> Value {
    json!({
        "kind": "message",
        "role": "agent",
        "messageId": uuid::Uuid::new_v4().to_string(),
        "contextId": session_id,
        "parts": [{ "kind": "text", "text": content }],
        "metadata": { "toolsUsed": tools_used },
    })
}

/// Map agent chunks onto JSON-RPC stream responses.
///
/// Text deltas become artifact updates, tool activity becomes `working`
/// status updates, and the final answer closes the stream with a
/// `completed` status carrying the full message.
fn rpc_event_stream(
    id: Value,
    routed: RoutedStream,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let RoutedStream { session_id, mut stream } = routed;
    let artifact_id = uuid::Uuid::new_v4().to_string();

    async_stream::stream! {
        let mut tools_used: Vec<String> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let payload = match &chunk {
                ResponseChunk::Delta { text } => rpc_result(&id, json!({
                    "kind": "artifact-update",
                    "contextId": session_id,
                    "append": true,
                    "lastChunk": false,
                    "artifact": {
                        "artifactId": artifact_id,
                        "parts": [{ "kind": "text", "text": text }],
                    },
                })),
                ResponseChunk::ToolCall { tool_name, .. } | ResponseChunk::ToolResult { tool_name, .. } => {
                    if matches!(chunk, ResponseChunk::ToolCall { .. }) {
                        tools_used.push(tool_name.clone());
                    }
                    rpc_result(&id, json!({
                        "kind": "status-update",
                        "contextId": session_id,
                        "final": false,
                        "status": { "state": "working" },
                        "metadata": { "event": chunk },
                    }))
                }
                ResponseChunk::Final { content } => rpc_result(&id, json!({
                    "kind": "status-update",
                    "contextId": session_id,
                    "final": true,
                    "status": {
                        "state": "completed",
                        "message": agent_message(&session_id, content, &tools_used),
                    },
                })),
                ResponseChunk::Error { message } => rpc_error(&id, INTERNAL_ERROR, message.clone()),
            };
            yield Ok(Event::default().data(payload.to_string()));
            if chunk.is_terminal() {
                break;
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REST variants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    /// Text, a mapping, a protocol message or a list of content blocks.
    pub message: Value,
    #[serde(default, alias = "context_id")]
    pub context_id: Option<String>,
    #[serde(default, alias = "task_id")]
    pub task_id: Option<String>,
}

impl SendMessageBody {
    /// Parse a request body. A malformed body becomes a 400 with the
    /// same `{"error": ...}` shape as every other failure.
    fn parse(body: &Bytes) -> Result<Self, Response> {
        serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(error = %e, "rejected message body");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid message body: {e}") })),
            )
                .into_response()
        })
    }

    fn split(self, headers: &HeaderMap) -> (InboundMessage, CallHints) {
        let hints = CallHints {
            context_id: self
                .context_id
                .filter(|s| !s.is_empty())
                .or_else(|| header_context_id(headers)),
            task_id: self.task_id,
        };
        (InboundMessage::from_json(self.message), hints)
    }
}

/// `POST /send-message`
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match SendMessageBody::parse(&body) {
        Ok(b) => b,
        Err(rejection) => return rejection,
    };
    let (message, hints) = body.split(&headers);
    match state.router.respond(message, &hints).await {
        Ok(routed) => Json(routed).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, status = %error_status(&e), "send-message failed");
            error_response(&e)
        }
    }
}

/// `POST /send-streaming-message`
///
/// Emits a `session` event first, then one event per chunk named after the
/// chunk type (`delta`, `tool_call`, `tool_result`, `final`, `error`).
pub async fn send_streaming_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match SendMessageBody::parse(&body) {
        Ok(b) => b,
        Err(rejection) => return rejection,
    };
    let (message, hints) = body.split(&headers);
    match state.router.respond_stream(message, &hints).await {
        Ok(routed) => Sse::new(chunk_event_stream(routed))
            .keep_alive(KeepAlive::default())
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "send-streaming-message failed");
            error_response(&e)
        }
    }
}

fn chunk_event_stream(routed: RoutedStream) -> impl Stream<Item = Result<Event, Infallible>> {
    let RoutedStream { session_id, mut stream } = routed;
    async_stream::stream! {
        yield Ok(Event::default()
            .event("session")
            .data(json!({ "session_id": session_id }).to_string()));
        while let Some(chunk) = stream.next().await {
            let event_type = match &chunk {
                ResponseChunk::Delta { .. } => "delta",
                ResponseChunk::ToolCall { .. } => "tool_call",
                ResponseChunk::ToolResult { .. } => "tool_result",
                ResponseChunk::Final { .. } => "final",
                ResponseChunk::Error { .. } => "error",
            };
            let data = serde_json::to_string(&chunk).unwrap_or_default();
            yield Ok(Event::default().event(event_type).data(data));
        }
    }
}
