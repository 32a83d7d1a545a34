pub mod a2a;
pub mod sessions;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use sv_domain::config::CorsConfig;
use sv_domain::error::Error;

use crate::state::AppState;

/// Build the API routes.
///
/// - `GET  /.well-known/agent.json`, `GET /card`: agent card
/// - `POST /`: JSON-RPC 2.0 (`message/send`, `message/stream`)
/// - `POST /send-message`, `POST /send-streaming-message`: REST variants
/// - `GET  /v1/sessions`: live session introspection
/// - `GET  /health`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(a2a::json_rpc))
        .route("/.well-known/agent.json", get(a2a::agent_card))
        .route("/card", get(a2a::agent_card))
        .route("/send-message", post(a2a::send_message))
        .route("/send-streaming-message", post(a2a::send_streaming_message))
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/health", get(health))
        .with_state(state)
}

/// The routes plus CORS, request tracing and a concurrency limit.
pub fn app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.server.cors);
    let max_concurrent = state.server.max_concurrent_requests.max(1);
    tracing::info!(max_concurrent, "concurrency limit set");

    router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "sessions": state.router.table().count(),
    }))
}

// ── error rendering ─────────────────────────────────────────────────

/// HTTP status for a routing or agent failure.
pub(crate) fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::SessionConstruction { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::Provider { .. } | Error::Worker { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(e: &Error) -> Response {
    (
        error_status(e),
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}

// ── CORS ────────────────────────────────────────────────────────────

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may end in `:*` to match any port on that host. A lone `"*"`
/// allows every origin.
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\", all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();
    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            let origin = origin.to_str().unwrap_or("");
            wildcard_prefixes.iter().any(|prefix| {
                origin
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(a2a::CONTEXT_ID_HEADER),
        ])
}
