//! Session introspection.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionsView {
    pub count: usize,
    pub session_ids: Vec<String>,
    pub default_session_id: String,
    pub storage_root: String,
}

/// `GET /v1/sessions`: live sessions held by this process.
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsView> {
    let table = state.router.table();
    let session_ids = table.list_ids();
    Json(SessionsView {
        count: session_ids.len(),
        session_ids,
        default_session_id: state.router.default_session_id().to_owned(),
        storage_root: table.storage_root().display().to_string(),
    })
}
