use serde::Serialize;

/// Structured trace events emitted across all supervisor crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionRouted {
        session_id: String,
        source: String,
        streaming: bool,
    },
    SessionCreated {
        session_id: String,
        total_sessions: usize,
    },
    SessionDisposed {
        session_id: String,
        artifact_removed: bool,
    },
    HistoryAppend {
        session_id: String,
        lines: usize,
    },
    HistorySummarized {
        session_id: String,
        messages_summarized: usize,
        summary_chars: usize,
    },
    ModelRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    WorkerCall {
        worker: String,
        duration_ms: u64,
        ok: bool,
    },
    PollCycle {
        session_id: String,
        ephemeral: bool,
        duration_ms: u64,
        ok: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sv_event");
    }
}
