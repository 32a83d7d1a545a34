use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for model and agent streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted by a language model while streaming (provider-agnostic).
///
/// Tool-call fragments carry the provider's slot `index` so the caller can
/// reassemble several interleaved calls.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A text token chunk.
    #[serde(rename = "token")]
    Token { text: String },

    /// A tool call has started.
    #[serde(rename = "tool_call_started")]
    ToolCallStarted {
        index: usize,
        call_id: String,
        tool_name: String,
    },

    /// Incremental tool call argument data.
    #[serde(rename = "tool_call_delta")]
    ToolCallDelta { index: usize, delta: String },

    /// Stream is finished.
    #[serde(rename = "done")]
    Done {
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    /// An error occurred during streaming.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Chunks produced by a conversational agent while it answers.
///
/// A stream of chunks always ends with exactly one `Final` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseChunk {
    /// Incremental assistant text.
    Delta { text: String },
    /// The agent dispatched a worker tool.
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    /// A worker tool returned.
    ToolResult {
        call_id: String,
        tool_name: String,
        content: String,
    },
    /// The complete assistant reply.
    Final { content: String },
    /// The turn failed; no `Final` follows.
    Error { message: String },
}

impl ResponseChunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final { .. } | Self::Error { .. })
    }
}
