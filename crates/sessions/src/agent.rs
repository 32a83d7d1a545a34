//! The conversational-agent contract each session is built around.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use sv_domain::error::{Error, Result};
use sv_domain::message::InboundMessage;
use sv_domain::stream::{BoxStream, ResponseChunk};
use sv_domain::tool::ToolDefinition;

use crate::history::SessionHistory;
use crate::policy::ContextPolicy;

/// What an agent says about itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub tools: Vec<ToolDefinition>,
}

/// A complete, non-streamed answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentReply {
    pub content: String,
    /// Names of the tools dispatched while answering, in order.
    pub tools_used: Vec<String>,
}

/// A stateful agent bound to one session's history.
#[async_trait::async_trait]
pub trait ConversationalAgent: Send + Sync {
    fn profile(&self) -> AgentProfile;

    async fn respond(&self, message: InboundMessage) -> Result<AgentReply>;

    /// Answer incrementally. The stream ends with one `Final` or `Error`
    /// chunk and cannot be restarted.
    async fn respond_stream(
        &self,
        message: InboundMessage,
    ) -> Result<BoxStream<'static, ResponseChunk>>;
}

/// Builds the agent for a newly created session.
pub trait AgentFactory: Send + Sync {
    fn build(
        &self,
        history: Arc<dyn SessionHistory>,
        policy: &ContextPolicy,
    ) -> Result<Arc<dyn ConversationalAgent>>;
}

/// Drain a chunk stream into a reply. An `Error` chunk, or a stream that
/// ends without `Final`, becomes `Err`.
pub async fn collect_reply(mut stream: BoxStream<'static, ResponseChunk>) -> Result<AgentReply> {
    let mut tools_used = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            ResponseChunk::ToolCall { tool_name, .. } => tools_used.push(tool_name),
            ResponseChunk::Final { content } => return Ok(AgentReply { content, tools_used }),
            ResponseChunk::Error { message } => return Err(Error::Agent(message)),
            ResponseChunk::Delta { .. } | ResponseChunk::ToolResult { .. } => {}
        }
    }
    Err(Error::Agent("response stream ended without a final answer".into()))
}
