//! The supervisor agent bound to one session.
//!
//! A turn loads the session history, folds old entries into a summary when
//! the active window is too long, then loops: stream a completion, relay
//! text, dispatch any tool calls to the worker registry and feed the results
//! back, until the model answers without calling a tool.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use sv_domain::config::{LlmConfig, SupervisorConfig};
use sv_domain::error::{Error, Result};
use sv_domain::message::InboundMessage;
use sv_domain::stream::{BoxStream, ResponseChunk, StreamEvent};
use sv_domain::tool::Message;
use sv_domain::trace::TraceEvent;
use sv_providers::{ChatRequest, LanguageModel, ToolCallAssembler};
use sv_sessions::{
    collect_reply, AgentFactory, AgentProfile, AgentReply, ContextPolicy, ConversationalAgent,
    HistoryEntry, SessionHistory,
};
use sv_tools::ToolRegistry;

use super::prompt::system_prompt;

/// Buffered chunks between the turn task and the consumer.
const CHUNK_BUFFER: usize = 64;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared pieces
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy)]
pub struct TurnSettings {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_tool_loops: usize,
}

impl TurnSettings {
    pub fn from_config(supervisor: &SupervisorConfig, llm: &LlmConfig) -> Self {
        Self {
            temperature: Some(llm.temperature),
            max_tokens: llm.max_tokens,
            max_tool_loops: supervisor.max_tool_loops.max(1),
        }
    }
}

/// Everything every session's agent has in common.
struct Shared {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    profile: AgentProfile,
    settings: TurnSettings,
}

/// Builds a [`SupervisorAgent`] for each new session.
pub struct SupervisorFactory {
    shared: Arc<Shared>,
}

impl SupervisorFactory {
    pub fn new(
        cfg: &SupervisorConfig,
        settings: TurnSettings,
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let definitions = tools.definitions();
        let shared = Shared {
            system_prompt: system_prompt(cfg.system_prompt.as_deref(), &definitions),
            profile: AgentProfile {
                name: cfg.name.clone(),
                description: cfg.description.clone(),
                tools: definitions,
            },
            model,
            tools,
            settings,
        };
        Self {
            shared: Arc::new(shared),
        }
    }
}

impl AgentFactory for SupervisorFactory {
    fn build(
        &self,
        history: Arc<dyn SessionHistory>,
        policy: &ContextPolicy,
    ) -> Result<Arc<dyn ConversationalAgent>> {
        Ok(Arc::new(SupervisorAgent {
            shared: self.shared.clone(),
            history,
            policy: policy.clone(),
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct SupervisorAgent {
    shared: Arc<Shared>,
    history: Arc<dyn SessionHistory>,
    policy: ContextPolicy,
}

#[async_trait::async_trait]
impl ConversationalAgent for SupervisorAgent {
    fn profile(&self) -> AgentProfile {
        self.shared.profile.clone()
    }

    async fn respond(&self, message: InboundMessage) -> Result<AgentReply> {
        collect_reply(self.respond_stream(message).await?).await
    }

    async fn respond_stream(
        &self,
        message: InboundMessage,
    ) -> Result<BoxStream<'static, ResponseChunk>> {
        let (tx, mut rx) = mpsc::channel::<ResponseChunk>(CHUNK_BUFFER);
        let agent = self.clone();
        let text = message.text_content();
        let session_id = self.history.session_id().to_owned();

        let span = tracing::info_span!("turn", session_id = %session_id);
        let task = tokio::spawn(
            async move {
                tracing::debug!("turn started");
                let terminal = match agent.run_turn(text, &tx).await {
                    Ok(content) => ResponseChunk::Final { content },
                    Err(_) if tx.is_closed() => {
                        tracing::debug!("turn abandoned by its consumer");
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "turn failed");
                        ResponseChunk::Error {
                            message: e.to_string(),
                        }
                    }
                };
                let _ = tx.send(terminal).await;
            }
            .instrument(span),
        );
        let task = AbortOnDrop(task);

        Ok(Box::pin(async_stream::stream! {
            // Dropping the stream stops the turn.
            let _task = task;
            while let Some(chunk) = rx.recv().await {
                yield chunk;
            }
        }))
    }
}

impl SupervisorAgent {
    async fn run_turn(&self, user_text: String, tx: &mpsc::Sender<ResponseChunk>) -> Result<String> {
        let lines = self.history.load().await?;
        let (summary, active) = self.compact(lines).await?;

        let mut messages = self.context_messages(summary.as_deref(), &active);
        messages.push(Message::user(&user_text));
        self.history
            .append(&[HistoryEntry::new("user", &user_text)])
            .await?;

        let settings = self.shared.settings;
        let tools = self.shared.tools.definitions();
        let mut tools_used: Vec<String> = Vec::new();

        for round in 0..settings.max_tool_loops {
            if tx.is_closed() {
                return Err(consumer_gone());
            }
            tracing::debug!(round, "model round trip");
            let req = ChatRequest {
                messages: messages.clone(),
                tools: tools.clone(),
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            };
            let mut stream = self.shared.model.chat_stream(&req).await?;

            let mut text = String::new();
            let mut calls = ToolCallAssembler::default();
            while let Some(event) = stream.next().await {
                let event = event?;
                if calls.push(&event) {
                    continue;
                }
                match event {
                    StreamEvent::Token { text: t } => {
                        text.push_str(&t);
                        relay(tx, ResponseChunk::Delta { text: t }).await?;
                    }
                    StreamEvent::Done { .. } => break,
                    StreamEvent::Error { message } => {
                        return Err(Error::Provider {
                            provider: self.shared.model.provider_id().to_owned(),
                            message,
                        });
                    }
                    StreamEvent::ToolCallStarted { .. } | StreamEvent::ToolCallDelta { .. } => {}
                }
            }

            let calls = calls.finish();
            if calls.is_empty() {
                if tx.is_closed() {
                    return Err(consumer_gone());
                }
                let mut entry = HistoryEntry::new("assistant", &text);
                if !tools_used.is_empty() {
                    entry = entry.with_metadata(serde_json::json!({ "tools_used": tools_used }));
                }
                self.history.append(&[entry]).await?;
                return Ok(text);
            }

            messages.push(Message::assistant_with_tools(text, calls.clone()));
            for call in calls {
                if tx.is_closed() {
                    return Err(consumer_gone());
                }
                tools_used.push(call.tool_name.clone());
                relay(
                    tx,
                    ResponseChunk::ToolCall {
                        call_id: call.call_id.clone(),
                        tool_name: call.tool_name.clone(),
                        arguments: call.arguments.clone(),
                    },
                )
                .await?;

                let output = self
                    .shared
                    .tools
                    .invoke(&call.tool_name, &call.arguments)
                    .await;

                relay(
                    tx,
                    ResponseChunk::ToolResult {
                        call_id: call.call_id.clone(),
                        tool_name: call.tool_name.clone(),
                        content: output.clone(),
                    },
                )
                .await?;
                messages.push(Message::tool_result(call.call_id, output));
            }
        }

        Err(Error::Agent(format!(
            "no final answer after {} model round trips",
            settings.max_tool_loops
        )))
    }

    /// Apply the context policy to the loaded history.
    ///
    /// Returns the summary the model should see and the entries after it.
    /// A failed summary request leaves the window as it is.
    async fn compact(&self, lines: Vec<HistoryEntry>) -> Result<(Option<String>, Vec<HistoryEntry>)> {
        let window = self.policy.active_window(&lines);
        let summary = window.summary.map(|s| s.content.clone());
        if !self.policy.needs_summary(&window) {
            return Ok((summary, window.entries.to_vec()));
        }
        let (old, keep) = self.policy.split(window.entries);
        if old.is_empty() {
            return Ok((summary, window.entries.to_vec()));
        }

        let req = ChatRequest {
            messages: vec![Message::user(ContextPolicy::summary_prompt(window.summary, old))],
            tools: Vec::new(),
            temperature: Some(0.1),
            max_tokens: Some(2000),
        };
        let text = match self.shared.model.chat(&req).await {
            Ok(resp) if !resp.content.trim().is_empty() => resp.content,
            Ok(_) => {
                tracing::warn!("summary came back empty, keeping full window");
                return Ok((summary, window.entries.to_vec()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "summary request failed, keeping full window");
                return Ok((summary, window.entries.to_vec()));
            }
        };

        // The kept tail is written again after the marker so the next load
        // sees it inside the window.
        let mut appended = Vec::with_capacity(keep.len() + 1);
        appended.push(ContextPolicy::summary_entry(&text, old.len()));
        appended.extend(keep.iter().cloned());
        self.history.append(&appended).await?;

        TraceEvent::HistorySummarized {
            session_id: self.history.session_id().to_owned(),
            messages_summarized: old.len(),
            summary_chars: text.len(),
        }
        .emit();

        Ok((Some(text), keep.to_vec()))
    }

    fn context_messages(&self, summary: Option<&str>, entries: &[HistoryEntry]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(entries.len() + 3);
        messages.push(Message::system(&self.shared.system_prompt));
        if let Some(s) = summary {
            messages.push(Message::system(format!(
                "Summary of the earlier conversation:\n{s}"
            )));
        }
        for entry in entries {
            match entry.role.as_str() {
                "user" => messages.push(Message::user(&entry.content)),
                "assistant" if !entry.content.is_empty() => {
                    messages.push(Message::assistant(&entry.content))
                }
                _ => {}
            }
        }
        messages
    }
}

// ── Turn plumbing ───────────────────────────────────────────────────

/// Aborts the turn task when the chunk stream is dropped before the end.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn relay(tx: &mpsc::Sender<ResponseChunk>, chunk: ResponseChunk) -> Result<()> {
    tx.send(chunk).await.map_err(|_| consumer_gone())
}

fn consumer_gone() -> Error {
    Error::Agent("response stream dropped".into())
}
