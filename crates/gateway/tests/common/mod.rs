//! Fake agents shared by the gateway integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sv_domain::error::{Error, Result};
use sv_domain::message::InboundMessage;
use sv_domain::stream::{BoxStream, ResponseChunk};
use sv_domain::tool::ToolDefinition;
use sv_sessions::{
    AgentFactory, AgentProfile, AgentReply, ContextPolicy, ConversationalAgent, HistoryEntry,
    JsonlHistoryFactory, SessionHistory, SessionTable,
};

/// Every message an agent received, as `(session_id, text)`.
pub type Inbox = Arc<Mutex<Vec<(String, String)>>>;

/// Persists the user text, then answers `"<session>: <text>"`. Text starting
/// with `fail` is persisted and then rejected.
pub struct Recording {
    history: Arc<dyn SessionHistory>,
    inbox: Inbox,
}

#[async_trait::async_trait]
impl ConversationalAgent for Recording {
    fn profile(&self) -> AgentProfile {
        AgentProfile {
            name: "DevOps Supervisor".into(),
            description: "Routes DevOps requests to worker agents".into(),
            tools: vec![ToolDefinition::query_tool(
                "aws_cloudwatch_tool",
                "Query CloudWatch alarms and metrics",
            )],
        }
    }

    async fn respond(&self, message: InboundMessage) -> Result<AgentReply> {
        let text = message.text_content();
        let session = self.history.session_id().to_owned();
        self.inbox.lock().unwrap().push((session.clone(), text.clone()));
        self.history
            .append(&[HistoryEntry::new("user", &text)])
            .await?;
        if text.starts_with("fail") {
            return Err(Error::Agent(format!("refused: {text}")));
        }
        Ok(AgentReply {
            content: format!("{session}: {text}"),
            tools_used: Vec::new(),
        })
    }

    async fn respond_stream(
        &self,
        message: InboundMessage,
    ) -> Result<BoxStream<'static, ResponseChunk>> {
        let text = message.text_content();
        self.inbox
            .lock()
            .unwrap()
            .push((self.history.session_id().to_owned(), text));
        Ok(Box::pin(async_stream::stream! {
            for piece in ["c1", "c2", "c3"] {
                yield ResponseChunk::Delta { text: piece.into() };
            }
            yield ResponseChunk::Final { content: "c1c2c3".into() };
        }))
    }
}

#[derive(Default)]
pub struct RecordingFactory {
    pub inbox: Inbox,
    pub built: AtomicUsize,
}

impl RecordingFactory {
    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<(String, String)> {
        self.inbox.lock().unwrap().clone()
    }
}

impl AgentFactory for RecordingFactory {
    fn build(
        &self,
        history: Arc<dyn SessionHistory>,
        _policy: &ContextPolicy,
    ) -> Result<Arc<dyn ConversationalAgent>> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Recording {
            history,
            inbox: self.inbox.clone(),
        }))
    }
}

/// Refuses to build any agent.
pub struct Unavailable;

impl AgentFactory for Unavailable {
    fn build(
        &self,
        history: Arc<dyn SessionHistory>,
        _policy: &ContextPolicy,
    ) -> Result<Arc<dyn ConversationalAgent>> {
        Err(Error::SessionConstruction {
            session_id: history.session_id().to_owned(),
            message: "model unavailable".into(),
        })
    }
}

pub fn table(root: &Path, agents: Arc<dyn AgentFactory>) -> Arc<SessionTable> {
    Arc::new(SessionTable::new(
        root,
        ContextPolicy::default(),
        Arc::new(JsonlHistoryFactory),
        agents,
    ))
}
