//! Session-routing façade.
//!
//! Presents one agent-like surface over the whole session table: every call
//! resolves a session identifier, materializes that session on first use
//! and forwards the (possibly cleaned) message to its agent.

use std::sync::Arc;

use serde::Serialize;
use sv_domain::config::SessionsConfig;
use sv_domain::error::Result;
use sv_domain::message::{CallHints, InboundMessage};
use sv_domain::stream::{BoxStream, ResponseChunk};
use sv_domain::trace::TraceEvent;
use sv_sessions::{
    AgentProfile, AgentReply, ConversationalAgent, SessionIdExtractor, SessionRecord,
    SessionTable,
};

/// A complete answer plus the session that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct RoutedReply {
    pub session_id: String,
    #[serde(flatten)]
    pub reply: AgentReply,
}

/// A chunk stream plus the session that produces it.
pub struct RoutedStream {
    pub session_id: String,
    pub stream: BoxStream<'static, ResponseChunk>,
}

pub struct SessionRouter {
    table: Arc<SessionTable>,
    extractor: SessionIdExtractor,
}

impl SessionRouter {
    pub fn new(table: Arc<SessionTable>, extractor: SessionIdExtractor) -> Self {
        Self { table, extractor }
    }

    pub fn from_config(table: Arc<SessionTable>, cfg: &SessionsConfig) -> Self {
        let extractor = SessionIdExtractor::new(cfg.default_session_id.clone())
            .with_task_id_routing(cfg.task_id_routing);
        Self::new(table, extractor)
    }

    pub fn table(&self) -> &Arc<SessionTable> {
        &self.table
    }

    pub fn default_session_id(&self) -> &str {
        self.extractor.default_id()
    }

    fn resolve(
        &self,
        message: InboundMessage,
        hints: &CallHints,
        streaming: bool,
    ) -> Result<(Arc<SessionRecord>, InboundMessage)> {
        let extraction = self.extractor.extract(message, hints);
        tracing::debug!(
            session_id = %extraction.session_id,
            source = extraction.source.as_str(),
            streaming,
            "message routed"
        );
        TraceEvent::SessionRouted {
            session_id: extraction.session_id.clone(),
            source: extraction.source.as_str().to_owned(),
            streaming,
        }
        .emit();

        let record = self.table.get_or_create(&extraction.session_id)?;
        Ok((record, extraction.message))
    }

    pub async fn respond(&self, message: InboundMessage, hints: &CallHints) -> Result<RoutedReply> {
        let (record, message) = self.resolve(message, hints, false)?;
        let reply = record.agent.respond(message).await?;
        Ok(RoutedReply {
            session_id: record.id.clone(),
            reply,
        })
    }

    /// Stream the resolved session's answer. Chunks arrive in the order the
    /// agent produced them and the stream is consumed once.
    pub async fn respond_stream(
        &self,
        message: InboundMessage,
        hints: &CallHints,
    ) -> Result<RoutedStream> {
        let (record, message) = self.resolve(message, hints, true)?;
        let stream = record.agent.respond_stream(message).await?;
        Ok(RoutedStream {
            session_id: record.id.clone(),
            stream,
        })
    }

    /// The default session's agent, created on demand. This is the only
    /// thing the façade exposes beyond routing.
    pub fn default_agent(&self) -> Result<Arc<dyn ConversationalAgent>> {
        let record = self.table.get_or_create(self.extractor.default_id())?;
        Ok(record.agent.clone())
    }

    /// Name, description and tools, as reported by the default session.
    pub fn introspect(&self) -> Result<AgentProfile> {
        Ok(self.default_agent()?.profile())
    }
}
