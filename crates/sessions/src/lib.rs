//! Session routing for the supervisor.
//!
//! Pulls a session identifier out of whatever shape an inbound message
//! arrives in, maps each identifier to an isolated conversational agent with
//! its own persisted history, and keeps those agents in a process-wide table.

pub mod agent;
pub mod extract;
pub mod history;
pub mod policy;
pub mod table;

pub use agent::{collect_reply, AgentFactory, AgentProfile, AgentReply, ConversationalAgent};
pub use extract::{Extraction, IdSource, SessionIdExtractor};
pub use history::{HistoryEntry, HistoryFactory, JsonlHistory, JsonlHistoryFactory, SessionHistory};
pub use policy::ContextPolicy;
pub use table::{SessionRecord, SessionTable};
