//! Worker tools for the supervisor.
//!
//! Each remote worker agent is wrapped as a `(query) -> text` tool:
//! - [`RemoteAgentWorker`] speaks JSON-RPC `message/send` to the worker
//! - [`ToolRegistry`] dispatches model tool calls and owns worker shutdown

pub mod registry;
pub mod remote;
pub mod worker;

pub use registry::ToolRegistry;
pub use remote::RemoteAgentWorker;
pub use worker::WorkerTool;
