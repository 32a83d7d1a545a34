//! DevOps supervisor service.
//!
//! Wires the session router, the background poller and the agent-to-agent
//! HTTP surface around per-session supervisor agents.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod lifecycle;
pub mod runtime;
pub mod state;
pub mod transport;
