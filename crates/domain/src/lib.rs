//! Shared types for the supervisor workspace.
//!
//! Everything that crosses a crate boundary lives here: the error type,
//! configuration, inbound message shapes, chat/tool primitives and the
//! streaming chunk types.

pub mod config;
pub mod error;
pub mod message;
pub mod stream;
pub mod tool;
pub mod trace;
