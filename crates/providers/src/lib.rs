//! Language-model bindings for the supervisor.
//!
//! The supervisor only depends on the [`LanguageModel`] trait; this crate
//! ships one adapter for OpenAI-compatible chat-completions endpoints.

pub mod assemble;
pub mod openai_compat;
pub(crate) mod sse;
pub mod traits;
pub(crate) mod util;

pub use assemble::ToolCallAssembler;
pub use openai_compat::OpenAiCompatModel;
pub use traits::{ChatRequest, ChatResponse, LanguageModel};
