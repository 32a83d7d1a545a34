use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory holding one persisted history per session.
    #[serde(default = "d_storage_root")]
    pub storage_root: PathBuf,
    /// Session used when no identifier can be extracted, and for
    /// introspection.
    #[serde(default = "d_default_session")]
    pub default_session_id: String,
    /// Whether a protocol task id may select the session when no context
    /// id or directive is present.
    #[serde(default)]
    pub task_id_routing: TaskIdRouting,
    #[serde(default)]
    pub context: ContextPolicyConfig,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            storage_root: d_storage_root(),
            default_session_id: d_default_session(),
            task_id_routing: TaskIdRouting::default(),
            context: ContextPolicyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskIdRouting {
    /// Task ids never select a session.
    #[default]
    Ignore,
    /// Task ids are consulted after context ids and directives.
    Fallback,
}

/// Context-window management for each session's conversation.
///
/// When the active window grows past `max_active_messages`, the oldest
/// `summary_ratio` share of it is folded into a summary, never touching the
/// last `preserve_recent_messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPolicyConfig {
    #[serde(default = "d_ratio")]
    pub summary_ratio: f32,
    #[serde(default = "d_10")]
    pub preserve_recent_messages: usize,
    #[serde(default = "d_40")]
    pub max_active_messages: usize,
}

impl Default for ContextPolicyConfig {
    fn default() -> Self {
        Self {
            summary_ratio: d_ratio(),
            preserve_recent_messages: 10,
            max_active_messages: 40,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_storage_root() -> PathBuf {
    PathBuf::from("sessions")
}
fn d_default_session() -> String {
    "default".into()
}
fn d_ratio() -> f32 {
    0.4
}
fn d_10() -> usize {
    10
}
fn d_40() -> usize {
    40
}
