use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Background poller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const DEFAULT_POLL_INSTRUCTION: &str = "Check for new emails or unread emails in the inbox. \
If there are any new emails, read them, analyze what action is needed, delegate to the \
appropriate worker agent, and send response emails with the results.";

/// Periodic autonomous inbox check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between cycles. `0` disables polling.
    #[serde(default = "d_300")]
    pub interval_secs: u64,
    #[serde(default)]
    pub session_mode: PollerSessionMode,
    /// Session used in `shared` mode.
    #[serde(default = "d_session_id")]
    pub session_id: String,
    /// Prefix for the per-cycle session ids minted in `ephemeral` mode.
    #[serde(default = "d_prefix")]
    pub ephemeral_prefix: String,
    #[serde(default = "d_instruction")]
    pub instruction: String,
    /// Worker tool that must be registered for polling to start. `None`
    /// starts the poller unconditionally.
    #[serde(default = "d_requires_worker")]
    pub requires_worker: Option<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            session_mode: PollerSessionMode::default(),
            session_id: d_session_id(),
            ephemeral_prefix: d_prefix(),
            instruction: d_instruction(),
            requires_worker: d_requires_worker(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PollerSessionMode {
    /// Every cycle reuses one long-lived session.
    #[default]
    Shared,
    /// Every cycle gets a fresh session that is disposed afterwards.
    Ephemeral,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_300() -> u64 {
    300
}
fn d_session_id() -> String {
    "devops-supervisor-autonomous".into()
}
fn d_prefix() -> String {
    "auto".into()
}
fn d_instruction() -> String {
    DEFAULT_POLL_INSTRUCTION.into()
}
fn d_requires_worker() -> Option<String> {
    Some("email_tool".into())
}
