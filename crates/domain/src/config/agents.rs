use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Supervisor agent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const DEFAULT_SUPERVISOR_DESCRIPTION: &str = "DevOps Supervisor Agent that coordinates \
specialized agents for infrastructure monitoring and management.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "d_name")]
    pub name: String,
    #[serde(default = "d_description")]
    pub description: String,
    /// Replaces the built-in system prompt when set.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Upper bound on model round trips per turn.
    #[serde(default = "d_8")]
    pub max_tool_loops: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            name: d_name(),
            description: d_description(),
            system_prompt: None,
            max_tool_loops: 8,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Worker agents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const AWS_WORKER_NAME: &str = "aws_cloudwatch_tool";
pub const EMAIL_WORKER_NAME: &str = "email_tool";

/// A remote worker agent reachable over the agent-to-agent protocol and
/// exposed to the supervisor as a `(query) -> text` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Tool name presented to the model.
    pub name: String,
    pub description: String,
    /// JSON-RPC endpoint of the worker agent.
    pub url: String,
    /// Label used when rendering a failure back to the model, e.g.
    /// `"AWS CloudWatch Agent"`. Defaults to the tool name.
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "d_200")]
    pub timeout_secs: u64,
}

impl WorkerConfig {
    pub fn aws_cloudwatch(url: impl Into<String>) -> Self {
        Self {
            name: AWS_WORKER_NAME.into(),
            description: "Handle AWS CloudWatch-related queries: alarms, metrics, log groups \
                          and log insights."
                .into(),
            url: url.into(),
            display_name: Some("AWS CloudWatch Agent".into()),
            timeout_secs: d_200(),
        }
    }

    pub fn email(url: impl Into<String>) -> Self {
        Self {
            name: EMAIL_WORKER_NAME.into(),
            description: "Read, search and send email. Describe the mailbox operation in plain \
                          language, including message ids, recipients, subject and body when \
                          sending."
                .into(),
            url: url.into(),
            display_name: Some("Email Agent".into()),
            timeout_secs: d_200(),
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_name() -> String {
    "DevOps Supervisor".into()
}
fn d_description() -> String {
    DEFAULT_SUPERVISOR_DESCRIPTION.into()
}
fn d_8() -> usize {
    8
}
fn d_200() -> u64 {
    200
}
