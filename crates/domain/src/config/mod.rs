mod agents;
mod llm;
mod observability;
mod poller;
mod server;
mod sessions;

pub use agents::*;
pub use llm::*;
pub use observability::*;
pub use poller::*;
pub use server::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Remote worker agents exposed to the supervisor as tools.
    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Apply overrides from the process environment.
    ///
    /// Returns the names of the variables that were applied.
    pub fn apply_env_overrides(&mut self) -> Result<Vec<&'static str>> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<Vec<&'static str>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut applied = Vec::new();

        if let Some(v) = get("A2A_HOST") {
            self.server.host = v;
            applied.push("A2A_HOST");
        }
        if let Some(v) = get("A2A_PORT") {
            self.server.port = parse_env("A2A_PORT", &v)?;
            applied.push("A2A_PORT");
        }
        if let Some(v) = get("A2A_VERSION") {
            self.server.protocol_version = v;
            applied.push("A2A_VERSION");
        }
        if let Some(v) = get("A2A_HTTP_URL") {
            self.server.public_url = Some(v);
            applied.push("A2A_HTTP_URL");
        }
        if let Some(v) = get("SESSION_DIR") {
            self.sessions.storage_root = PathBuf::from(v);
            applied.push("SESSION_DIR");
        }
        if let Some(v) = get("EMAIL_POLL_INTERVAL") {
            // Negative intervals disable polling, same as zero.
            let secs: i64 = parse_env("EMAIL_POLL_INTERVAL", &v)?;
            self.poller.interval_secs = u64::try_from(secs).unwrap_or(0);
            applied.push("EMAIL_POLL_INTERVAL");
        }
        if let Some(v) = get("AUTONOMOUS_SESSION_ID") {
            self.poller.session_id = v;
            applied.push("AUTONOMOUS_SESSION_ID");
        }
        if let Some(v) = get("AWS_WORKER_URL") {
            self.upsert_worker(WorkerConfig::aws_cloudwatch(v));
            applied.push("AWS_WORKER_URL");
        }
        if let Some(v) = get("EMAIL_WORKER_URL") {
            self.upsert_worker(WorkerConfig::email(v));
            applied.push("EMAIL_WORKER_URL");
        }
        if let Some(v) = get("LLM_BASE_URL") {
            self.llm.base_url = v;
            applied.push("LLM_BASE_URL");
        }
        if let Some(v) = get("LLM_MODEL") {
            self.llm.model = v;
            applied.push("LLM_MODEL");
        }

        Ok(applied)
    }

    /// Replace the URL of an existing worker with the same name, or add the
    /// worker.
    fn upsert_worker(&mut self, worker: WorkerConfig) {
        match self.workers.iter_mut().find(|w| w.name == worker.name) {
            Some(existing) => existing.url = worker.url,
            None => self.workers.push(worker),
        }
    }

    pub fn worker(&self, name: &str) -> Option<&WorkerConfig> {
        self.workers.iter().find(|w| w.name == name)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |severity, field: &str, message: String| {
            errors.push(ConfigError {
                severity,
                field: field.into(),
                message,
            })
        };

        if self.server.port == 0 {
            push(ConfigSeverity::Error, "server.port", "port must be greater than 0".into());
        }
        if self.server.host.is_empty() {
            push(ConfigSeverity::Error, "server.host", "host must not be empty".into());
        }
        if self.sessions.default_session_id.trim().is_empty() {
            push(
                ConfigSeverity::Error,
                "sessions.default_session_id",
                "default session id must not be empty".into(),
            );
        }

        let ctx = &self.sessions.context;
        if !(ctx.summary_ratio > 0.0 && ctx.summary_ratio < 1.0) {
            push(
                ConfigSeverity::Error,
                "sessions.context.summary_ratio",
                format!("must be in (0, 1), got {}", ctx.summary_ratio),
            );
        }
        if ctx.max_active_messages <= ctx.preserve_recent_messages {
            push(
                ConfigSeverity::Error,
                "sessions.context.max_active_messages",
                format!(
                    "must exceed preserve_recent_messages ({})",
                    ctx.preserve_recent_messages
                ),
            );
        }

        if self.poller.interval_secs > 0 && self.poller.instruction.trim().is_empty() {
            push(
                ConfigSeverity::Error,
                "poller.instruction",
                "instruction must not be empty while polling is enabled".into(),
            );
        }
        if let Some(required) = &self.poller.requires_worker {
            if self.poller.interval_secs > 0 && self.worker(required).is_none() {
                push(
                    ConfigSeverity::Warning,
                    "poller.requires_worker",
                    format!("worker {required:?} is not configured; polling will stay off"),
                );
            }
        }

        if self.llm.base_url.is_empty() {
            push(ConfigSeverity::Error, "llm.base_url", "base_url must not be empty".into());
        }
        if self.llm.model.is_empty() {
            push(ConfigSeverity::Error, "llm.model", "model must not be empty".into());
        }

        if self.workers.is_empty() {
            push(
                ConfigSeverity::Warning,
                "workers",
                "no worker agents configured; the supervisor can only answer directly".into(),
            );
        }
        for (i, worker) in self.workers.iter().enumerate() {
            if worker.name.is_empty() {
                push(
                    ConfigSeverity::Error,
                    &format!("workers[{i}].name"),
                    "worker name must not be empty".into(),
                );
            }
            if worker.url.is_empty() {
                push(
                    ConfigSeverity::Error,
                    &format!("workers[{i}].url"),
                    "worker url must not be empty".into(),
                );
            }
            if self.workers[..i].iter().any(|w| w.name == worker.name) {
                push(
                    ConfigSeverity::Error,
                    &format!("workers[{i}].name"),
                    format!("duplicate worker name {:?}", worker.name),
                );
            }
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            push(
                ConfigSeverity::Warning,
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)".into(),
            );
        }

        errors
    }
}
