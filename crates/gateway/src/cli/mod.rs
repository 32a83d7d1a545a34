pub mod config;
pub mod run;
pub mod sessions;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sv_domain::config::Config;

/// DevOps supervisor: routes agent-to-agent traffic to per-session agents.
#[derive(Debug, Parser)]
#[command(name = "supervisor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the server (default when no subcommand is given).
    Serve,
    /// Send a single message through the session router and print the reply.
    Run {
        /// The message to send. May carry a `session_id: <id>` directive.
        message: String,
        /// Session to use; overrides any directive in the message.
        #[arg(long)]
        session: Option<String>,
        /// Print the reply as JSON instead of streaming text.
        #[arg(long)]
        json: bool,
    },
    /// List session ids persisted under the storage root.
    Sessions,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (defaults and environment applied) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from `SV_CONFIG` (default `config.toml`), falling
/// back to defaults when the file is absent, then apply environment
/// overrides. Returns the config and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("SV_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let mut config: Config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {config_path}"))?;
        toml::from_str(&raw).with_context(|| format!("parsing {config_path}"))?
    } else {
        Config::default()
    };

    let applied = config
        .apply_env_overrides()
        .context("applying environment overrides")?;
    if !applied.is_empty() {
        tracing::debug!(vars = ?applied, "environment overrides applied");
    }

    Ok((config, config_path))
}
