//! Runtime construction shared by `serve` and the one-shot CLI commands.

use std::sync::Arc;

use anyhow::Context;

use sv_domain::config::{Config, ConfigSeverity};
use sv_providers::{LanguageModel, OpenAiCompatModel};
use sv_sessions::{ContextPolicy, JsonlHistoryFactory, SessionTable};
use sv_tools::{RemoteAgentWorker, ToolRegistry};

use crate::runtime::{SupervisorFactory, TurnSettings};

/// Everything needed to build sessions, without any listener.
pub struct Runtime {
    pub config: Arc<Config>,
    pub model: Arc<dyn LanguageModel>,
    pub tools: Arc<ToolRegistry>,
    pub table: Arc<SessionTable>,
}

/// Log every config issue and fail on errors.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// One [`RemoteAgentWorker`] per configured worker.
pub fn build_tools(config: &Config) -> anyhow::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for worker in &config.workers {
        let tool = RemoteAgentWorker::from_config(worker)
            .with_context(|| format!("building worker {}", worker.name))?;
        tracing::info!(tool = %worker.name, url = %worker.url, "worker registered");
        registry.register(Arc::new(tool));
    }
    if registry.is_empty() {
        tracing::warn!("no worker agents configured, supervisor will answer without tools");
    }
    Ok(registry)
}

/// Validate the config and wire model, workers and the session table.
pub fn build_runtime(config: Arc<Config>) -> anyhow::Result<Runtime> {
    check_config(&config)?;

    let model: Arc<dyn LanguageModel> = Arc::new(
        OpenAiCompatModel::from_config(&config.llm).context("building language model")?,
    );
    tracing::info!(
        provider = %model.provider_id(),
        model = %model.model_id(),
        base_url = %config.llm.base_url,
        "language model ready"
    );

    let tools = Arc::new(build_tools(&config)?);
    let agents = SupervisorFactory::new(
        &config.supervisor,
        TurnSettings::from_config(&config.supervisor, &config.llm),
        model.clone(),
        tools.clone(),
    );

    let table = Arc::new(SessionTable::new(
        config.sessions.storage_root.clone(),
        ContextPolicy::from(&config.sessions.context),
        Arc::new(JsonlHistoryFactory),
        Arc::new(agents),
    ));
    tracing::info!(
        storage_root = %config.sessions.storage_root.display(),
        "session table ready"
    );

    Ok(Runtime {
        config,
        model,
        tools,
        table,
    })
}
