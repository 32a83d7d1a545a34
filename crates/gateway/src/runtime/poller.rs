//! Background poller: periodically asks the supervisor to work the inbox.
//!
//! Each cycle sleeps for the configured interval, then sends the poll
//! instruction to the autonomous session. Failures are logged and the loop
//! goes on. Cancellation is observed while sleeping and while a cycle is in
//! flight; once cancelled, no further cycle starts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sv_domain::config::{PollerConfig, PollerSessionMode};
use sv_domain::error::Result;
use sv_domain::message::InboundMessage;
use sv_domain::trace::TraceEvent;
use sv_sessions::SessionTable;
use sv_tools::ToolRegistry;

pub struct BackgroundPoller {
    table: Arc<SessionTable>,
    config: PollerConfig,
}

impl BackgroundPoller {
    pub fn new(table: Arc<SessionTable>, config: PollerConfig) -> Self {
        Self { table, config }
    }

    /// Why polling should not start with this configuration, if anything.
    pub fn disabled_reason(config: &PollerConfig, tools: &ToolRegistry) -> Option<String> {
        if config.interval_secs == 0 {
            return Some("poll interval is 0".into());
        }
        match &config.requires_worker {
            Some(worker) if !tools.has(worker) => {
                Some(format!("required worker {worker:?} is not registered"))
            }
            _ => None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            mode = ?self.config.session_mode,
            session_id = %self.config.session_id,
            "poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval()) => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.run_cycle() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "poll cycle failed");
                    }
                }
            }
        }

        tracing::info!("poller stopped");
    }

    /// Run one cycle in the session the configured mode selects.
    pub async fn run_cycle(&self) -> Result<()> {
        match self.config.session_mode {
            PollerSessionMode::Shared => {
                let id = self.config.session_id.clone();
                self.run_cycle_in(&id, false).await
            }
            PollerSessionMode::Ephemeral => {
                let id = self.ephemeral_id();
                self.run_cycle_in(&id, true).await
            }
        }
    }

    /// Send the poll instruction to `session_id`.
    ///
    /// An ephemeral session is disposed when this returns or is dropped,
    /// whether the cycle succeeded or not.
    pub async fn run_cycle_in(&self, session_id: &str, ephemeral: bool) -> Result<()> {
        let started = Instant::now();
        let _guard = ephemeral.then(|| EphemeralGuard {
            table: self.table.clone(),
            session_id: session_id.to_owned(),
        });

        tracing::debug!(session_id, ephemeral, "poll cycle");
        let result = async {
            let record = self.table.get_or_create(session_id)?;
            record
                .agent
                .respond(InboundMessage::from(self.config.instruction.as_str()))
                .await
        }
        .await;

        TraceEvent::PollCycle {
            session_id: session_id.to_owned(),
            ephemeral,
            duration_ms: started.elapsed().as_millis() as u64,
            ok: result.is_ok(),
        }
        .emit();

        let reply = result?;
        tracing::debug!(
            session_id,
            tools_used = ?reply.tools_used,
            chars = reply.content.len(),
            "poll cycle completed"
        );
        Ok(())
    }

    fn ephemeral_id(&self) -> String {
        format!(
            "{}-{}",
            self.config.ephemeral_prefix,
            chrono::Utc::now().timestamp_millis()
        )
    }
}

/// Disposes an ephemeral session when the cycle ends.
struct EphemeralGuard {
    table: Arc<SessionTable>,
    session_id: String,
}

impl Drop for EphemeralGuard {
    fn drop(&mut self) {
        if let Err(e) = self.table.dispose(&self.session_id) {
            tracing::warn!(
                session_id = %self.session_id,
                error = %e,
                "failed to dispose ephemeral session"
            );
        }
    }
}
