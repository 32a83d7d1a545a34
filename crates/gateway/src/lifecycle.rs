//! Server lifecycle: ordered startup and shutdown.
//!
//! Startup: router over the session table, default session, transport,
//! then the poller. A transport failure aborts before the poller exists.
//! Shutdown runs in reverse: poller, transport, worker resources.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sv_domain::config::Config;
use sv_sessions::SessionTable;
use sv_tools::ToolRegistry;

use crate::runtime::{BackgroundPoller, SessionRouter};
use crate::transport::TransportListener;

struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct ServerLifecycle {
    router: Arc<SessionRouter>,
    transport: Box<dyn TransportListener>,
    tools: Arc<ToolRegistry>,
    poller: Option<PollerHandle>,
    local_addr: SocketAddr,
}

impl ServerLifecycle {
    /// Bring the service up.
    ///
    /// `make_transport` receives the router so the listener can serve it.
    pub async fn start<F>(
        config: &Config,
        table: Arc<SessionTable>,
        tools: Arc<ToolRegistry>,
        make_transport: F,
    ) -> anyhow::Result<Self>
    where
        F: FnOnce(Arc<SessionRouter>) -> Box<dyn TransportListener>,
    {
        let router = Arc::new(SessionRouter::from_config(table.clone(), &config.sessions));

        // The default session backs introspection, so it exists before any
        // request can arrive.
        router
            .default_agent()
            .context("creating default session")?;

        let mut transport = make_transport(router.clone());
        let local_addr = match transport.start().await {
            Ok(addr) => addr,
            Err(e) => {
                tools.shutdown().await;
                return Err(e.context("starting transport"));
            }
        };
        log_endpoints(config, local_addr);

        let poller = match BackgroundPoller::disabled_reason(&config.poller, &tools) {
            Some(reason) => {
                tracing::info!(%reason, "email polling disabled");
                None
            }
            None => {
                let cancel = CancellationToken::new();
                let task = BackgroundPoller::new(table, config.poller.clone()).spawn(cancel.clone());
                Some(PollerHandle { cancel, task })
            }
        };

        Ok(Self {
            router,
            transport,
            tools,
            poller,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn router(&self) -> &Arc<SessionRouter> {
        &self.router
    }

    pub fn poller_running(&self) -> bool {
        self.poller.is_some()
    }

    /// Stop everything in reverse start order.
    pub async fn shutdown(mut self) {
        if let Some(PollerHandle { cancel, task }) = self.poller.take() {
            tracing::info!("stopping poller");
            cancel.cancel();
            if let Err(e) = task.await {
                tracing::error!(error = %e, "poller task ended abnormally");
            }
        }

        tracing::info!("stopping transport");
        self.transport.stop().await;

        self.tools.shutdown().await;
        tracing::info!(
            sessions = self.router.table().count(),
            "shutdown complete"
        );
    }
}

fn log_endpoints(config: &Config, local_addr: SocketAddr) {
    let base = config.server.advertised_url();
    tracing::info!(
        addr = %local_addr,
        version = %config.server.protocol_version,
        agent_card = %format!("{base}/.well-known/agent.json"),
        card = %format!("{base}/card"),
        send_message = %format!("{base}/send-message"),
        send_streaming_message = %format!("{base}/send-streaming-message"),
        "agent-to-agent server ready"
    );
}
