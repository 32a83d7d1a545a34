//! Listener for the agent-to-agent HTTP surface.
//!
//! The listener runs on its own named OS thread with its own tokio runtime,
//! so a slow request can never starve the poller or the shutdown path on the
//! main runtime. `start` returns only after the socket is bound (or failed to
//! bind).

use std::net::SocketAddr;
use std::thread::JoinHandle;

use anyhow::Context;
use tokio::sync::oneshot;

/// A listener the lifecycle manager can start and stop.
#[async_trait::async_trait]
pub trait TransportListener: Send {
    /// Bind and begin serving. Returns the bound address.
    async fn start(&mut self) -> anyhow::Result<SocketAddr>;

    /// Stop accepting connections and wait for in-flight requests.
    async fn stop(&mut self);
}

struct Running {
    stop_tx: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

pub struct HttpTransport {
    bind_addr: String,
    app: Option<axum::Router>,
    running: Option<Running>,
}

impl HttpTransport {
    pub const THREAD_NAME: &'static str = "a2a-server";

    pub fn new(bind_addr: impl Into<String>, app: axum::Router) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            app: Some(app),
            running: None,
        }
    }
}

#[async_trait::async_trait]
impl TransportListener for HttpTransport {
    async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let app = self.app.take().context("transport already started")?;
        let (ready_tx, ready_rx) = oneshot::channel::<std::io::Result<SocketAddr>>();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let addr = self.bind_addr.clone();

        let thread = std::thread::Builder::new()
            .name(Self::THREAD_NAME.into())
            .spawn(move || serve_on_thread(addr, app, ready_tx, stop_rx))
            .context("spawning transport thread")?;

        let bound = match ready_rx.await {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e).with_context(|| format!("binding {}", self.bind_addr));
            }
            Err(_) => {
                let _ = thread.join();
                anyhow::bail!("transport thread exited before binding {}", self.bind_addr);
            }
        };

        self.running = Some(Running { stop_tx, thread });
        tracing::info!(addr = %bound, "transport listening");
        Ok(bound)
    }

    async fn stop(&mut self) {
        let Some(Running { stop_tx, thread }) = self.running.take() else {
            return;
        };
        let _ = stop_tx.send(());
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => tracing::info!("transport stopped"),
            Ok(Err(_)) => tracing::error!("transport thread panicked"),
            Err(e) => tracing::error!(error = %e, "failed to join transport thread"),
        }
    }
}

fn serve_on_thread(
    addr: String,
    app: axum::Router,
    ready_tx: oneshot::Sender<std::io::Result<SocketAddr>>,
    stop_rx: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("a2a-worker")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        match listener.local_addr() {
            Ok(bound) => {
                let _ = ready_tx.send(Ok(bound));
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        }

        let shutdown = async {
            let _ = stop_rx.await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "transport server error");
        }
    });
}
