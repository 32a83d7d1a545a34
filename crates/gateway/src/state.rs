use std::sync::Arc;
use std::time::Instant;

use sv_domain::config::ServerConfig;

use crate::runtime::SessionRouter;

/// Shared state passed to every API handler.
#[derive(Clone)]
pub struct AppState {
    /// The routing façade; handlers never touch the session table directly.
    pub router: Arc<SessionRouter>,
    /// Listener settings, used for the advertised URL and version.
    pub server: Arc<ServerConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(router: Arc<SessionRouter>, server: ServerConfig) -> Self {
        Self {
            router,
            server: Arc::new(server),
            started_at: Instant::now(),
        }
    }
}
