/// Shared error type used across all supervisor crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("worker {worker}: {message}")]
    Worker { worker: String, message: String },

    #[error("session {session_id}: construction failed: {message}")]
    SessionConstruction { session_id: String, message: String },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("agent: {0}")]
    Agent(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
