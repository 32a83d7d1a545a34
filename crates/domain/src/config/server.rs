use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Agent-to-agent listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_9000")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    /// Protocol version advertised in the agent card.
    #[serde(default = "d_protocol_version")]
    pub protocol_version: String,
    /// Public URL advertised in the agent card. Derived from host/port
    /// when unset.
    #[serde(default)]
    pub public_url: Option<String>,
    /// Maximum number of requests handled concurrently by the listener.
    #[serde(default = "d_64")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            host: "127.0.0.1".into(),
            protocol_version: d_protocol_version(),
            public_url: None,
            max_concurrent_requests: 64,
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn advertised_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (NOT recommended).
    /// Defaults to localhost-only.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_9000() -> u16 {
    9000
}
fn d_64() -> usize {
    64
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_protocol_version() -> String {
    "1.0.0".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertised_url_falls_back_to_bind_address() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.advertised_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn advertised_url_strips_trailing_slash() {
        let toml_str = r#"
            public_url = "https://agents.example.com/supervisor/"
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.advertised_url(), "https://agents.example.com/supervisor");
        assert_eq!(cfg.port, 9000);
    }
}
