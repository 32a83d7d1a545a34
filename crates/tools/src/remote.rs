//! A worker agent reached over JSON-RPC `message/send`.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use sv_domain::config::WorkerConfig;
use sv_domain::error::{Error, Result};
use sv_domain::tool::ToolDefinition;
use sv_domain::trace::TraceEvent;

use crate::worker::WorkerTool;

pub struct RemoteAgentWorker {
    definition: ToolDefinition,
    label: String,
    url: String,
    client: reqwest::Client,
}

impl RemoteAgentWorker {
    pub fn from_config(cfg: &WorkerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Worker {
                worker: cfg.name.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            definition: ToolDefinition::query_tool(&cfg.name, &cfg.description),
            label: cfg.label().to_owned(),
            url: cfg.url.clone(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::Worker {
            worker: self.definition.name.clone(),
            message: message.into(),
        }
    }

    async fn send(&self, query: &str) -> Result<String> {
        let body = request_body(query);
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.err(format!("timed out: {e}"))
                } else {
                    self.err(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(self.err(format!("HTTP {} - {}", status.as_u16(), text)));
        }
        let json: Value = resp.json().await.map_err(|e| self.err(e.to_string()))?;

        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| error.to_string());
            return Err(self.err(message));
        }
        let result = json
            .get("result")
            .ok_or_else(|| self.err("response has neither result nor error"))?;
        Ok(result_text(result))
    }
}

#[async_trait::async_trait]
impl WorkerTool for RemoteAgentWorker {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn label(&self) -> &str {
        &self.label
    }

    async fn call(&self, query: &str) -> Result<String> {
        let started = Instant::now();
        tracing::debug!(worker = %self.definition.name, url = %self.url, "worker call");
        let out = self.send(query).await;
        TraceEvent::WorkerCall {
            worker: self.definition.name.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            ok: out.is_ok(),
        }
        .emit();
        out
    }
}

// ── wire helpers ────────────────────────────────────────────────────

fn request_body(query: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": uuid::Uuid::new_v4().to_string(),
        "method": "message/send",
        "params": {
            "message": {
                "kind": "message",
                "role": "user",
                "messageId": uuid::Uuid::new_v4().to_string(),
                "parts": [{"kind": "text", "text": query}],
            }
        }
    })
}

/// Text of a `message/send` result.
///
/// The result is either a message (`parts`) or a task, whose answer lives in
/// its artifacts or in its status message.
fn result_text(result: &Value) -> String {
    if let Some(text) = parts_text(result.get("parts")) {
        return text;
    }
    let artifacts: Vec<String> = result
        .get("artifacts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|a| parts_text(a.get("parts")))
        .collect();
    if !artifacts.is_empty() {
        return artifacts.join("\n");
    }
    if let Some(text) = parts_text(result.pointer("/status/message/parts")) {
        return text;
    }
    match result {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parts_text(parts: Option<&Value>) -> Option<String> {
    let texts: Vec<&str> = parts?
        .as_array()?
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_query_as_text_part() {
        let body = request_body("show alarms");
        assert_eq!(body["method"], "message/send");
        assert_eq!(body["params"]["message"]["role"], "user");
        assert_eq!(body["params"]["message"]["parts"][0]["text"], "show alarms");
    }

    #[test]
    fn message_result_joins_text_parts() {
        let r = json!({"kind": "message", "parts": [
            {"kind": "text", "text": "a"}, {"kind": "data", "data": {}}, {"kind": "text", "text": "b"}
        ]});
        assert_eq!(result_text(&r), "a\nb");
    }

    #[test]
    fn task_result_prefers_artifacts_then_status() {
        let with_artifacts = json!({
            "kind": "task",
            "artifacts": [{"parts": [{"kind": "text", "text": "3 alarms"}]}],
            "status": {"message": {"parts": [{"kind": "text", "text": "done"}]}}
        });
        assert_eq!(result_text(&with_artifacts), "3 alarms");

        let status_only = json!({
            "kind": "task",
            "status": {"state": "completed", "message": {"parts": [{"kind": "text", "text": "sent"}]}}
        });
        assert_eq!(result_text(&status_only), "sent");
    }

    #[test]
    fn unknown_result_shape_is_rendered_as_json() {
        assert_eq!(result_text(&json!({"x": 1})), r#"{"x":1}"#);
        assert_eq!(result_text(&json!("plain")), "plain");
    }
}
