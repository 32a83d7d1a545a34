//! Tool dispatch for the supervisor's turn loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use sv_domain::error::Error;
use sv_domain::tool::ToolDefinition;

use crate::worker::WorkerTool;

/// The set of worker tools offered to the model.
///
/// Tool failures never surface as errors: they are rendered as text so the
/// model can read them and carry on.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn WorkerTool>>,
    by_name: HashMap<String, usize>,
    closed: AtomicBool,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. A later tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn WorkerTool>) {
        let name = tool.definition().name.clone();
        match self.by_name.get(&name) {
            Some(&idx) => self.tools[idx] = tool,
            None => {
                self.by_name.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition().clone()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.definition().name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the named tool with the model-supplied arguments and return the
    /// text the model should see.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> String {
        let Some(tool) = self.by_name.get(name).map(|&i| &self.tools[i]) else {
            tracing::warn!(tool = %name, "model requested an unknown tool");
            return format!("Unknown tool: {name}");
        };
        if self.closed.load(Ordering::Acquire) {
            return format!("{} Error: tool registry is shut down", tool.label());
        }

        let query = query_argument(arguments);
        match tool.call(&query).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "worker tool failed");
                format!("{} Error: {}", tool.label(), failure_text(&e))
            }
        }
    }

    /// Close every tool. Later calls are no-ops.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for tool in &self.tools {
            tool.close().await;
        }
        tracing::info!(tools = self.tools.len(), "worker tools closed");
    }
}

/// Pull the query text out of tool arguments.
///
/// Models usually send `{"query": "..."}`; a bare string is accepted and
/// anything else is passed through as JSON.
fn query_argument(arguments: &Value) -> String {
    match arguments {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("query") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => arguments.to_string(),
        },
        other => other.to_string(),
    }
}

fn failure_text(e: &Error) -> String {
    match e {
        Error::Worker { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use sv_domain::error::Result;

    struct Echo {
        def: ToolDefinition,
        closes: AtomicUsize,
    }

    impl Echo {
        fn new(name: &str) -> Self {
            Self {
                def: ToolDefinition::query_tool(name, "echo"),
                closes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl WorkerTool for Echo {
        fn definition(&self) -> &ToolDefinition {
            &self.def
        }
        async fn call(&self, query: &str) -> Result<String> {
            Ok(format!("echo: {query}"))
        }
        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl WorkerTool for Broken {
        fn definition(&self) -> &ToolDefinition {
            static DEF: std::sync::OnceLock<ToolDefinition> = std::sync::OnceLock::new();
            DEF.get_or_init(|| ToolDefinition::query_tool("aws_cloudwatch_tool", "aws"))
        }
        fn label(&self) -> &str {
            "AWS CloudWatch Agent"
        }
        async fn call(&self, _query: &str) -> Result<String> {
            Err(Error::Worker {
                worker: "aws_cloudwatch_tool".into(),
                message: "connection refused".into(),
            })
        }
    }

    #[tokio::test]
    async fn invoke_passes_query_text() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Echo::new("email_tool")));
        let out = reg
            .invoke("email_tool", &serde_json::json!({"query": "list unread"}))
            .await;
        assert_eq!(out, "echo: list unread");
    }

    #[tokio::test]
    async fn failures_are_rendered_with_label() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Broken));
        let out = reg.invoke("aws_cloudwatch_tool", &serde_json::json!({"query": "x"})).await;
        assert_eq!(out, "AWS CloudWatch Agent Error: connection refused");
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_text() {
        let reg = ToolRegistry::new();
        assert_eq!(reg.invoke("nope", &Value::Null).await, "Unknown tool: nope");
    }

    #[tokio::test]
    async fn shutdown_closes_each_tool_once() {
        let echo = Arc::new(Echo::new("email_tool"));
        let mut reg = ToolRegistry::new();
        reg.register(echo.clone());
        reg.shutdown().await;
        reg.shutdown().await;
        assert_eq!(echo.closes.load(Ordering::SeqCst), 1);
        assert!(reg.invoke("email_tool", &Value::Null).await.contains("shut down"));
    }

    #[test]
    fn register_replaces_same_name() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Echo::new("email_tool")));
        reg.register(Arc::new(Echo::new("email_tool")));
        assert_eq!(reg.len(), 1);
        assert!(reg.has("email_tool"));
    }

    #[test]
    fn query_argument_shapes() {
        assert_eq!(query_argument(&serde_json::json!("raw")), "raw");
        assert_eq!(query_argument(&serde_json::json!({"query": 5})), "5");
        assert_eq!(query_argument(&serde_json::json!({"q": "x"})), r#"{"q":"x"}"#);
    }
}
