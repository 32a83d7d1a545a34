//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, LiteLLM and any other endpoint
//! that follows the chat-completions contract, including streamed tool calls.

use std::time::{Duration, Instant};

use serde_json::Value;
use sv_domain::config::LlmConfig;
use sv_domain::error::{Error, Result};
use sv_domain::stream::{BoxStream, StreamEvent, Usage};
use sv_domain::tool::{Message, Role, ToolCall, ToolDefinition};
use sv_domain::trace::TraceEvent;

use crate::sse::sse_response_stream;
use crate::traits::{ChatRequest, ChatResponse, LanguageModel};
use crate::util::{api_key_from_env, from_reqwest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatModel {
    id: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        let api_key = api_key_from_env(&cfg.api_key_env);
        if api_key.is_none() {
            tracing::warn!(
                provider = %cfg.provider_id,
                env = %cfg.api_key_env,
                "no API key in environment, sending unauthenticated requests"
            );
        }

        Ok(Self {
            id: cfg.provider_id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            model: cfg.model.clone(),
            api_key,
            client,
        })
    }

    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", self.base_url);
        let builder = self.client.post(url).json(body);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(req.tools.iter().map(tool_to_openai).collect());
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }

    async fn error_from(&self, resp: reqwest::Response) -> Error {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Error::Provider {
            provider: self.id.clone(),
            message: format!("HTTP {status} - {text}"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.content,
        }),
        Role::Assistant if !msg.tool_calls.is_empty() => {
            let calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.call_id,
                        "type": "function",
                        "function": {
                            "name": tc.tool_name,
                            "arguments": tc.arguments.to_string(),
                        }
                    })
                })
                .collect();
            let content = if msg.content.is_empty() {
                Value::Null
            } else {
                Value::String(msg.content.clone())
            };
            serde_json::json!({"role": "assistant", "content": content, "tool_calls": calls})
        }
        role => serde_json::json!({"role": role.as_str(), "content": msg.content}),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(provider: &str, body: &Value) -> Result<ChatResponse> {
    let missing = |what: &str| Error::Provider {
        provider: provider.to_owned(),
        message: format!("no {what} in response"),
    };
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .ok_or_else(|| missing("choices"))?;
    let message = choice.get("message").ok_or_else(|| missing("message"))?;

    Ok(ChatResponse {
        content: message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        tool_calls: parse_tool_calls(message),
        usage: body.get("usage").and_then(parse_usage),
        model: body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_owned(),
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(arr) = message.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|tc| {
            let func = tc.get("function")?;
            let args = func.get("arguments").and_then(Value::as_str).unwrap_or("{}");
            Some(ToolCall {
                call_id: tc.get("id")?.as_str()?.to_owned(),
                tool_name: func.get("name")?.as_str()?.to_owned(),
                arguments: serde_json::from_str(args)
                    .unwrap_or(Value::Object(Default::default())),
            })
        })
        .collect()
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE streaming helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-stream parser state.
///
/// The finish reason and the usage arrive in separate chunks when
/// `include_usage` is on, so `Done` is held back until the usage chunk or
/// the `[DONE]` sentinel, whichever comes first.
#[derive(Debug, Default)]
struct StreamParser {
    finish_reason: Option<String>,
    done: bool,
}

impl StreamParser {
    fn parse(&mut self, data: &str) -> Vec<Result<StreamEvent>> {
        if self.done {
            return Vec::new();
        }
        if data.trim() == "[DONE]" {
            return vec![Ok(self.finish(None))];
        }

        let v: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => return vec![Err(Error::Json(e))],
        };

        if let Some(err) = v.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| err.to_string());
            return vec![Ok(StreamEvent::Error { message })];
        }

        let mut events = Vec::new();
        let choice = v
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|a| a.first());

        if let Some(choice) = choice {
            let delta = choice.get("delta").unwrap_or(&Value::Null);

            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                if !text.is_empty() {
                    events.push(Ok(StreamEvent::Token { text: text.to_owned() }));
                }
            }

            for tc in delta
                .get("tool_calls")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let index = tc.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                let func = tc.get("function");
                if let Some(id) = tc.get("id").and_then(Value::as_str) {
                    let name = func
                        .and_then(|f| f.get("name"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    events.push(Ok(StreamEvent::ToolCallStarted {
                        index,
                        call_id: id.to_owned(),
                        tool_name: name.to_owned(),
                    }));
                }
                if let Some(args) = func
                    .and_then(|f| f.get("arguments"))
                    .and_then(Value::as_str)
                {
                    if !args.is_empty() {
                        events.push(Ok(StreamEvent::ToolCallDelta {
                            index,
                            delta: args.to_owned(),
                        }));
                    }
                }
            }

            if let Some(fr) = choice.get("finish_reason").and_then(Value::as_str) {
                self.finish_reason = Some(fr.to_owned());
            }
        }

        if let Some(usage) = v.get("usage").and_then(parse_usage) {
            events.push(Ok(self.finish(Some(usage))));
        }
        events
    }

    fn finish(&mut self, usage: Option<Usage>) -> StreamEvent {
        self.done = true;
        StreamEvent::Done {
            usage,
            finish_reason: self.finish_reason.take().or_else(|| Some("stop".into())),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LanguageModel for OpenAiCompatModel {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let body = self.build_chat_body(req, false);
        let started = Instant::now();
        tracing::debug!(provider = %self.id, model = %self.model, "chat request");

        let resp = self.post(&body).send().await.map_err(from_reqwest)?;
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }
        let json: Value = resp.json().await.map_err(from_reqwest)?;
        let parsed = parse_chat_response(&self.id, &json)?;

        TraceEvent::ModelRequest {
            provider: self.id.clone(),
            model: parsed.model.clone(),
            streaming: false,
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens),
        }
        .emit();

        Ok(parsed)
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let body = self.build_chat_body(req, true);
        let started = Instant::now();
        tracing::debug!(provider = %self.id, model = %self.model, "stream request");

        let resp = self.post(&body).send().await.map_err(from_reqwest)?;
        if !resp.status().is_success() {
            return Err(self.error_from(resp).await);
        }

        TraceEvent::ModelRequest {
            provider: self.id.clone(),
            model: self.model.clone(),
            streaming: true,
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: None,
            completion_tokens: None,
        }
        .emit();

        let mut parser = StreamParser::default();
        Ok(sse_response_stream(resp, move |data| parser.parse(data)))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
