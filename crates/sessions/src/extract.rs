//! Session identifier extraction.
//!
//! An identifier can arrive out of band (a transport hint), as a structured
//! field, or as a `session_id: <token>` directive embedded in message text.
//! Each message shape is inspected by its own rule and the rules are tried
//! in a fixed order; the first hit wins. Extraction never fails: anything
//! without an identifier is routed to the default session.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use sv_domain::config::TaskIdRouting;
use sv_domain::message::{CallHints, InboundMessage, Part};

/// `session_id`, one or more `:`/whitespace, then the token. Group 0 also
/// swallows trailing whitespace so the cleaned text starts at the payload.
static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)session_id[:\s]+([A-Za-z0-9_-]+)\s*").expect("directive pattern is valid")
});

const CONTEXT_KEYS: [&str; 2] = ["contextId", "context_id"];
const SESSION_KEYS: [&str; 2] = ["session_id", "sessionId"];
const TASK_KEYS: [&str; 2] = ["taskId", "task_id"];

/// Which rule produced the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    /// Transport-level context id passed alongside the message.
    Hint,
    /// `session_id:` directive found in message text (and removed).
    Directive,
    /// `contextId`/`context_id` field of the message.
    ContextId,
    /// `session_id`/`sessionId` field of a mapping.
    SessionKey,
    /// Protocol task id, only when task-id routing is enabled.
    TaskId,
    /// Directive found in the rendered message (text left untouched).
    Rendered,
    /// Nothing found.
    Default,
}

impl IdSource {
    pub fn as_str(self) -> &'static str {
        match self {
            IdSource::Hint => "hint",
            IdSource::Directive => "directive",
            IdSource::ContextId => "context_id",
            IdSource::SessionKey => "session_key",
            IdSource::TaskId => "task_id",
            IdSource::Rendered => "rendered",
            IdSource::Default => "default",
        }
    }
}

/// Result of [`SessionIdExtractor::extract`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub session_id: String,
    /// The message to forward, with a consumed directive removed.
    pub message: InboundMessage,
    pub source: IdSource,
}

impl Extraction {
    fn new(session_id: impl Into<String>, message: InboundMessage, source: IdSource) -> Self {
        Self {
            session_id: session_id.into(),
            message,
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionIdExtractor {
    default_id: String,
    task_ids: TaskIdRouting,
}

impl SessionIdExtractor {
    pub fn new(default_id: impl Into<String>) -> Self {
        Self {
            default_id: default_id.into(),
            task_ids: TaskIdRouting::Ignore,
        }
    }

    pub fn with_task_id_routing(mut self, routing: TaskIdRouting) -> Self {
        self.task_ids = routing;
        self
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Resolve the session for `message`.
    ///
    /// Order: hint, then the shape-specific rule (directive in text; context
    /// id, session key, then parts for mappings; context id, then parts for
    /// protocol objects; blocks), then the optional task id, then a directive
    /// search over the rendered message, then the default.
    pub fn extract(&self, message: InboundMessage, hints: &CallHints) -> Extraction {
        if let Some(id) = non_empty(hints.context_id.as_deref()) {
            return Extraction::new(id, message, IdSource::Hint);
        }

        match message {
            InboundMessage::Text(mut text) => match strip_directive(&mut text) {
                Some(id) => Extraction::new(id, InboundMessage::Text(text), IdSource::Directive),
                None => self.fallback(InboundMessage::Text(text), hints),
            },
            InboundMessage::Mapping(mut map) => {
                if let Some(id) = first_scalar(&map, &CONTEXT_KEYS) {
                    return Extraction::new(id, InboundMessage::Mapping(map), IdSource::ContextId);
                }
                if let Some(id) = first_scalar(&map, &SESSION_KEYS) {
                    return Extraction::new(id, InboundMessage::Mapping(map), IdSource::SessionKey);
                }
                if let Some(Value::Array(parts)) = map.get_mut("parts") {
                    if let Some(id) = strip_from_values(parts) {
                        return Extraction::new(
                            id,
                            InboundMessage::Mapping(map),
                            IdSource::Directive,
                        );
                    }
                }
                self.fallback(InboundMessage::Mapping(map), hints)
            }
            InboundMessage::Object(mut msg) => {
                if let Some(id) = non_empty(msg.context_id.as_deref()).map(str::to_owned) {
                    return Extraction::new(id, InboundMessage::Object(msg), IdSource::ContextId);
                }
                match strip_from_parts(&mut msg.parts) {
                    Some(id) => {
                        Extraction::new(id, InboundMessage::Object(msg), IdSource::Directive)
                    }
                    None => self.fallback(InboundMessage::Object(msg), hints),
                }
            }
            InboundMessage::Blocks(mut parts) => match strip_from_parts(&mut parts) {
                Some(id) => Extraction::new(id, InboundMessage::Blocks(parts), IdSource::Directive),
                None => self.fallback(InboundMessage::Blocks(parts), hints),
            },
        }
    }

    fn fallback(&self, message: InboundMessage, hints: &CallHints) -> Extraction {
        if self.task_ids == TaskIdRouting::Fallback {
            let task_id = task_id_of(&message)
                .or_else(|| non_empty(hints.task_id.as_deref()).map(str::to_owned));
            if let Some(id) = task_id {
                return Extraction::new(id, message, IdSource::TaskId);
            }
        }

        let rendered = message.to_string();
        let found = DIRECTIVE
            .captures(&rendered)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned());
        if let Some(id) = found {
            return Extraction::new(id, message, IdSource::Rendered);
        }

        tracing::debug!(
            default_session = %self.default_id,
            "no session identifier in message, using default session"
        );
        Extraction::new(self.default_id.clone(), message, IdSource::Default)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// Remove the first directive from `text`, returning its token.
fn strip_directive(text: &mut String) -> Option<String> {
    let (id, span) = {
        let caps = DIRECTIVE.captures(text)?;
        (caps.get(1)?.as_str().to_owned(), caps.get(0)?.range())
    };
    text.replace_range(span, "");
    Some(id)
}

fn strip_from_parts(parts: &mut [Part]) -> Option<String> {
    parts
        .iter_mut()
        .filter_map(Part::text_mut)
        .find_map(strip_directive)
}

fn strip_from_values(parts: &mut [Value]) -> Option<String> {
    parts
        .iter_mut()
        .filter_map(value_text_mut)
        .find_map(strip_directive)
}

/// `text` of a JSON part, looking through one or more `root` wrappers.
fn value_text_mut(value: &mut Value) -> Option<&mut String> {
    let map = value.as_object_mut()?;
    if map.get("text").is_some_and(Value::is_string) {
        return match map.get_mut("text") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
    }
    value_text_mut(map.get_mut("root")?)
}

/// First key holding a usable identifier: a non-blank string or a number.
fn first_scalar(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn task_id_of(message: &InboundMessage) -> Option<String> {
    match message {
        InboundMessage::Object(msg) => non_empty(msg.task_id.as_deref()).map(str::to_owned),
        InboundMessage::Mapping(map) => first_scalar(map, &TASK_KEYS),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
