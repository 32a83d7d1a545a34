//! Inbound message shapes accepted by the routing layer.
//!
//! The wire layer hands over whatever the client sent: a bare string, a
//! loose JSON mapping, a typed protocol message with nested parts, or a bare
//! list of content blocks. [`InboundMessage`] keeps those shapes apart so the
//! session extractor can inspect each one explicitly.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One content part of a message.
///
/// Deserialization never fails: anything that is not a text part or a
/// `root` wrapper is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Part {
    /// `{"kind": "text", "text": "..."}`
    Text(TextPart),
    /// `{"root": <part>}` indirection used by some protocol SDKs.
    Root(Box<Part>),
    /// Any other object (file, data, ...).
    Mapping(Map<String, Value>),
    /// Non-object values.
    Other(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextPart {
    pub kind: Option<String>,
    pub text: String,
    pub metadata: Option<Value>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(TextPart {
            kind: Some("text".into()),
            text: text.into(),
            metadata: None,
        })
    }

    /// The text carried by this part, looking through `root` wrappers and
    /// loose mappings with a string `text` key.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(p) => Some(p.text.as_str()),
            Part::Root(inner) => inner.as_text(),
            Part::Mapping(map) => map.get("text").and_then(Value::as_str),
            Part::Other(_) => None,
        }
    }

    /// Mutable access to the same text [`Part::as_text`] returns.
    pub fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            Part::Text(p) => Some(&mut p.text),
            Part::Root(inner) => inner.text_mut(),
            Part::Mapping(map) => match map.get_mut("text") {
                Some(Value::String(s)) => Some(s),
                _ => None,
            },
            Part::Other(_) => None,
        }
    }
}

impl From<Value> for Part {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut map) => {
                if matches!(map.get("text"), Some(Value::String(_))) {
                    let text = match map.remove("text") {
                        Some(Value::String(s)) => s,
                        _ => String::new(),
                    };
                    let kind = map
                        .get("kind")
                        .or_else(|| map.get("type"))
                        .and_then(Value::as_str)
                        .map(str::to_owned);
                    return Part::Text(TextPart {
                        kind,
                        text,
                        metadata: map.remove("metadata"),
                    });
                }
                if map.len() == 1 && map.contains_key("root") {
                    if let Some(root) = map.remove("root") {
                        return Part::Root(Box::new(Part::from(root)));
                    }
                }
                Part::Mapping(map)
            }
            other => Part::Other(other),
        }
    }
}

impl From<Part> for Value {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(p) => {
                let mut map = Map::new();
                map.insert(
                    "kind".into(),
                    Value::String(p.kind.unwrap_or_else(|| "text".into())),
                );
                map.insert("text".into(), Value::String(p.text));
                if let Some(meta) = p.metadata {
                    map.insert("metadata".into(), meta);
                }
                Value::Object(map)
            }
            Part::Root(inner) => serde_json::json!({ "root": Value::from(*inner) }),
            Part::Mapping(map) => Value::Object(map),
            Part::Other(v) => v,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Protocol message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A typed agent-to-agent protocol message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, alias = "context_id", skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, alias = "task_id", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, alias = "message_id", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ProtocolMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            kind: Some("message".into()),
            role: Some("user".into()),
            parts: vec![Part::text(text)],
            ..Self::default()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Text(String),
    Mapping(Map<String, Value>),
    Object(ProtocolMessage),
    Blocks(Vec<Part>),
}

impl InboundMessage {
    /// Classify an arbitrary JSON payload.
    ///
    /// Objects that carry a `parts` array plus `role`, `messageId` or
    /// `kind: "message"` are parsed as [`ProtocolMessage`]; other objects
    /// stay loose mappings.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => InboundMessage::Text(s),
            Value::Array(items) => {
                InboundMessage::Blocks(items.into_iter().map(Part::from).collect())
            }
            Value::Object(map) => {
                if looks_like_protocol_message(&map) {
                    if let Ok(msg) =
                        serde_json::from_value::<ProtocolMessage>(Value::Object(map.clone()))
                    {
                        return InboundMessage::Object(msg);
                    }
                }
                InboundMessage::Mapping(map)
            }
            Value::Null => InboundMessage::Text(String::new()),
            other => InboundMessage::Text(other.to_string()),
        }
    }

    /// Plain text handed to the model: all text parts joined by newlines.
    pub fn text_content(&self) -> String {
        match self {
            InboundMessage::Text(s) => s.clone(),
            InboundMessage::Object(msg) => join_texts(&msg.parts),
            InboundMessage::Blocks(parts) => join_texts(parts),
            InboundMessage::Mapping(map) => {
                if let Some(Value::Array(items)) = map.get("parts") {
                    let parts: Vec<Part> = items.iter().cloned().map(Part::from).collect();
                    return join_texts(&parts);
                }
                for key in ["text", "content", "message"] {
                    if let Some(Value::String(s)) = map.get(key) {
                        return s.clone();
                    }
                }
                Value::Object(map.clone()).to_string()
            }
        }
    }
}

impl From<String> for InboundMessage {
    fn from(s: String) -> Self {
        InboundMessage::Text(s)
    }
}

impl From<&str> for InboundMessage {
    fn from(s: &str) -> Self {
        InboundMessage::Text(s.to_owned())
    }
}

impl From<ProtocolMessage> for InboundMessage {
    fn from(msg: ProtocolMessage) -> Self {
        InboundMessage::Object(msg)
    }
}

/// Rendering used as the last-resort directive search: strings render as
/// themselves, everything else as compact JSON.
impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboundMessage::Text(s) => f.write_str(s),
            InboundMessage::Mapping(map) => {
                write!(f, "{}", Value::Object(map.clone()))
            }
            InboundMessage::Object(msg) => match serde_json::to_string(msg) {
                Ok(s) => f.write_str(&s),
                Err(_) => f.write_str(&join_texts(&msg.parts)),
            },
            InboundMessage::Blocks(parts) => {
                let values: Vec<Value> = parts.iter().cloned().map(Value::from).collect();
                write!(f, "{}", Value::Array(values))
            }
        }
    }
}

fn looks_like_protocol_message(map: &Map<String, Value>) -> bool {
    if !matches!(map.get("parts"), Some(Value::Array(_))) {
        return false;
    }
    map.contains_key("role")
        || map.contains_key("messageId")
        || map.get("kind").and_then(Value::as_str) == Some("message")
}

fn join_texts(parts: &[Part]) -> String {
    parts
        .iter()
        .filter_map(Part::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call hints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Out-of-band routing values supplied by the transport alongside a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallHints {
    pub context_id: Option<String>,
    pub task_id: Option<String>,
}

impl CallHints {
    pub fn with_context_id(id: impl Into<String>) -> Self {
        Self {
            context_id: Some(id.into()),
            task_id: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
