//! Reassembles streamed tool-call fragments into complete calls.

use std::collections::BTreeMap;

use sv_domain::stream::StreamEvent;
use sv_domain::tool::ToolCall;

#[derive(Debug, Default)]
struct Slot {
    call_id: String,
    tool_name: String,
    arguments: String,
}

/// Collects `ToolCallStarted`/`ToolCallDelta` events keyed by slot index.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    slots: BTreeMap<usize, Slot>,
}

impl ToolCallAssembler {
    /// Feed one event. Returns `true` if the event was a tool-call fragment.
    pub fn push(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::ToolCallStarted {
                index,
                call_id,
                tool_name,
            } => {
                let slot = self.slots.entry(*index).or_default();
                slot.call_id = call_id.clone();
                slot.tool_name = tool_name.clone();
                true
            }
            StreamEvent::ToolCallDelta { index, delta } => {
                self.slots.entry(*index).or_default().arguments.push_str(delta);
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Completed calls in slot order. Unparseable arguments become `{}`.
    pub fn finish(self) -> Vec<ToolCall> {
        self.slots
            .into_values()
            .filter(|slot| !slot.tool_name.is_empty())
            .map(|slot| {
                let raw = if slot.arguments.trim().is_empty() {
                    "{}"
                } else {
                    slot.arguments.as_str()
                };
                let arguments = serde_json::from_str(raw).unwrap_or_else(|e| {
                    tracing::warn!(
                        tool = %slot.tool_name,
                        error = %e,
                        "tool call arguments are not valid JSON"
                    );
                    serde_json::Value::Object(Default::default())
                });
                ToolCall {
                    call_id: slot.call_id,
                    tool_name: slot.tool_name,
                    arguments,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_fragments_are_grouped_by_index() {
        let mut asm = ToolCallAssembler::default();
        let events = [
            StreamEvent::ToolCallStarted {
                index: 1,
                call_id: "b".into(),
                tool_name: "email_tool".into(),
            },
            StreamEvent::ToolCallStarted {
                index: 0,
                call_id: "a".into(),
                tool_name: "aws_cloudwatch_tool".into(),
            },
            StreamEvent::ToolCallDelta { index: 0, delta: "{\"query\":".into() },
            StreamEvent::ToolCallDelta { index: 1, delta: "{}".into() },
            StreamEvent::ToolCallDelta { index: 0, delta: "\"alarms\"}".into() },
            StreamEvent::Token { text: "ignored".into() },
        ];
        let consumed = events.iter().filter(|e| asm.push(e)).count();
        assert_eq!(consumed, 5);

        let calls = asm.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call_id, "a");
        assert_eq!(calls[0].arguments["query"], "alarms");
        assert_eq!(calls[1].tool_name, "email_tool");
    }

    #[test]
    fn broken_arguments_fall_back_to_empty_object() {
        let mut asm = ToolCallAssembler::default();
        asm.push(&StreamEvent::ToolCallStarted {
            index: 0,
            call_id: "x".into(),
            tool_name: "t".into(),
        });
        asm.push(&StreamEvent::ToolCallDelta { index: 0, delta: "{\"q\": ".into() });
        let calls = asm.finish();
        assert_eq!(calls[0].arguments, serde_json::json!({}));
    }
}
