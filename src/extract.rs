//! Response content and tool-call extraction.
//!
//! Non-streaming responses are read directly off the first choice.
//! Streaming responses deliver tool calls as fragments that share an
//! `index`; [`ToolCallAccumulator`] reassembles them into complete
//! [`ToolCallRequest`]s once the stream ends.

use std::collections::BTreeMap;

use tracing::warn;

use crate::message::{
    ChatChunk, ChatResponse, FunctionCall, ToolCallRequest, default_call_kind,
};

/// Text content of a non-streaming response; empty when absent.
pub fn content(response: &ChatResponse) -> String {
    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .unwrap_or_default()
}

/// Complete tool calls proposed by a non-streaming response.
pub fn tool_calls(response: &ChatResponse) -> Vec<ToolCallRequest> {
    response
        .choices
        .first()
        .and_then(|choice| choice.message.tool_calls.clone())
        .unwrap_or_default()
}

/// Text delta carried by one streamed chunk; empty when absent.
pub fn delta_content(chunk: &ChatChunk) -> &str {
    chunk
        .choices
        .first()
        .and_then(|choice| choice.delta.content.as_deref())
        .unwrap_or("")
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    kind: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Reassembles streamed tool-call fragments keyed by index.
///
/// Fragments are absorbed as chunks arrive; [`finish`](Self::finish) yields
/// the completed calls in index order. A slot that never received both an
/// `id` and a function name is incomplete and dropped.
#[derive(Default)]
pub struct ToolCallAccumulator {
    slots: BTreeMap<u32, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one chunk's tool-call fragments into the slot table.
    pub fn absorb(&mut self, chunk: &ChatChunk) {
        for choice in &chunk.choices {
            let Some(deltas) = &choice.delta.tool_calls else {
                continue;
            };
            for delta in deltas {
                let Some(index) = delta.index else {
                    warn!("tool-call fragment without an index; skipping");
                    continue;
                };
                let slot = self.slots.entry(index).or_default();
                if let Some(id) = &delta.id {
                    slot.id = Some(id.clone());
                }
                if let Some(kind) = &delta.kind {
                    slot.kind = Some(kind.clone());
                }
                if let Some(function) = &delta.function {
                    if let Some(name) = &function.name {
                        slot.name = Some(name.clone());
                    }
                    if let Some(arguments) = &function.arguments {
                        slot.arguments.push_str(arguments);
                    }
                }
            }
        }
    }

    /// Completed calls in index order; incomplete slots are dropped.
    pub fn finish(self) -> Vec<ToolCallRequest> {
        self.slots
            .into_values()
            .filter_map(|slot| {
                let (Some(id), Some(name)) = (slot.id, slot.name) else {
                    return None;
                };
                Some(ToolCallRequest {
                    id,
                    kind: slot.kind.unwrap_or_else(default_call_kind),
                    function: FunctionCall {
                        name,
                        arguments: slot.arguments,
                    },
                })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChunkChoice, Delta, FunctionDelta, ToolCallDelta};
    use serde_json::json;

    fn chunk_with_deltas(deltas: Vec<ToolCallDelta>) -> ChatChunk {
        ChatChunk {
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    content: None,
                    tool_calls: Some(deltas),
                },
                finish_reason: None,
            }],
        }
    }

    fn delta(
        index: Option<u32>,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> ToolCallDelta {
        ToolCallDelta {
            index,
            id: id.map(String::from),
            kind: None,
            function: Some(FunctionDelta {
                name: name.map(String::from),
                arguments: arguments.map(String::from),
            }),
        }
    }

    #[test]
    fn extracts_content_and_calls_from_response() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": "thinking",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{}"}
                    }]
                }
            }]
        }))
        .unwrap();
        assert_eq!(content(&response), "thinking");
        let calls = tool_calls(&response);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_weather");
    }

    #[test]
    fn empty_response_extracts_to_defaults() {
        let response = ChatResponse {
            choices: vec![],
            usage: None,
        };
        assert_eq!(content(&response), "");
        assert!(tool_calls(&response).is_empty());
    }

    #[test]
    fn accumulates_argument_fragments_in_order() {
        let mut acc = ToolCallAccumulator::new();
        acc.absorb(&chunk_with_deltas(vec![delta(
            Some(0),
            Some("call_1"),
            Some("get_weather"),
            Some("{\"ci"),
        )]));
        acc.absorb(&chunk_with_deltas(vec![delta(
            Some(0),
            None,
            None,
            Some("ty\":\"Paris\"}"),
        )]));

        let calls = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].function.arguments, "{\"city\":\"Paris\"}");
    }

    #[test]
    fn interleaved_calls_keep_separate_slots() {
        let mut acc = ToolCallAccumulator::new();
        acc.absorb(&chunk_with_deltas(vec![
            delta(Some(0), Some("call_a"), Some("first"), Some("{\"x\":")),
            delta(Some(1), Some("call_b"), Some("second"), Some("{\"y\":")),
        ]));
        acc.absorb(&chunk_with_deltas(vec![
            delta(Some(1), None, None, Some("2}")),
            delta(Some(0), None, None, Some("1}")),
        ]));

        let calls = acc.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function.name, "first");
        assert_eq!(calls[0].function.arguments, "{\"x\":1}");
        assert_eq!(calls[1].function.name, "second");
        assert_eq!(calls[1].function.arguments, "{\"y\":2}");
    }

    #[test]
    fn fragment_without_index_is_skipped() {
        let mut acc = ToolCallAccumulator::new();
        acc.absorb(&chunk_with_deltas(vec![delta(
            None,
            Some("call_1"),
            Some("orphan"),
            Some("{}"),
        )]));
        assert!(acc.is_empty());
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn incomplete_slot_is_dropped_at_finish() {
        let mut acc = ToolCallAccumulator::new();
        // Arguments but never a name or id.
        acc.absorb(&chunk_with_deltas(vec![delta(Some(0), None, None, Some("{}"))]));
        assert!(acc.finish().is_empty());
    }
}
