//! The tool-calling execution loop.
//!
//! One call to [`execute_llm`] drives a whole turn: send the conversation,
//! extract content and tool-call proposals, execute tools, and repeat until
//! the model answers without proposing calls or the round cap is hit. Every
//! response (or streamed chunk) is surfaced through the `emit` sink along
//! with the conversation state at that moment, so callers can observe
//! intermediate rounds live.
//!
//! Transport failures propagate immediately and abort the turn; tool
//! failures are absorbed by the invocation layer and never abort it.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info};

use crate::error::Result;
use crate::extract::{self, ToolCallAccumulator};
use crate::invoke::process_tool_calls;
use crate::message::{ChatChunk, ChatRequest, ChatResponse, Message};
use crate::tool::Tool;
use crate::transport::ChatTransport;

/// One observable unit of model output.
#[derive(Debug, Clone)]
pub enum ReactEvent {
    /// A complete non-streaming response (one per round).
    Response(ChatResponse),
    /// One streamed chunk (many per round).
    Chunk(ChatChunk),
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct ReactOutcome {
    /// Content of the final response; may be empty.
    pub final_content: String,
    /// Tool rounds actually executed.
    pub rounds_executed: u32,
    /// Whether the turn ended because the round cap was reached while the
    /// model was still proposing calls (the last proposal went unexecuted).
    pub cap_reached: bool,
}

/// Runs the tool-calling loop to completion over `messages`.
///
/// `messages` is extended in place: assistant content, assistant tool-call
/// proposals, and tool results are appended in protocol order. `emit` is
/// called for every response or chunk together with the messages as they
/// stood when it was observed.
pub async fn execute_llm<F>(
    transport: &dyn ChatTransport,
    messages: &mut Vec<Message>,
    tools: Option<&[serde_json::Value]>,
    tool_map: &HashMap<String, Arc<Tool>>,
    max_tool_calls: u32,
    stream: bool,
    emit: &mut F,
) -> Result<ReactOutcome>
where
    F: FnMut(ReactEvent, &[Message]),
{
    let mut rounds_executed = 0u32;

    loop {
        let request = ChatRequest {
            messages: messages.clone(),
            tools: tools.map(<[serde_json::Value]>::to_vec),
            stream,
        };

        let (content, calls) = if stream {
            let mut chunk_stream = transport.chat_stream(&request).await?;
            let mut accumulator = ToolCallAccumulator::new();
            let mut content = String::new();
            while let Some(chunk) = chunk_stream.next().await {
                let chunk = chunk?;
                content.push_str(extract::delta_content(&chunk));
                accumulator.absorb(&chunk);
                emit(ReactEvent::Chunk(chunk), messages);
            }
            (content, accumulator.finish())
        } else {
            let response = transport.chat(&request).await?;
            let content = extract::content(&response);
            let calls = extract::tool_calls(&response);
            emit(ReactEvent::Response(response), messages);
            (content, calls)
        };

        if !content.trim().is_empty() {
            messages.push(Message::assistant(content.clone()));
        }

        if calls.is_empty() {
            debug!(rounds_executed, "turn complete");
            return Ok(ReactOutcome {
                final_content: content,
                rounds_executed,
                cap_reached: false,
            });
        }

        if rounds_executed >= max_tool_calls {
            // Cap reached: the last proposal is returned as final, unexecuted.
            info!(
                max_tool_calls,
                "tool-call round cap reached; returning last response without executing"
            );
            return Ok(ReactOutcome {
                final_content: content,
                rounds_executed,
                cap_reached: true,
            });
        }

        debug!(round = rounds_executed + 1, calls = calls.len(), "executing tool round");
        messages.push(Message::assistant_tool_calls(calls.clone()));
        process_tool_calls(&calls, tool_map, messages).await?;
        rounds_executed += 1;
    }
}

/// Builds the name-to-tool registry the loop resolves calls against.
pub fn build_tool_map(toolkit: &[Arc<Tool>]) -> HashMap<String, Arc<Tool>> {
    toolkit
        .iter()
        .map(|t| (t.name().to_string(), Arc::clone(t)))
        .collect()
}

/// Serialized descriptors for the request `tools` field; `None` when the
/// toolkit is empty.
pub fn build_descriptors(toolkit: &[Arc<Tool>]) -> Option<Vec<serde_json::Value>> {
    if toolkit.is_empty() {
        return None;
    }
    Some(toolkit.iter().map(|t| t.descriptor()).collect())
}
