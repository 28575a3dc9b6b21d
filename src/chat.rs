//! Conversational facade: multi-turn chat with live yields.
//!
//! Each call runs one turn of the tool-calling loop on a spawned task and
//! returns a stream of `(yield, history)` pairs. In text mode the yields are
//! content fragments (full responses when not streaming, deltas when
//! streaming) and the turn ends with an empty-string marker carrying the
//! authoritative updated history. In raw mode every response or chunk is
//! yielded unprocessed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::Instrument;

use crate::error::Result;
use crate::extract;
use crate::message::{Message, Role};
use crate::prompt::{History, HistoryEntry, build_chat_messages};
use crate::react::{ReactEvent, build_descriptors, build_tool_map, execute_llm};
use crate::signature::FunctionSignature;
use crate::tool::Tool;
use crate::transport::ChatTransport;

/// What the stream yields per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnMode {
    /// Extracted text content; final yield is an empty-string marker.
    #[default]
    Text,
    /// Unprocessed responses or chunks.
    Raw,
}

/// Options for one conversational turn.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub max_tool_calls: u32,
    pub stream: bool,
    pub return_mode: ReturnMode,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_tool_calls: 5,
            stream: false,
            return_mode: ReturnMode::Text,
        }
    }
}

/// One yielded unit of a conversational turn.
#[derive(Debug, Clone)]
pub enum ChatYield {
    Text(String),
    Raw(ReactEvent),
}

/// Stream of `(yield, updated history)` pairs for one turn.
pub type ChatStream = UnboundedReceiverStream<Result<(ChatYield, History)>>;

/// Caller-facing view of the conversation: user and assistant entries with
/// non-empty text. System messages, tool-call proposals, and tool results
/// are engine internals and stay out of it.
fn history_of(messages: &[Message]) -> History {
    messages
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .filter_map(|m| {
            let content = m.text();
            if content.is_empty() {
                return None;
            }
            Some(HistoryEntry {
                role: m.role.as_str().to_string(),
                content,
            })
        })
        .collect()
}

/// Runs one conversational turn.
///
/// Prompt assembly happens before the task is spawned, so configuration
/// problems surface synchronously. Transport failures mid-turn arrive as an
/// `Err` item on the stream.
pub fn run_conversational(
    sig: FunctionSignature,
    transport: Arc<dyn ChatTransport>,
    toolkit: Vec<Arc<Tool>>,
    options: ChatOptions,
) -> Result<ChatStream> {
    let mut messages = build_chat_messages(&sig, &toolkit)?;
    let span = tracing::info_span!(
        "llm_chat",
        function = %sig.name,
        trace_id = %sig.trace_id,
    );

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(
        async move {
            let tool_map = build_tool_map(&toolkit);
            let descriptors = build_descriptors(&toolkit);
            let return_mode = options.return_mode;
            let sender = tx.clone();

            let result = execute_llm(
                transport.as_ref(),
                &mut messages,
                descriptors.as_deref(),
                &tool_map,
                options.max_tool_calls,
                options.stream,
                &mut |event, current: &[Message]| {
                    let item = match return_mode {
                        ReturnMode::Text => {
                            let text = match &event {
                                ReactEvent::Response(response) => extract::content(response),
                                ReactEvent::Chunk(chunk) => {
                                    extract::delta_content(chunk).to_string()
                                }
                            };
                            ChatYield::Text(text)
                        }
                        ReturnMode::Raw => ChatYield::Raw(event),
                    };
                    let _ = sender.send(Ok((item, history_of(current))));
                },
            )
            .await;

            match result {
                Ok(_) => {
                    if return_mode == ReturnMode::Text {
                        // Turn-completion marker with the authoritative history.
                        let _ = tx.send(Ok((
                            ChatYield::Text(String::new()),
                            history_of(&messages),
                        )));
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                }
            }
        }
        .instrument(span),
    );

    Ok(UnboundedReceiverStream::new(rx))
}
