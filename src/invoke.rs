//! Tool invocation: executes the model's tool-call proposals and folds
//! results back into the conversation.
//!
//! Per-tool failures (unknown name, malformed arguments, handler errors,
//! unreadable image results) are never fatal; each becomes an error-content
//! tool message so the model can see what went wrong and adjust. Calls run
//! sequentially in the order the model proposed them.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::message::{ContentPart, Message, Role, ToolCallRequest};
use crate::multimodal::{ImgPath, ImgUrl};
use crate::tool::{ParamKind, Tool, ToolOutput};

/// Executes every call in `calls` against `tool_map`, appending result
/// messages to `messages` in emission order.
///
/// Returns an error only if `messages` is not in a state that admits tool
/// results (the last message must be the assistant's tool-call proposal);
/// that indicates a caller bug, not a model mistake.
pub async fn process_tool_calls(
    calls: &[ToolCallRequest],
    tool_map: &HashMap<String, Arc<Tool>>,
    messages: &mut Vec<Message>,
) -> Result<()> {
    let valid_tail = messages
        .last()
        .is_some_and(|m| m.role == Role::Assistant && m.tool_calls.is_some());
    if !valid_tail {
        return Err(Error::other(
            "tool results require the assistant's tool-call message to be the last in the conversation",
        ));
    }

    for call in calls {
        let name = &call.function.name;

        let Some(tool) = tool_map.get(name) else {
            warn!(tool = %name, "model requested an unknown tool");
            messages.push(error_message(
                &call.id,
                format!("tool '{name}' is not available"),
            ));
            continue;
        };

        let args: Value = match serde_json::from_str(&call.function.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %name, error = %e, "tool arguments are not valid JSON");
                messages.push(error_message(
                    &call.id,
                    format!("invalid arguments for tool '{name}': {e}"),
                ));
                continue;
            }
        };

        let args = match coerce_media_arguments(tool, args) {
            Ok(value) => value,
            Err(reason) => {
                messages.push(error_message(&call.id, reason));
                continue;
            }
        };

        debug!(tool = %name, "executing tool");
        let output = match tool.execute(args.clone()).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %name, error = %e, "tool execution failed");
                messages.push(error_message(
                    &call.id,
                    format!("tool '{name}' failed with arguments {args}: {e}"),
                ));
                continue;
            }
        };

        emit_output(name, &call.id, output, messages);
    }

    Ok(())
}

fn error_message(call_id: &str, reason: String) -> Message {
    let content = serde_json::json!({"error": reason}).to_string();
    Message::tool_result(call_id, content)
}

/// Re-checks and normalizes declared multimodal list parameters. The model
/// supplies plain string arrays; image paths must name existing files before
/// the handler sees them.
fn coerce_media_arguments(tool: &Tool, mut args: Value) -> std::result::Result<Value, String> {
    if tool.media_params().is_empty() {
        return Ok(args);
    }
    let Some(object) = args.as_object_mut() else {
        return Ok(args);
    };
    for (param, kind) in tool.media_params() {
        let Some(value) = object.get(param) else {
            continue;
        };
        let Some(items) = value.as_array() else {
            return Err(format!(
                "parameter '{param}' of tool '{}' must be a list of strings",
                tool.name()
            ));
        };
        for item in items {
            let Some(text) = item.as_str() else {
                return Err(format!(
                    "parameter '{param}' of tool '{}' must contain only strings",
                    tool.name()
                ));
            };
            match kind {
                ParamKind::ImagePathList => {
                    ImgPath::new(text).map_err(|e| {
                        format!("parameter '{param}' of tool '{}': {e}", tool.name())
                    })?;
                }
                ParamKind::ImageUrlList => {
                    ImgUrl::new(text).map_err(|e| {
                        format!("parameter '{param}' of tool '{}': {e}", tool.name())
                    })?;
                }
                _ => {}
            }
        }
    }
    Ok(args)
}

/// Converts one tool output into conversation messages.
///
/// Image outputs use a two-message pattern: a tool-role acknowledgment
/// (providers reject empty tool content, and tool messages cannot carry
/// images) followed by a user-role message with the explanatory text and the
/// image fragment.
fn emit_output(name: &str, call_id: &str, output: ToolOutput, messages: &mut Vec<Message>) {
    match output {
        ToolOutput::Text(text) => {
            messages.push(Message::tool_result(call_id, text));
        }
        ToolOutput::Json(value) => {
            let content = serde_json::to_string(&value)
                .unwrap_or_else(|e| format!("{{\"error\":\"unserializable tool result: {e}\"}}"));
            messages.push(Message::tool_result(call_id, content));
        }
        ToolOutput::Image(source) => {
            let note = format!("Tool '{name}' returned an image; it follows in the next message.");
            emit_image(call_id, note, source, messages);
        }
        ToolOutput::Annotated(text, source) => {
            emit_image(call_id, text, source, messages);
        }
    }
}

fn emit_image(
    call_id: &str,
    text: String,
    source: crate::multimodal::ImageSource,
    messages: &mut Vec<Message>,
) {
    match source.to_part() {
        Ok(part) => {
            messages.push(Message::tool_result(call_id, text.clone()));
            messages.push(Message::user_parts(vec![ContentPart::text(text), part]));
        }
        Err(e) => {
            warn!(error = %e, "tool image result could not be materialized");
            messages.push(error_message(call_id, format!("tool image result rejected: {e}")));
        }
    }
}
