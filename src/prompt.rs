//! Prompt assembly for both call modes.
//!
//! Single-shot mode renders the signature into a system message (task
//! description, parameter listing, return-type description) and a user
//! message (bound argument values). Conversational mode uses the docstring
//! as persona, splices in filtered history, and renders the remaining
//! arguments as the current turn.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Error, Result};
use crate::message::{ContentPart, Message};
use crate::multimodal::{ArgValue, build_content};
use crate::signature::FunctionSignature;
use crate::tool::Tool;

/// Default system template for single-shot calls.
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "\
Your task is to provide results that meet the requirements based on the **function description** and the user's request.

- Function Description:
    {function_description}

- You will receive the following parameters:
    {parameters_description}

- The type of content you need to return:
    {return_type_description}

Execution Requirements:
1. Use available tools to assist in completing the task if needed
2. Do not wrap results in markdown format or code blocks; directly output the expected content or JSON representation";

/// Default user template for single-shot calls.
pub const DEFAULT_USER_TEMPLATE: &str = "\
The parameters provided are:
    {parameters}

Return the result directly without any explanation or formatting.";

/// Parameter names that designate conversational history.
const HISTORY_PARAM_NAMES: &[&str] = &["history", "chat_history"];

/// Optional template overrides for single-shot prompts. Overrides must keep
/// the placeholders the defaults use; a missing placeholder fails when the
/// prompt is rendered.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplates {
    pub system: Option<String>,
    pub user: Option<String>,
}

/// Fills `{name}` placeholders, requiring every binding's placeholder to be
/// present in the template.
///
/// Substitution is a single pass over the template: substituted values are
/// never rescanned, so placeholder-like text inside a value (a docstring
/// quoting `{parameters}`, a JSON example) stays literal.
fn fill(template: &str, bindings: &[(&str, &str)]) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut used = vec![false; bindings.len()];
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            output.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = &after[..end];
        match bindings.iter().position(|(n, _)| *n == name) {
            Some(pos) => {
                output.push_str(bindings[pos].1);
                used[pos] = true;
            }
            None => {
                output.push('{');
                output.push_str(name);
                output.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    if let Some(pos) = used.iter().position(|u| !u) {
        return Err(Error::template(format!(
            "template is missing required placeholder '{{{}}}'",
            bindings[pos].0
        )));
    }
    Ok(output)
}

/// Collects `{name}` placeholder names from a docstring. `{{` and `}}`
/// escape literal braces.
fn placeholder_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '{' {
            continue;
        }
        if chars.peek() == Some(&'{') {
            chars.next();
            continue;
        }
        let mut name = String::new();
        for inner in chars.by_ref() {
            if inner == '}' {
                break;
            }
            name.push(inner);
        }
        if !name.is_empty()
            && name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            names.push(name);
        }
    }
    names
}

/// Substitutes `{name}` placeholders in a docstring from caller-provided
/// values. Any unresolvable placeholder makes the whole substitution a
/// no-op: a warning is logged and the original docstring is returned.
pub fn substitute_docstring(docstring: &str, vars: &HashMap<String, String>) -> String {
    let names = placeholder_names(docstring);
    if names.is_empty() {
        return docstring.to_string();
    }
    let missing: Vec<&String> = names.iter().filter(|n| !vars.contains_key(*n)).collect();
    if !missing.is_empty() {
        warn!(
            missing = ?missing,
            "docstring placeholders have no bound values; using docstring as-is"
        );
        return docstring.to_string();
    }
    let mut output = docstring.to_string();
    for name in names {
        if let Some(value) = vars.get(&name) {
            output = output.replace(&format!("{{{name}}}"), value);
        }
    }
    output
}

fn parameters_description(sig: &FunctionSignature) -> String {
    if sig.params.is_empty() {
        return "(no parameters)".to_string();
    }
    sig.params
        .iter()
        .map(|p| format!("  - {}: {}", p.name, p.spec.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Return-type description: prose for scalars; prose plus structural sketch
/// plus example for complex types.
fn return_type_description(sig: &FunctionSignature) -> String {
    let spec = &sig.return_type;
    let mut description = spec.describe();
    if spec.is_complex() {
        let sketch = serde_json::to_string_pretty(&spec.structural_json())
            .unwrap_or_else(|_| "{}".to_string());
        let example = serde_json::to_string_pretty(&spec.example())
            .unwrap_or_else(|_| "{}".to_string());
        description.push_str(&format!(
            "\n\nExpected JSON structure:\n{sketch}\n\nExample:\n{example}"
        ));
    }
    description
}

/// Renders the user message for a set of parameters, producing a content
/// fragment list when any parameter is multimodal and a plain string
/// otherwise.
fn build_user_message(params: &[&crate::signature::Param], template: Option<&str>) -> Result<Message> {
    let multimodal = params.iter().any(|p| p.spec.is_multimodal());
    if multimodal {
        let plain: Vec<String> = params
            .iter()
            .filter(|p| !p.spec.is_multimodal())
            .map(|p| format!("{}: {}", p.name, p.value.render()))
            .collect();
        let mut parts: Vec<ContentPart> = Vec::new();
        if !plain.is_empty() {
            parts.push(ContentPart::text(plain.join("\n")));
        }
        for param in params.iter().filter(|p| p.spec.is_multimodal()) {
            parts.extend(build_content(&param.value, &param.spec)?);
        }
        return Ok(Message::user_parts(parts));
    }

    let rendered: Vec<String> = params
        .iter()
        .map(|p| format!("  - {}: {}", p.name, p.value.render()))
        .collect();
    let joined = rendered.join("\n");
    let text = match template {
        Some(template) => fill(template, &[("parameters", joined.as_str())])?,
        None => joined,
    };
    Ok(Message::user(text))
}

/// Builds the two-message prompt for a single-shot call.
pub fn build_single_shot_messages(
    sig: &FunctionSignature,
    templates: &PromptTemplates,
    template_vars: &HashMap<String, String>,
) -> Result<Vec<Message>> {
    let docstring = substitute_docstring(&sig.docstring, template_vars);
    let system_template = templates.system.as_deref().unwrap_or(DEFAULT_SYSTEM_TEMPLATE);
    let user_template = templates.user.as_deref().unwrap_or(DEFAULT_USER_TEMPLATE);

    let system = fill(
        system_template,
        &[
            ("function_description", docstring.as_str()),
            ("parameters_description", parameters_description(sig).as_str()),
            ("return_type_description", return_type_description(sig).as_str()),
        ],
    )?;

    let params: Vec<&crate::signature::Param> = sig.params.iter().collect();
    let user = build_user_message(&params, Some(user_template))?;

    Ok(vec![Message::system(system), user])
}

/// One prior turn as exchanged with callers of the conversational facade.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

pub type History = Vec<HistoryEntry>;

/// Parses a history argument into validated entries.
///
/// Entries must be objects with string `role` and `content`. System entries
/// are dropped (the single system message belongs at position 0); malformed
/// entries are skipped with a warning. A value that is not a list at all
/// degrades to empty history.
fn parse_history(value: &ArgValue) -> Vec<HistoryEntry> {
    let items = match value {
        ArgValue::Json(serde_json::Value::Array(items)) => items,
        other => {
            warn!(?other, "history argument is not a list; proceeding with empty history");
            return Vec::new();
        }
    };
    let mut entries = Vec::new();
    for item in items {
        match serde_json::from_value::<HistoryEntry>(item.clone()) {
            Ok(entry) if entry.role == "system" => {
                warn!("dropping system entry found inside history");
            }
            Ok(entry) => entries.push(entry),
            Err(_) => {
                warn!(entry = %item, "skipping malformed history entry");
            }
        }
    }
    entries
}

/// Builds the message list for one conversational turn: optional system
/// persona, filtered history, then the current-turn user message.
pub fn build_chat_messages(sig: &FunctionSignature, toolkit: &[std::sync::Arc<Tool>]) -> Result<Vec<Message>> {
    let mut messages = Vec::new();

    if !sig.docstring.trim().is_empty() {
        let mut system = sig.docstring.clone();
        if !toolkit.is_empty() {
            let listing: Vec<String> = toolkit
                .iter()
                .map(|t| format!("- {}: {}", t.name(), t.description()))
                .collect();
            system.push_str(&format!(
                "\n\nYou may use the following tools:\n{}",
                listing.join("\n")
            ));
        }
        messages.push(Message::system(system));
    }

    let history_param = sig
        .params
        .iter()
        .find(|p| HISTORY_PARAM_NAMES.contains(&p.name.as_str()));
    match history_param {
        Some(param) => {
            for entry in parse_history(&param.value) {
                let message = match entry.role.as_str() {
                    "assistant" => Message::assistant(entry.content),
                    _ => Message {
                        role: crate::message::Role::User,
                        content: Some(entry.content.into()),
                        tool_calls: None,
                        tool_call_id: None,
                    },
                };
                messages.push(message);
            }
        }
        None => {
            warn!(
                function = %sig.name,
                "no history parameter bound; starting the turn without prior context"
            );
        }
    }

    let current: Vec<&crate::signature::Param> = sig
        .params
        .iter()
        .filter(|p| !HISTORY_PARAM_NAMES.contains(&p.name.as_str()))
        .collect();
    if !current.is_empty() {
        messages.push(build_user_message(&current, None)?);
    }

    Ok(messages)
}
