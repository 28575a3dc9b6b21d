//! End-to-end tests of the tool-calling execution loop against a scripted
//! transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use llmfn::transport::testing::ScriptedTransport;
use llmfn::{
    ChatChunk, ChatResponse, Error, Message, ParamKind, Role, Tool, ToolOutput, execute_llm, tool,
};
use serde_json::json;

fn text_response(text: &str) -> ChatResponse {
    serde_json::from_value(json!({"choices": [{"message": {"content": text}}]})).unwrap()
}

fn tool_call_response(calls: &[(&str, &str, &str)]) -> ChatResponse {
    let calls: Vec<_> = calls
        .iter()
        .map(|(id, name, args)| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": args}
            })
        })
        .collect();
    serde_json::from_value(json!({
        "choices": [{"message": {"content": "", "tool_calls": calls}}]
    }))
    .unwrap()
}

fn registry(tools: Vec<Tool>) -> (Vec<Arc<Tool>>, HashMap<String, Arc<Tool>>) {
    let toolkit: Vec<Arc<Tool>> = tools.into_iter().map(Arc::new).collect();
    let map = toolkit
        .iter()
        .map(|t| (t.name().to_string(), Arc::clone(t)))
        .collect();
    (toolkit, map)
}

fn descriptors(toolkit: &[Arc<Tool>]) -> Option<Vec<serde_json::Value>> {
    if toolkit.is_empty() {
        None
    } else {
        Some(toolkit.iter().map(|t| t.descriptor()).collect())
    }
}

/// Every tool message must answer a call id proposed by the nearest
/// preceding assistant message, and no tool message may precede an
/// assistant message.
fn assert_protocol_order(messages: &[Message]) {
    let mut proposed: Vec<String> = Vec::new();
    let mut seen_assistant = false;
    for message in messages {
        match message.role {
            Role::Assistant => {
                seen_assistant = true;
                if let Some(calls) = &message.tool_calls {
                    proposed = calls.iter().map(|c| c.id.clone()).collect();
                }
            }
            Role::Tool => {
                assert!(seen_assistant, "tool message before any assistant message");
                let id = message.tool_call_id.as_deref().expect("tool message without id");
                assert!(
                    proposed.iter().any(|p| p == id),
                    "tool message {id} answers no preceding proposal"
                );
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn multiple_calls_in_one_round_execute_in_emission_order() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let order_a = Arc::clone(&order);
    let order_b = Arc::clone(&order);
    let (toolkit, map) = registry(vec![
        tool("first", "First tool").build(move |_| {
            let order = Arc::clone(&order_a);
            async move {
                order.lock().unwrap().push("first");
                Ok(ToolOutput::Text("a".into()))
            }
        }),
        tool("second", "Second tool").build(move |_| {
            let order = Arc::clone(&order_b);
            async move {
                order.lock().unwrap().push("second");
                Ok(ToolOutput::Text("b".into()))
            }
        }),
    ]);

    let transport = ScriptedTransport::responses(vec![
        tool_call_response(&[("c1", "first", "{}"), ("c2", "second", "{}")]),
        text_response("done"),
    ]);
    let mut messages = vec![Message::user("go")];

    let outcome = execute_llm(
        &transport,
        &mut messages,
        descriptors(&toolkit).as_deref(),
        &map,
        5,
        false,
        &mut |_, _| {},
    )
    .await
    .unwrap();

    assert_eq!(outcome.final_content, "done");
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    assert_protocol_order(&messages);
}

#[tokio::test]
async fn failing_tool_does_not_stop_the_round_or_the_loop() {
    let (toolkit, map) = registry(vec![
        tool("broken", "Always fails").build(|_| async { Err(Error::tool("nope")) }),
        tool("fine", "Always works").build(|_| async { Ok(ToolOutput::Text("ok".into())) }),
    ]);

    let transport = ScriptedTransport::responses(vec![
        tool_call_response(&[("c1", "broken", "{}"), ("c2", "fine", "{}")]),
        text_response("recovered"),
    ]);
    let mut messages = vec![Message::user("go")];

    let outcome = execute_llm(
        &transport,
        &mut messages,
        descriptors(&toolkit).as_deref(),
        &map,
        5,
        false,
        &mut |_, _| {},
    )
    .await
    .unwrap();

    assert_eq!(outcome.final_content, "recovered");
    let tool_texts: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(Message::text)
        .collect();
    assert_eq!(tool_texts.len(), 2);
    assert!(tool_texts[0].contains("nope"));
    assert_eq!(tool_texts[1], "ok");
    assert_protocol_order(&messages);
}

#[tokio::test]
async fn cap_bounds_execution_even_against_an_insatiable_model() {
    let executions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&executions);
    let (toolkit, map) = registry(vec![tool("loop_tool", "Keeps getting called").build(
        move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ToolOutput::Text("again".into()))
            }
        },
    )]);

    // The model never stops proposing calls.
    let responses = (0..10)
        .map(|i| tool_call_response(&[(&format!("c{i}"), "loop_tool", "{}")]))
        .collect();
    let transport = ScriptedTransport::responses(responses);
    let mut messages = vec![Message::user("go")];

    let outcome = execute_llm(
        &transport,
        &mut messages,
        descriptors(&toolkit).as_deref(),
        &map,
        3,
        false,
        &mut |_, _| {},
    )
    .await
    .unwrap();

    assert!(outcome.cap_reached);
    assert_eq!(outcome.rounds_executed, 3);
    assert_eq!(executions.load(Ordering::SeqCst), 3);
    // Requests: 3 executed rounds plus the capped final one.
    assert_eq!(transport.requests().len(), 4);
    assert_protocol_order(&messages);
}

#[tokio::test]
async fn error_context_lets_the_model_answer_about_failures() {
    // The model reads the unknown-tool error and answers in the next round.
    let (toolkit, map) = registry(vec![]);
    let transport = ScriptedTransport::responses(vec![
        tool_call_response(&[("c1", "ghost_tool", "{}")]),
        text_response("that tool does not exist"),
    ]);
    let mut messages = vec![Message::user("use ghost_tool")];

    let outcome = execute_llm(
        &transport,
        &mut messages,
        descriptors(&toolkit).as_deref(),
        &map,
        5,
        false,
        &mut |_, _| {},
    )
    .await
    .unwrap();

    assert_eq!(outcome.final_content, "that tool does not exist");
    // The second request carries the error-content tool message as context.
    let second_request = &transport.requests()[1];
    let error_context = second_request
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("error tool message in context");
    assert!(error_context.text().contains("ghost_tool"));
}

#[tokio::test]
async fn streamed_tool_round_is_reassembled_and_executed() {
    let (toolkit, map) = registry(vec![tool("lookup", "Lookup")
        .param("key", ParamKind::String, "Key")
        .build(|args| async move {
            Ok(ToolOutput::Json(json!({"value": args["key"]})))
        })]);

    let round_one: Vec<ChatChunk> = vec![
        serde_json::from_value(json!({
            "choices": [{"delta": {"tool_calls": [{
                "index": 0, "id": "c1", "type": "function",
                "function": {"name": "lookup", "arguments": "{\"ke"}
            }]}}]
        }))
        .unwrap(),
        serde_json::from_value(json!({
            "choices": [{"delta": {"tool_calls": [{
                "index": 0, "function": {"arguments": "y\":\"k1\"}"}
            }]}, "finish_reason": "tool_calls"}]
        }))
        .unwrap(),
    ];
    let round_two: Vec<ChatChunk> = vec![
        serde_json::from_value(json!({"choices": [{"delta": {"content": "found"}, "finish_reason": "stop"}]}))
            .unwrap(),
    ];
    let transport = ScriptedTransport::streams(vec![round_one, round_two]);
    let mut messages = vec![Message::user("look up k1")];

    let outcome = execute_llm(
        &transport,
        &mut messages,
        descriptors(&toolkit).as_deref(),
        &map,
        5,
        true,
        &mut |_, _| {},
    )
    .await
    .unwrap();

    assert_eq!(outcome.final_content, "found");
    let tool_message = messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool result in transcript");
    assert_eq!(tool_message.text(), "{\"value\":\"k1\"}");
    assert_protocol_order(&messages);
}
