//! Single-shot facade: one fully bound call, one typed answer.
//!
//! Builds the two-message prompt from the signature, drives the tool-calling
//! loop to completion, and coerces the final content into the declared
//! return type. An empty final answer triggers a bounded retry of the whole
//! request, tool rounds included.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{Instrument, info, warn};

use crate::coerce::process_response;
use crate::error::{Error, Result};
use crate::prompt::{PromptTemplates, build_single_shot_messages};
use crate::react::{build_descriptors, build_tool_map, execute_llm};
use crate::retry::RetryConfig;
use crate::signature::FunctionSignature;
use crate::tool::Tool;
use crate::transport::ChatTransport;

/// Options for a single-shot call.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Maximum tool-execution rounds per attempt.
    pub max_tool_calls: u32,
    /// Extra attempts when the final content comes back empty.
    pub retry_on_empty: u32,
    /// Prompt template overrides.
    pub templates: PromptTemplates,
    /// Values for `{name}` placeholders in the docstring.
    pub template_vars: HashMap<String, String>,
    /// Delay schedule between empty-response retries.
    pub retry: RetryConfig,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            max_tool_calls: 5,
            retry_on_empty: 2,
            templates: PromptTemplates::default(),
            template_vars: HashMap::new(),
            retry: RetryConfig::default(),
        }
    }
}

/// Executes one single-shot LLM function call and coerces the answer to `T`.
pub async fn run_single_shot<T: DeserializeOwned>(
    sig: &FunctionSignature,
    transport: &dyn ChatTransport,
    toolkit: &[Arc<Tool>],
    options: &CallOptions,
) -> Result<T> {
    let span = tracing::info_span!(
        "llm_function",
        function = %sig.name,
        trace_id = %sig.trace_id,
    );
    async {
        let base_messages =
            build_single_shot_messages(sig, &options.templates, &options.template_vars)?;
        let tool_map = build_tool_map(toolkit);
        let descriptors = build_descriptors(toolkit);

        let attempts = options.retry_on_empty + 1;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = options.retry.delay_for(attempt - 1);
                warn!(attempt, ?delay, "final content was empty; retrying whole request");
                tokio::time::sleep(delay).await;
            }

            // Retries re-run everything from the original prompt, including
            // any tool rounds the previous attempt performed.
            let mut messages = base_messages.clone();
            let outcome = execute_llm(
                transport,
                &mut messages,
                descriptors.as_deref(),
                &tool_map,
                options.max_tool_calls,
                false,
                &mut |_, _| {},
            )
            .await?;

            if !outcome.final_content.trim().is_empty() {
                info!(rounds = outcome.rounds_executed, "call complete");
                return process_response(&outcome.final_content, &sig.return_type, &sig.name);
            }
        }

        Err(Error::EmptyResponse {
            function: sig.name.clone(),
            attempts,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatResponse;
    use crate::multimodal::ArgValue;
    use crate::transport::testing::ScriptedTransport;
    use crate::typedesc::TypeSpec;
    use serde_json::json;

    fn text_response(text: &str) -> ChatResponse {
        serde_json::from_value(json!({"choices": [{"message": {"content": text}}]})).unwrap()
    }

    fn sig() -> FunctionSignature {
        FunctionSignature::builder("count_words")
            .docstring("Count the words in the text.")
            .param("text", TypeSpec::String, ArgValue::json(json!("one two three")))
            .returns(TypeSpec::Integer)
            .build()
            .unwrap()
    }

    fn fast_options() -> CallOptions {
        CallOptions {
            retry: RetryConfig::new()
                .with_initial_delay(std::time::Duration::from_millis(1))
                .with_jitter_factor(0.0),
            ..CallOptions::default()
        }
    }

    #[tokio::test]
    async fn returns_typed_result() {
        let transport = ScriptedTransport::responses(vec![text_response("3")]);
        let out: i64 = run_single_shot(&sig(), &transport, &[], &fast_options())
            .await
            .unwrap();
        assert_eq!(out, 3);

        // One request, carrying system and user messages.
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 2);
        assert!(requests[0].tools.is_none());
    }

    #[tokio::test]
    async fn empty_responses_retry_then_succeed() {
        let transport = ScriptedTransport::responses(vec![
            text_response(""),
            text_response(""),
            text_response("3"),
        ]);
        let out: i64 = run_single_shot(&sig(), &transport, &[], &fast_options())
            .await
            .unwrap();
        assert_eq!(out, 3);
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn retries_exhaust_into_empty_response_error() {
        let transport = ScriptedTransport::responses(vec![
            text_response(""),
            text_response(""),
            text_response(""),
            text_response("never reached"),
        ]);
        let err = run_single_shot::<i64>(&sig(), &transport, &[], &fast_options())
            .await
            .unwrap_err();
        match err {
            Error::EmptyResponse { function, attempts } => {
                assert_eq!(function, "count_words");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected EmptyResponse, got {other}"),
        }
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn coercion_failure_is_not_retried() {
        let transport = ScriptedTransport::responses(vec![
            text_response("not a number"),
            text_response("3"),
        ]);
        let err = run_single_shot::<i64>(&sig(), &transport, &[], &fast_options())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Coercion { .. }));
        // The second scripted response must still be queued.
        assert_eq!(transport.requests().len(), 1);
    }
}
