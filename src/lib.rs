//! # llmfn
//!
//! Typed LLM function calls for OpenAI-compatible servers.
//!
//! An LLM function is declared as an explicit [`FunctionSignature`]: a name,
//! a docstring that becomes the task description, bound parameters with
//! declared types, and a declared return type. The crate turns the signature
//! into a prompt, drives a tool-calling loop against the model until it
//! answers, and coerces the answer into the declared type.
//!
//! ## Single-shot calls
//!
//! ```rust,no_run
//! use llmfn::{
//!     ArgValue, CallOptions, FunctionSignature, OpenAiTransport, ProviderConfig, TypeSpec,
//!     run_single_shot,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> llmfn::Result<()> {
//!     let config = ProviderConfig::builder()
//!         .base_url("http://localhost:1234/v1")
//!         .model("qwen2.5-32b-instruct")
//!         .build()?;
//!     let transport = OpenAiTransport::new(config)?;
//!
//!     let sig = FunctionSignature::builder("count_words")
//!         .docstring("Count the words in the given text.")
//!         .param("text", TypeSpec::String, ArgValue::json(json!("one two three")))
//!         .returns(TypeSpec::Integer)
//!         .build()?;
//!
//!     let count: i64 = run_single_shot(&sig, &transport, &[], &CallOptions::default()).await?;
//!     println!("{count}");
//!     Ok(())
//! }
//! ```
//!
//! ## Conversational turns
//!
//! ```rust,no_run
//! use llmfn::{
//!     ArgValue, ChatOptions, ChatYield, FunctionSignature, OpenAiTransport, ProviderConfig,
//!     TypeSpec, run_conversational,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> llmfn::Result<()> {
//!     let config = ProviderConfig::from_env()?;
//!     let transport = Arc::new(OpenAiTransport::new(config)?);
//!
//!     let sig = FunctionSignature::builder("assistant")
//!         .docstring("You are a helpful assistant.")
//!         .param("history", TypeSpec::List(Box::new(TypeSpec::Map(
//!             Box::new(TypeSpec::String), Box::new(TypeSpec::String)))),
//!             ArgValue::json(json!([])))
//!         .param("message", TypeSpec::String, ArgValue::json(json!("Hello!")))
//!         .build()?;
//!
//!     let mut stream = run_conversational(sig, transport, Vec::new(), ChatOptions::default())?;
//!     while let Some(item) = stream.next().await {
//!         let (yielded, _history) = item?;
//!         if let ChatYield::Text(text) = yielded {
//!             print!("{text}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **signature**: explicit function signatures with bound arguments
//! - **typedesc**: declarative type descriptions driving prompts and validation
//! - **multimodal**: text/image argument wrappers and content fragments
//! - **prompt**: prompt assembly for both call modes
//! - **tool**: tool definitions with JSON Schema descriptors
//! - **extract** / **invoke** / **react**: the tool-calling execution loop
//! - **coerce**: final-answer coercion into the declared return type
//! - **transport** / **config** / **keypool**: the OpenAI-compatible wire layer
//! - **func** / **chat**: the two public facades

mod chat;
mod coerce;
mod config;
mod error;
mod extract;
mod func;
mod invoke;
mod keypool;
mod message;
mod multimodal;
mod prompt;
mod react;
mod signature;
mod tool;
mod typedesc;

/// Retry delay schedule, public so callers can tune the empty-response
/// retry backoff.
pub mod retry;

/// Transport seam; public so callers can supply their own transport or use
/// the scripted double in tests.
pub mod transport;

// --- Facades ---

pub use chat::{ChatOptions, ChatStream, ChatYield, ReturnMode, run_conversational};
pub use func::{CallOptions, run_single_shot};

// --- Signatures and types ---

pub use signature::{FunctionSignature, FunctionSignatureBuilder, Param};
pub use typedesc::{FieldSpec, ModelSchema, TypeSpec};

// --- Multimodal inputs ---

pub use multimodal::{ArgValue, ImageSource, ImgPath, ImgUrl, MediaValue, Text};

// --- Prompting ---

pub use prompt::{
    DEFAULT_SYSTEM_TEMPLATE, DEFAULT_USER_TEMPLATE, History, HistoryEntry, PromptTemplates,
};

// --- Tools ---

pub use tool::{ParamKind, Tool, ToolBuilder, ToolHandler, ToolOutput, tool};

// --- Engine types ---

pub use coerce::process_response;
pub use extract::ToolCallAccumulator;
pub use message::{
    ChatChunk, ChatRequest, ChatResponse, ContentPart, ImageDetail, Message, MessageContent, Role,
    ToolCallRequest,
};
pub use react::{ReactEvent, ReactOutcome, execute_llm};

// --- Configuration and errors ---

pub use config::{ProviderConfig, ProviderConfigBuilder, RateLimit};
pub use error::{Error, Result};
pub use transport::{ChatTransport, ChunkStream, OpenAiTransport};

/// Commonly used items for typical usage.
pub mod prelude {
    pub use crate::{
        ArgValue, CallOptions, ChatOptions, ChatYield, Error, FunctionSignature, ImgPath, ImgUrl,
        OpenAiTransport, ParamKind, PromptTemplates, ProviderConfig, Result, Tool, ToolOutput,
        TypeSpec, run_conversational, run_single_shot, tool,
    };
}
