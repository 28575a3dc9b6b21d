//! Error types and conversions used across the crate.
//!
//! Tool failures that the model can recover from (an unknown tool name,
//! arguments that fail to parse, a handler returning an error) never surface
//! here; they are folded back into the conversation as tool messages so the
//! model can react. The variants below are the unrecoverable cases.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All error cases surfaced by the public API.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failure (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A streaming response could not be parsed or terminated abnormally.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A prompt template was missing a required placeholder.
    #[error("Template error: {0}")]
    Template(String),

    /// A multimodal input could not be materialized (missing file, read
    /// failure, unreadable image).
    #[error("Media error: {0}")]
    Media(String),

    /// Tool registration problem (duplicate names, invalid schema).
    #[error("Tool error: {0}")]
    Tool(String),

    /// The model produced no usable content even after retries.
    #[error("LLM function '{function}' returned empty content after {attempts} attempt(s)")]
    EmptyResponse { function: String, attempts: u32 },

    /// The final response text could not be coerced into the declared
    /// return type.
    #[error("failed to coerce response for '{function}' into {target}: {message}")]
    Coercion {
        function: String,
        target: String,
        message: String,
    },

    /// A rate-limit permit could not be acquired in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Anything that does not fit the categories above.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Error::Stream(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn template(message: impl Into<String>) -> Self {
        Error::Template(message.into())
    }

    pub fn media(message: impl Into<String>) -> Self {
        Error::Media(message.into())
    }

    pub fn tool(message: impl Into<String>) -> Self {
        Error::Tool(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Error::Other(message.into())
    }
}
