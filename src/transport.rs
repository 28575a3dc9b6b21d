//! Chat transport: the seam between the execution loop and the wire.
//!
//! [`ChatTransport`] is the only thing the loop knows about the network,
//! which keeps the engine testable against scripted doubles. The production
//! implementation, [`OpenAiTransport`], speaks the OpenAI-compatible chat
//! completion protocol over reqwest, with SSE streaming, a least-loaded API
//! key pool, and an optional sliding-window rate limiter.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::keypool::{KeyPool, RateLimiter};
use crate::message::{ChatChunk, ChatRequest, ChatResponse, Message};

/// Boxed stream of chat chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

/// Abstract chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// One complete (non-streaming) chat completion.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// A streaming chat completion, yielded chunk by chunk.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream>;
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [serde_json::Value]>,
}

/// OpenAI-compatible HTTP transport.
pub struct OpenAiTransport {
    http: reqwest::Client,
    config: ProviderConfig,
    keys: KeyPool,
    limiter: Option<RateLimiter>,
}

impl OpenAiTransport {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let keys = KeyPool::new(config.api_keys.clone());
        let limiter = config
            .rate_limit
            .as_ref()
            .map(|rl| RateLimiter::new(rl.max_requests, rl.window));
        Ok(Self {
            http,
            config,
            keys,
            limiter,
        })
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        if let Some(limiter) = &self.limiter {
            let timeout = self
                .config
                .rate_limit
                .as_ref()
                .map(|rl| rl.permit_timeout)
                .unwrap_or(Duration::from_secs(30));
            if !limiter.acquire_permit(timeout).await {
                return Err(Error::Timeout(format!(
                    "no rate-limit permit within {timeout:?}"
                )));
            }
        }

        // The handle keeps the key marked in-flight until the request body
        // has been sent and the response headers received.
        let key = self.keys.acquire();
        let body = RequestBody {
            model: &self.config.model,
            messages: &request.messages,
            stream,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: request.tools.as_deref(),
        };
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(%url, stream, messages = request.messages.len(), "sending chat request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(key.key())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), message));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self.send(request, false).await?;
        Ok(response.json::<ChatResponse>().await?)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
        let response = self.send(request, true).await?;
        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) if event.data == "[DONE]" => None,
                    Ok(event) => Some(
                        serde_json::from_str::<ChatChunk>(&event.data)
                            .map_err(|e| Error::stream(format!("malformed stream chunk: {e}"))),
                    ),
                    Err(e) => Some(Err(Error::stream(e.to_string()))),
                }
            });
        Ok(Box::pin(stream))
    }
}

/// Scripted transport double for tests.
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// One scripted exchange.
    pub enum Script {
        Response(ChatResponse),
        Stream(Vec<ChatChunk>),
        Fail(String),
    }

    /// A [`ChatTransport`] that replays a fixed script and records every
    /// request it receives.
    pub struct ScriptedTransport {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn responses(responses: Vec<ChatResponse>) -> Self {
            Self::new(responses.into_iter().map(Script::Response).collect())
        }

        pub fn streams(streams: Vec<Vec<ChatChunk>>) -> Self {
            Self::new(streams.into_iter().map(Script::Stream).collect())
        }

        /// A transport where every call fails with `message`.
        pub fn failing(message: &str) -> Self {
            let scripts = std::iter::repeat_with(|| Script::Fail(message.to_string()))
                .take(16)
                .collect();
            Self::new(scripts)
        }

        /// Every request seen so far, in order.
        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone()
        }

        fn record(&self, request: &ChatRequest) {
            self.requests
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(request.clone());
        }

        fn next(&self) -> Option<Script> {
            self.scripts
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .pop_front()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
            self.record(request);
            match self.next() {
                Some(Script::Response(response)) => Ok(response),
                Some(Script::Fail(message)) => Err(Error::other(message)),
                Some(Script::Stream(_)) => Err(Error::other(
                    "scripted stream consumed by a non-streaming call",
                )),
                None => Err(Error::other("scripted transport exhausted")),
            }
        }

        async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream> {
            self.record(request);
            match self.next() {
                Some(Script::Stream(chunks)) => {
                    Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
                }
                Some(Script::Fail(message)) => Err(Error::other(message)),
                Some(Script::Response(_)) => Err(Error::other(
                    "scripted response consumed by a streaming call",
                )),
                None => Err(Error::other("scripted transport exhausted")),
            }
        }
    }
}
