//! Tool definitions for OpenAI-compatible function calling.
//!
//! A [`Tool`] bundles metadata (name, description, JSON Schema) with an
//! async handler. Handlers are stored as `Arc<dyn Fn(Value) -> Pin<Box<dyn
//! Future>>>`: boxing erases the concrete future type so tools with
//! different handlers live in one registry, and `Arc` makes them cheap to
//! clone into spawned tasks.
//!
//! Handlers return a [`ToolOutput`] rather than bare JSON so an image result
//! is a distinct, well-formed case instead of a JSON convention the
//! invocation layer has to sniff for.
//!
//! ```rust,no_run
//! use llmfn::{tool, ParamKind, ToolOutput};
//! use serde_json::json;
//!
//! let weather = tool("get_weather", "Get current weather for a city")
//!     .param("city", ParamKind::String, "City name")
//!     .build(|args| async move {
//!         let city = args["city"].as_str().unwrap_or("unknown");
//!         Ok(ToolOutput::Json(json!({"city": city, "temp_c": 22})))
//!     });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::multimodal::ImageSource;

/// Declared type of one tool parameter.
///
/// The three list kinds mark parameters whose string elements the invocation
/// layer converts into multimodal values before the handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    /// List of plain text fragments.
    TextList,
    /// List of image URLs.
    ImageUrlList,
    /// List of local image file paths, validated before handler execution.
    ImagePathList,
}

impl ParamKind {
    pub(crate) fn is_media_list(&self) -> bool {
        matches!(
            self,
            ParamKind::TextList | ParamKind::ImageUrlList | ParamKind::ImagePathList
        )
    }

    fn json_schema(&self, description: &str) -> Value {
        let base = match self {
            ParamKind::String => serde_json::json!({"type": "string"}),
            ParamKind::Integer => serde_json::json!({"type": "integer"}),
            ParamKind::Number => serde_json::json!({"type": "number"}),
            ParamKind::Boolean => serde_json::json!({"type": "boolean"}),
            ParamKind::Object => serde_json::json!({"type": "object"}),
            ParamKind::Array => serde_json::json!({"type": "array"}),
            ParamKind::TextList | ParamKind::ImageUrlList | ParamKind::ImagePathList => {
                serde_json::json!({"type": "array", "items": {"type": "string"}})
            }
        };
        let mut schema = base;
        let suffix = match self {
            ParamKind::ImageUrlList => " (image URLs)",
            ParamKind::ImagePathList => " (local image file paths)",
            _ => "",
        };
        if !description.is_empty() || !suffix.is_empty() {
            if let Value::Object(obj) = &mut schema {
                obj.insert(
                    "description".to_string(),
                    Value::String(format!("{description}{suffix}")),
                );
            }
        }
        schema
    }
}

/// What a tool handler may hand back to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Structured result, serialized into the tool message.
    Json(Value),
    /// Plain text result, forwarded verbatim.
    Text(String),
    /// An image; delivered through the two-message pattern (tool-role
    /// acknowledgment plus a follow-up user message carrying the image).
    Image(ImageSource),
    /// An image with explanatory text used in place of the generated
    /// acknowledgment.
    Annotated(String, ImageSource),
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Json(value)
    }
}

/// Type alias for tool handler functions.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<ToolOutput>> + Send>> + Send + Sync>;

/// Tool definition: metadata plus an async handler.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
    /// Parameters whose string-list arguments need multimodal coercion.
    media_params: Vec<(String, ParamKind)>,
    handler: ToolHandler,
}

impl Tool {
    /// Create a tool from a complete JSON Schema.
    ///
    /// Prefer [`tool()`] with typed parameters; this constructor exists for
    /// schemas too rich for the builder (enums, nested objects, patterns).
    /// Tools created this way declare no multimodal parameters.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            media_params: Vec::new(),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Run the handler with already-parsed arguments.
    pub async fn execute(&self, arguments: Value) -> Result<ToolOutput> {
        (self.handler)(arguments).await
    }

    /// Serialized descriptor in the chat completion `tools` format.
    pub fn descriptor(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    pub(crate) fn media_params(&self) -> &[(String, ParamKind)] {
        &self.media_params
    }
}

// The handler is not debuggable; show metadata only.
impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

struct ParamDef {
    name: String,
    kind: ParamKind,
    description: String,
    required: bool,
}

/// Fluent builder for [`Tool`].
pub struct ToolBuilder {
    name: String,
    description: String,
    params: Vec<ParamDef>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Add a required parameter.
    pub fn param(mut self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.params.push(ParamDef {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
        });
        self
    }

    /// Add an optional parameter.
    pub fn optional_param(mut self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.params.push(ParamDef {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
        });
        self
    }

    /// Finalize with a handler.
    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        let mut media_params = Vec::new();
        for param in &self.params {
            properties.insert(param.name.clone(), param.kind.json_schema(&param.description));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
            if param.kind.is_media_list() {
                media_params.push((param.name.clone(), param.kind));
            }
        }
        let input_schema = serde_json::json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": Value::Array(required),
        });
        Tool {
            name: self.name,
            description: self.description,
            input_schema,
            media_params,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

/// Start building a tool.
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}
