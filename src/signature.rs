//! Explicit function signatures.
//!
//! A [`FunctionSignature`] declares everything prompt assembly needs to know
//! about one LLM-backed call: its name, docstring, bound parameters with
//! their declared types and runtime values, and the declared return type.
//! Each built signature carries a fresh trace id for log correlation.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::multimodal::ArgValue;
use crate::typedesc::TypeSpec;

/// One bound parameter: declared type plus the value for this invocation.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub spec: TypeSpec,
    pub value: ArgValue,
}

/// A fully bound LLM function invocation.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub docstring: String,
    pub params: Vec<Param>,
    pub return_type: TypeSpec,
    /// `{name}_{uuid}`, generated at build time.
    pub trace_id: String,
}

impl FunctionSignature {
    pub fn builder(name: impl Into<String>) -> FunctionSignatureBuilder {
        FunctionSignatureBuilder {
            name: name.into(),
            docstring: String::new(),
            params: Vec::new(),
            return_type: None,
        }
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Whether any bound parameter's declared type carries multimodal
    /// content.
    pub fn has_multimodal_params(&self) -> bool {
        self.params.iter().any(|p| p.spec.is_multimodal())
    }
}

pub struct FunctionSignatureBuilder {
    name: String,
    docstring: String,
    params: Vec<Param>,
    return_type: Option<TypeSpec>,
}

impl FunctionSignatureBuilder {
    /// Task description for the model. Placeholders of the form `{name}`
    /// can be substituted at prompt-build time.
    pub fn docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = docstring.into();
        self
    }

    pub fn param(
        mut self,
        name: impl Into<String>,
        spec: TypeSpec,
        value: impl Into<ArgValue>,
    ) -> Self {
        self.params.push(Param {
            name: name.into(),
            spec,
            value: value.into(),
        });
        self
    }

    pub fn returns(mut self, spec: TypeSpec) -> Self {
        self.return_type = Some(spec);
        self
    }

    pub fn build(self) -> Result<FunctionSignature> {
        if self.name.trim().is_empty() {
            return Err(Error::config("function signature requires a non-empty name"));
        }
        let mut seen = std::collections::HashSet::new();
        for param in &self.params {
            if !seen.insert(param.name.as_str()) {
                return Err(Error::config(format!(
                    "duplicate parameter '{}' in signature '{}'",
                    param.name, self.name
                )));
            }
        }
        let trace_id = format!("{}_{}", self.name, Uuid::new_v4());
        Ok(FunctionSignature {
            name: self.name,
            docstring: self.docstring,
            params: self.params,
            return_type: self.return_type.unwrap_or(TypeSpec::String),
            trace_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_with_generated_trace_id() {
        let sig = FunctionSignature::builder("summarize")
            .docstring("Summarize the given text.")
            .param("text", TypeSpec::String, ArgValue::json(json!("hello")))
            .returns(TypeSpec::String)
            .build()
            .unwrap();
        assert!(sig.trace_id.starts_with("summarize_"));
        assert_eq!(sig.params.len(), 1);
        assert_eq!(sig.return_type, TypeSpec::String);
    }

    #[test]
    fn trace_ids_are_unique_per_build() {
        let build = || {
            FunctionSignature::builder("f")
                .build()
                .unwrap()
                .trace_id
        };
        assert_ne!(build(), build());
    }

    #[test]
    fn rejects_empty_name_and_duplicate_params() {
        assert!(FunctionSignature::builder("  ").build().is_err());

        let err = FunctionSignature::builder("f")
            .param("a", TypeSpec::String, ArgValue::json(json!(1)))
            .param("a", TypeSpec::Integer, ArgValue::json(json!(2)))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate parameter 'a'"));
    }

    #[test]
    fn return_type_defaults_to_string() {
        let sig = FunctionSignature::builder("f").build().unwrap();
        assert_eq!(sig.return_type, TypeSpec::String);
    }

    #[test]
    fn detects_multimodal_params() {
        let sig = FunctionSignature::builder("caption")
            .param(
                "image",
                TypeSpec::ImageUrl,
                ArgValue::media(crate::multimodal::ImgUrl::new("https://example.com/a.png").unwrap()),
            )
            .build()
            .unwrap();
        assert!(sig.has_multimodal_params());

        let sig = FunctionSignature::builder("add")
            .param("a", TypeSpec::Integer, ArgValue::json(json!(1)))
            .build()
            .unwrap();
        assert!(!sig.has_multimodal_params());
    }
}
