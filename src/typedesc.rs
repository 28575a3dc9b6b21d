//! Declarative type descriptions for prompts and response validation.
//!
//! [`TypeSpec`] is a closed description of the shapes this crate knows how to
//! explain to a model and check a response against. It drives three prompt
//! artifacts (a prose description, a structural JSON sketch, and an example
//! value) plus the shape validation step of response coercion.

use serde_json::{Map, Value, json};

/// Recursion limit for nested model expansion.
const MAX_DEPTH: usize = 5;

/// Declared shape of a function argument or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    String,
    Integer,
    Float,
    Boolean,
    Null,
    /// Homogeneous list.
    List(Box<TypeSpec>),
    /// String-keyed map; the first element describes the key, kept for the
    /// prose rendering only.
    Map(Box<TypeSpec>, Box<TypeSpec>),
    /// Named structured model.
    Model(ModelSchema),
    /// One of several alternatives.
    Union(Vec<TypeSpec>),
    /// Multimodal: text destined for a content fragment.
    Text,
    /// Multimodal: image referenced by URL.
    ImageUrl,
    /// Multimodal: local image file.
    ImagePath,
}

/// Schema of a named structured model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub spec: TypeSpec,
    pub description: String,
    pub required: bool,
    /// JSON-expressible default, echoed in examples when present.
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, spec: TypeSpec, description: impl Into<String>) -> Self {
        FieldSpec {
            name: name.into(),
            spec,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, spec: TypeSpec, description: impl Into<String>) -> Self {
        FieldSpec {
            name: name.into(),
            spec,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

impl ModelSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        ModelSchema {
            name: name.into(),
            fields,
        }
    }
}

impl TypeSpec {
    /// Human-readable description used in system prompts.
    pub fn describe(&self) -> String {
        match self {
            TypeSpec::String => "string".to_string(),
            TypeSpec::Integer => "integer".to_string(),
            TypeSpec::Float => "number".to_string(),
            TypeSpec::Boolean => "boolean".to_string(),
            TypeSpec::Null => "null".to_string(),
            TypeSpec::Text => "text".to_string(),
            TypeSpec::ImageUrl => "image (by URL)".to_string(),
            TypeSpec::ImagePath => "image (local file)".to_string(),
            TypeSpec::List(item) => format!("List[{}]", item.describe()),
            TypeSpec::Map(key, value) => {
                format!("Dict[{}, {}]", key.describe(), value.describe())
            }
            TypeSpec::Union(arms) => arms
                .iter()
                .map(TypeSpec::describe)
                .collect::<Vec<_>>()
                .join(" | "),
            TypeSpec::Model(model) => {
                let mut lines = vec![format!(
                    "{} (structured model) with the following fields:",
                    model.name
                )];
                for field in &model.fields {
                    let requirement = if field.required { "required" } else { "optional" };
                    let mut line = format!(
                        "  - {} ({}, {}): {}",
                        field.name,
                        field.spec.describe_short(),
                        requirement,
                        field.description
                    );
                    if let Some(default) = &field.default {
                        line.push_str(&format!(", default: {default}"));
                    }
                    lines.push(line);
                }
                lines.join("\n")
            }
        }
    }

    /// One-line rendering for field listings, avoiding nested multi-line
    /// model expansion.
    fn describe_short(&self) -> String {
        match self {
            TypeSpec::Model(model) => model.name.clone(),
            other => other.describe(),
        }
    }

    /// Example value shown in prompts next to the structural sketch.
    pub fn example(&self) -> Value {
        self.example_at(0)
    }

    fn example_at(&self, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            return json!({});
        }
        match self {
            TypeSpec::String | TypeSpec::Text => json!("example"),
            TypeSpec::Integer => json!(123),
            TypeSpec::Float => json!(1.23),
            TypeSpec::Boolean => json!(true),
            TypeSpec::Null => Value::Null,
            TypeSpec::ImageUrl => json!("https://example.com/image.png"),
            TypeSpec::ImagePath => json!("/path/to/image.png"),
            TypeSpec::List(item) => json!([item.example_at(depth + 1)]),
            TypeSpec::Map(_, value) => json!({"key": value.example_at(depth + 1)}),
            TypeSpec::Union(arms) => arms
                .iter()
                .find(|arm| !matches!(arm, TypeSpec::Null))
                .map(|arm| arm.example_at(depth + 1))
                .unwrap_or(Value::Null),
            TypeSpec::Model(model) => {
                let mut object = Map::new();
                for field in &model.fields {
                    let value = field
                        .default
                        .clone()
                        .unwrap_or_else(|| field.spec.example_at(depth + 1));
                    object.insert(field.name.clone(), value);
                }
                Value::Object(object)
            }
        }
    }

    /// Structural JSON sketch (JSON-Schema-flavored) shown in prompts for
    /// complex return types.
    pub fn structural_json(&self) -> Value {
        self.structural_at(0)
    }

    fn structural_at(&self, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            return json!({"type": "object", "note": "depth_limit"});
        }
        match self {
            TypeSpec::String => json!({"type": "string"}),
            TypeSpec::Integer => json!({"type": "integer"}),
            TypeSpec::Float => json!({"type": "number"}),
            TypeSpec::Boolean => json!({"type": "boolean"}),
            TypeSpec::Null => json!({"type": "null"}),
            TypeSpec::Text => json!({"type": "string"}),
            TypeSpec::ImageUrl | TypeSpec::ImagePath => {
                json!({"type": "string", "description": "image reference"})
            }
            TypeSpec::List(item) => json!({
                "type": "array",
                "items": item.structural_at(depth + 1),
            }),
            TypeSpec::Map(_, value) => json!({
                "type": "object",
                "additionalProperties": value.structural_at(depth + 1),
            }),
            TypeSpec::Union(arms) => {
                let non_null: Vec<&TypeSpec> = arms
                    .iter()
                    .filter(|arm| !matches!(arm, TypeSpec::Null))
                    .collect();
                match non_null.as_slice() {
                    [single] => single.structural_at(depth + 1),
                    many => json!({
                        "anyOf": many
                            .iter()
                            .map(|arm| arm.structural_at(depth + 1))
                            .collect::<Vec<_>>(),
                    }),
                }
            }
            TypeSpec::Model(model) => {
                let required: Vec<&str> = model
                    .fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| f.name.as_str())
                    .collect();
                let mut properties = Map::new();
                for field in &model.fields {
                    let mut child = field.spec.structural_at(depth + 1);
                    if !field.description.is_empty() {
                        if let Value::Object(obj) = &mut child {
                            obj.entry("description".to_string())
                                .or_insert_with(|| json!(field.description));
                        }
                    }
                    if let (Some(default), Value::Object(obj)) = (&field.default, &mut child) {
                        obj.insert("default".to_string(), default.clone());
                    }
                    properties.insert(field.name.clone(), child);
                }
                json!({
                    "type": "object",
                    "title": model.name,
                    "required": required,
                    "properties": Value::Object(properties),
                })
            }
        }
    }

    /// Complex types get the structural sketch and example appended to the
    /// return-type description; scalars are described in prose only.
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            TypeSpec::List(_) | TypeSpec::Map(_, _) | TypeSpec::Model(_) | TypeSpec::Union(_)
        )
    }

    /// Whether a value of this type contributes multimodal content fragments.
    pub fn is_multimodal(&self) -> bool {
        match self {
            TypeSpec::Text | TypeSpec::ImageUrl | TypeSpec::ImagePath => true,
            TypeSpec::List(item) => item.is_multimodal(),
            TypeSpec::Union(arms) => arms.iter().any(TypeSpec::is_multimodal),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_schema() -> ModelSchema {
        ModelSchema::new(
            "Person",
            vec![
                FieldSpec::required("name", TypeSpec::String, "full name"),
                FieldSpec::required("age", TypeSpec::Integer, "age in years"),
                FieldSpec::optional("email", TypeSpec::String, "contact email")
                    .with_default(json!("none@example.com")),
            ],
        )
    }

    #[test]
    fn describes_scalars_and_containers() {
        assert_eq!(TypeSpec::String.describe(), "string");
        assert_eq!(
            TypeSpec::List(Box::new(TypeSpec::Integer)).describe(),
            "List[integer]"
        );
        assert_eq!(
            TypeSpec::Map(Box::new(TypeSpec::String), Box::new(TypeSpec::Float)).describe(),
            "Dict[string, number]"
        );
        assert_eq!(
            TypeSpec::Union(vec![TypeSpec::String, TypeSpec::Null]).describe(),
            "string | null"
        );
    }

    #[test]
    fn model_description_lists_fields_with_requirement() {
        let desc = TypeSpec::Model(person_schema()).describe();
        assert!(desc.starts_with("Person (structured model)"));
        assert!(desc.contains("- name (string, required): full name"));
        assert!(desc.contains("- email (string, optional): contact email"));
        assert!(desc.contains("default: \"none@example.com\""));
    }

    #[test]
    fn example_uses_fixed_scalars_and_defaults() {
        let example = TypeSpec::Model(person_schema()).example();
        assert_eq!(example["name"], "example");
        assert_eq!(example["age"], 123);
        assert_eq!(example["email"], "none@example.com");

        assert_eq!(TypeSpec::Float.example(), json!(1.23));
        assert_eq!(
            TypeSpec::List(Box::new(TypeSpec::Boolean)).example(),
            json!([true])
        );
    }

    #[test]
    fn union_example_picks_first_non_null_arm() {
        let spec = TypeSpec::Union(vec![TypeSpec::Null, TypeSpec::Integer]);
        assert_eq!(spec.example(), json!(123));
        assert_eq!(TypeSpec::Union(vec![TypeSpec::Null]).example(), Value::Null);
    }

    #[test]
    fn structural_json_expands_models() {
        let sketch = TypeSpec::Model(person_schema()).structural_json();
        assert_eq!(sketch["type"], "object");
        assert_eq!(sketch["title"], "Person");
        assert_eq!(sketch["required"], json!(["name", "age"]));
        assert_eq!(sketch["properties"]["name"]["type"], "string");
        assert_eq!(sketch["properties"]["name"]["description"], "full name");
    }

    #[test]
    fn single_armed_union_collapses_in_structural_json() {
        let spec = TypeSpec::Union(vec![TypeSpec::Integer, TypeSpec::Null]);
        assert_eq!(spec.structural_json(), json!({"type": "integer"}));

        let spec = TypeSpec::Union(vec![TypeSpec::Integer, TypeSpec::String]);
        assert_eq!(
            spec.structural_json(),
            json!({"anyOf": [{"type": "integer"}, {"type": "string"}]})
        );
    }

    #[test]
    fn deep_nesting_hits_depth_guard_without_recursing_forever() {
        let mut spec = TypeSpec::String;
        for _ in 0..20 {
            spec = TypeSpec::List(Box::new(spec));
        }
        // Must terminate; the innermost layers collapse to the guard value.
        let sketch = spec.structural_json();
        assert_eq!(sketch["type"], "array");
        let example = spec.example();
        assert!(example.is_array());
    }

    #[test]
    fn multimodal_detection_sees_through_lists_and_unions() {
        assert!(TypeSpec::ImagePath.is_multimodal());
        assert!(TypeSpec::List(Box::new(TypeSpec::ImageUrl)).is_multimodal());
        assert!(TypeSpec::Union(vec![TypeSpec::String, TypeSpec::Text]).is_multimodal());
        assert!(!TypeSpec::List(Box::new(TypeSpec::Integer)).is_multimodal());
        assert!(!TypeSpec::String.is_multimodal());
    }

    #[test]
    fn complexity_drives_prompt_enrichment() {
        assert!(TypeSpec::Model(person_schema()).is_complex());
        assert!(TypeSpec::List(Box::new(TypeSpec::String)).is_complex());
        assert!(!TypeSpec::String.is_complex());
        assert!(!TypeSpec::ImagePath.is_complex());
    }
}
