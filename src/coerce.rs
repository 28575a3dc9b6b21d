//! Coercion of the model's final text into a declared return type.
//!
//! Two stages: the raw text is first shaped into a JSON value under the
//! declared [`TypeSpec`] (scalar parsing for primitives, fence-stripping
//! plus JSON parsing plus shape validation for structured types), then
//! deserialized into the caller's concrete type. Failures are fatal to the
//! call and name the offending function; retrying a parse of unchanged
//! model output would not help.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::typedesc::TypeSpec;

/// Coerces `raw` into `T` as declared by `spec`. `function` names the LLM
/// function for error messages.
pub fn process_response<T: DeserializeOwned>(
    raw: &str,
    spec: &TypeSpec,
    function: &str,
) -> Result<T> {
    let shaped = shape(raw, spec).map_err(|message| Error::Coercion {
        function: function.to_string(),
        target: target_name(spec),
        message,
    })?;
    serde_json::from_value(shaped).map_err(|e| Error::Coercion {
        function: function.to_string(),
        target: target_name(spec),
        message: e.to_string(),
    })
}

fn target_name(spec: &TypeSpec) -> String {
    match spec {
        TypeSpec::Model(model) => model.name.clone(),
        other => other.describe(),
    }
}

/// Raw text to JSON value under the declared shape.
fn shape(raw: &str, spec: &TypeSpec) -> std::result::Result<Value, String> {
    match spec {
        TypeSpec::String | TypeSpec::Text => Ok(Value::String(raw.to_string())),
        TypeSpec::ImageUrl | TypeSpec::ImagePath => Ok(Value::String(raw.trim().to_string())),
        TypeSpec::Integer => {
            let trimmed = raw.trim();
            trimmed
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{trimmed}' is not an integer"))
        }
        TypeSpec::Float => {
            let trimmed = raw.trim();
            let parsed = trimmed
                .parse::<f64>()
                .map_err(|_| format!("'{trimmed}' is not a number"))?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| format!("'{trimmed}' is not a finite number"))
        }
        TypeSpec::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(format!("'{other}' is not a boolean")),
        },
        TypeSpec::Null => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                Ok(Value::Null)
            } else {
                Err(format!("'{trimmed}' is not null"))
            }
        }
        TypeSpec::List(_) | TypeSpec::Map(_, _) | TypeSpec::Model(_) | TypeSpec::Union(_) => {
            let stripped = strip_code_fences(raw);
            let value: Value = serde_json::from_str(stripped.trim())
                .map_err(|e| format!("invalid JSON: {e}"))?;
            validate(&value, spec, "$")?;
            Ok(value)
        }
    }
}

/// Removes a surrounding markdown code fence if present. Models often wrap
/// JSON in ``` blocks despite instructions not to.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence's language tag line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Structural validation of a parsed value against a declared shape.
/// `path` tracks the location for error messages.
fn validate(value: &Value, spec: &TypeSpec, path: &str) -> std::result::Result<(), String> {
    match spec {
        TypeSpec::String | TypeSpec::Text | TypeSpec::ImageUrl | TypeSpec::ImagePath => {
            if value.is_string() {
                Ok(())
            } else {
                Err(format!("{path}: expected a string, got {}", kind_of(value)))
            }
        }
        TypeSpec::Integer => {
            if value.is_i64() || value.is_u64() {
                Ok(())
            } else {
                Err(format!("{path}: expected an integer, got {}", kind_of(value)))
            }
        }
        TypeSpec::Float => {
            if value.is_number() {
                Ok(())
            } else {
                Err(format!("{path}: expected a number, got {}", kind_of(value)))
            }
        }
        TypeSpec::Boolean => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(format!("{path}: expected a boolean, got {}", kind_of(value)))
            }
        }
        TypeSpec::Null => {
            if value.is_null() {
                Ok(())
            } else {
                Err(format!("{path}: expected null, got {}", kind_of(value)))
            }
        }
        TypeSpec::List(item) => {
            let Some(items) = value.as_array() else {
                return Err(format!("{path}: expected an array, got {}", kind_of(value)));
            };
            for (i, element) in items.iter().enumerate() {
                validate(element, item, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        TypeSpec::Map(_, value_spec) => {
            let Some(object) = value.as_object() else {
                return Err(format!("{path}: expected an object, got {}", kind_of(value)));
            };
            for (key, element) in object {
                validate(element, value_spec, &format!("{path}.{key}"))?;
            }
            Ok(())
        }
        TypeSpec::Union(arms) => {
            for arm in arms {
                if validate(value, arm, path).is_ok() {
                    return Ok(());
                }
            }
            Err(format!(
                "{path}: value matches no alternative of {}",
                spec.describe()
            ))
        }
        TypeSpec::Model(model) => {
            let Some(object) = value.as_object() else {
                return Err(format!(
                    "{path}: expected a {} object, got {}",
                    model.name,
                    kind_of(value)
                ));
            };
            for field in &model.fields {
                match object.get(&field.name) {
                    Some(field_value) => {
                        validate(field_value, &field.spec, &format!("{path}.{}", field.name))?;
                    }
                    None if field.required => {
                        return Err(format!(
                            "{path}: missing required field '{}' of {}",
                            field.name, model.name
                        ));
                    }
                    None => {}
                }
            }
            Ok(())
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
