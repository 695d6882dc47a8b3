//! Closed JSON schemas for structured model output.
//!
//! Only the subset needed for strict structured output is understood:
//! `type` (string or list), `properties`, `required`,
//! `additionalProperties: false`, `items`, and `enum`. Every object must be
//! closed, so the schema never describes open-ended maps.
//!
//! `enum` lists are sent to the provider as constraints. When re-checking
//! provider output, [`OutputSchema::validate_structure`] ignores them so that
//! enum drift reaches the normalizer, which coerces unknown values.

use serde_json::{Map, Value};
use thiserror::Error;

const KNOWN_TYPES: &[&str] = &[
    "object", "array", "string", "number", "integer", "boolean", "null",
];

/// Why a schema definition was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaDefinitionError {
    #[error("{path}: schema node must be an object with a `type`")]
    MissingType { path: String },

    #[error("{path}: unsupported type {ty:?}")]
    UnknownType { path: String, ty: String },

    #[error("{path}: object schemas need `properties` and `additionalProperties: false`")]
    OpenObject { path: String },

    #[error("{path}: required field {field:?} is not declared in `properties`")]
    UndeclaredRequired { path: String, field: String },

    #[error("{path}: array schemas need `items`")]
    MissingItems { path: String },
}

/// A value did not match the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaMismatch {
    pub path: String,
    pub message: String,
}

/// A named, closed, fully-typed output schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    name: String,
    schema: Value,
}

impl OutputSchema {
    /// Wrap `schema`, refusing anything that is not closed.
    pub fn new(name: impl Into<String>, schema: Value) -> Result<Self, SchemaDefinitionError> {
        check_closed(&schema, "$")?;
        Ok(Self {
            name: name.into(),
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_json(&self) -> &Value {
        &self.schema
    }

    /// Check `value` against the schema, reporting the first mismatch.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaMismatch> {
        validate_node(&self.schema, value, "$", true)
    }

    /// Like [`validate`](Self::validate), but `enum` membership is not checked.
    pub fn validate_structure(&self, value: &Value) -> Result<(), SchemaMismatch> {
        validate_node(&self.schema, value, "$", false)
    }
}

// ---------------------------------------------------------------------------
// Definition checks
// ---------------------------------------------------------------------------

fn declared_types<'a>(
    node: &'a Map<String, Value>,
    path: &str,
) -> Result<Vec<&'a str>, SchemaDefinitionError> {
    let types: Vec<&str> = match node.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    if types.is_empty() {
        return Err(SchemaDefinitionError::MissingType {
            path: path.to_owned(),
        });
    }
    if let Some(bad) = types.iter().find(|t| !KNOWN_TYPES.contains(*t)) {
        return Err(SchemaDefinitionError::UnknownType {
            path: path.to_owned(),
            ty: (*bad).to_owned(),
        });
    }
    Ok(types)
}

fn check_closed(node: &Value, path: &str) -> Result<(), SchemaDefinitionError> {
    let Some(obj) = node.as_object() else {
        return Err(SchemaDefinitionError::MissingType {
            path: path.to_owned(),
        });
    };
    let types = declared_types(obj, path)?;

    if types.contains(&"object") {
        let properties = obj.get("properties").and_then(Value::as_object);
        let closed = obj.get("additionalProperties") == Some(&Value::Bool(false));
        let Some(properties) = properties.filter(|_| closed) else {
            return Err(SchemaDefinitionError::OpenObject {
                path: path.to_owned(),
            });
        };
        for field in obj
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            if !properties.contains_key(field) {
                return Err(SchemaDefinitionError::UndeclaredRequired {
                    path: path.to_owned(),
                    field: field.to_owned(),
                });
            }
        }
        for (key, child) in properties {
            check_closed(child, &format!("{path}.{key}"))?;
        }
    }

    if types.contains(&"array") {
        let items = obj.get("items").ok_or_else(|| SchemaDefinitionError::MissingItems {
            path: path.to_owned(),
        })?;
        check_closed(items, &format!("{path}[]"))?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Value validation
// ---------------------------------------------------------------------------

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_accepts(ty: &str, value: &Value) -> bool {
    match ty {
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        other => other == json_kind(value),
    }
}

fn mismatch(path: &str, message: impl Into<String>) -> SchemaMismatch {
    SchemaMismatch {
        path: path.to_owned(),
        message: message.into(),
    }
}

fn validate_node(
    schema: &Value,
    value: &Value,
    path: &str,
    check_enums: bool,
) -> Result<(), SchemaMismatch> {
    // Definitions were checked in `OutputSchema::new`.
    let Some(node) = schema.as_object() else {
        return Ok(());
    };
    let types = declared_types(node, path).map_err(|e| mismatch(path, e.to_string()))?;

    if !types.iter().any(|t| type_accepts(t, value)) {
        return Err(mismatch(
            path,
            format!("expected {}, got {}", types.join(" or "), json_kind(value)),
        ));
    }

    if let Some(allowed) = node.get("enum").and_then(Value::as_array).filter(|_| check_enums) {
        if !value.is_null() && !allowed.contains(value) {
            return Err(mismatch(path, format!("{value} is not an allowed value")));
        }
    }

    match value {
        Value::Object(fields) => {
            let empty = Map::new();
            let properties = node
                .get("properties")
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            for field in node
                .get("required")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
            {
                if !fields.contains_key(field) {
                    return Err(mismatch(path, format!("missing required field {field:?}")));
                }
            }
            for (key, child) in fields {
                let Some(child_schema) = properties.get(key) else {
                    return Err(mismatch(path, format!("unexpected field {key:?}")));
                };
                validate_node(child_schema, child, &format!("{path}.{key}"), check_enums)?;
            }
        }
        Value::Array(entries) => {
            if let Some(items) = node.get("items") {
                for (i, entry) in entries.iter().enumerate() {
                    validate_node(items, entry, &format!("{path}[{i}]"), check_enums)?;
                }
            }
        }
        _ => {}
    }

    Ok(())
}
