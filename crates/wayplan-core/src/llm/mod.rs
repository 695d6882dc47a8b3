//! Structured-output completion against an LLM provider.
//!
//! The [`StructuredCompletion`] trait is the seam between generation logic
//! and a concrete provider. Implementations must request constrained JSON
//! output for the supplied [`OutputSchema`] and re-check the structure of the
//! result before returning. No retries happen at this layer.

pub mod openrouter;
pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use openrouter::{LlmConfig, OpenRouterClient};
pub use schema::{OutputSchema, SchemaDefinitionError, SchemaMismatch};

/// One structured completion call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub schema: &'a OutputSchema,
    pub model: &'a str,
}

/// Failure of a structured completion call.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no LLM provider credential is configured")]
    MissingCredential,

    #[error("request to provider failed: {0}")]
    Transport(String),

    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("provider returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("provider response is malformed: {0}")]
    MalformedResponse(String),

    #[error("provider output violates the schema: {0}")]
    SchemaViolation(String),
}

/// Adapter interface for LLM providers with structured output support.
#[async_trait]
pub trait StructuredCompletion: Send + Sync {
    /// Human-readable provider name (e.g. "openrouter").
    fn name(&self) -> &str;

    /// Run one completion and return a value that satisfies `request.schema`.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Value, CompletionError>;
}

// Compile-time assertion: the trait can be used as `dyn StructuredCompletion`.
const _: () = {
    fn _assert_object_safe(_: &dyn StructuredCompletion) {}
};

/// Re-check the structure of a provider value against the schema it was asked
/// to satisfy. Values outside an `enum` list pass through to the normalizer.
pub fn enforce_schema(schema: &OutputSchema, value: Value) -> Result<Value, CompletionError> {
    schema
        .validate_structure(&value)
        .map_err(|m| CompletionError::SchemaViolation(m.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct EchoCompletion(Value);

    #[async_trait]
    impl StructuredCompletion for EchoCompletion {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Value, CompletionError> {
            enforce_schema(request.schema, self.0.clone())
        }
    }

    fn label_schema() -> OutputSchema {
        OutputSchema::new(
            "label",
            json!({
                "type": "object",
                "additionalProperties": false,
                "required": ["label"],
                "properties": { "label": { "type": "string" } }
            }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn trait_object_enforces_schema() {
        let schema = label_schema();
        let request = CompletionRequest {
            system_prompt: "sys",
            user_prompt: "user",
            schema: &schema,
            model: "test-model",
        };

        let ok: Box<dyn StructuredCompletion> = Box::new(EchoCompletion(json!({"label": "x"})));
        assert_eq!(ok.complete(&request).await.unwrap(), json!({"label": "x"}));

        let bad: Box<dyn StructuredCompletion> = Box::new(EchoCompletion(json!({"label": 1})));
        let err = bad.complete(&request).await.unwrap_err();
        assert!(matches!(err, CompletionError::SchemaViolation(_)), "{err}");
    }
}
