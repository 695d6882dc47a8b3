//! OpenRouter (OpenAI-compatible) chat completions with `json_schema`
//! structured output.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CompletionError, CompletionRequest, StructuredCompletion, enforce_schema};

/// Provider connection settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bearer credential. Generation is unavailable without one.
    pub api_key: Option<String>,
    /// API root, without the trailing `/chat/completions`.
    pub base_url: String,
    /// Default model identifier.
    pub model: String,
    /// Upper bound for one completion call, connection included.
    pub timeout: Duration,
}

impl LlmConfig {
    pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
    pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Whether a non-blank credential is present.
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            model: Self::DEFAULT_MODEL.to_owned(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// Longest provider error body kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Structured completion client for OpenRouter-style endpoints.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl OpenRouterClient {
    /// Build a client. Fails with [`CompletionError::MissingCredential`]
    /// when no API key is configured.
    pub fn new(config: &LlmConfig) -> Result<Self, CompletionError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(CompletionError::MissingCredential)?
            .to_owned();

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            timeout: config.timeout,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> CompletionError {
        if err.is_timeout() {
            CompletionError::Timeout(self.timeout)
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ProviderError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ProviderError {
    code: Option<Value>,
    message: Option<String>,
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_owned();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Strip a Markdown code fence some models wrap around JSON output.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Turn a 2xx response body into the assistant's JSON value.
fn parse_chat_body(body: &str) -> Result<Value, CompletionError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(format!("invalid envelope: {e}")))?;

    // OpenRouter reports some upstream failures inside a 200 response.
    if let Some(err) = response.error {
        let status = err
            .code
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(502);
        return Err(CompletionError::Provider {
            status,
            message: err.message.unwrap_or_else(|| "unknown provider error".to_owned()),
        });
    }

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| CompletionError::MalformedResponse("no assistant content".to_owned()))?;

    serde_json::from_str(strip_code_fence(&content)).map_err(|e| {
        CompletionError::SchemaViolation(format!("assistant content is not JSON: {e}"))
    })
}

#[async_trait]
impl StructuredCompletion for OpenRouterClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Value, CompletionError> {
        let body = ChatRequest {
            model: request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: request.user_prompt,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: request.schema.name(),
                    strict: true,
                    schema: request.schema.as_json(),
                },
            },
        };

        tracing::debug!(model = request.model, endpoint = %self.endpoint, "sending structured completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", "wayplan")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(CompletionError::Provider {
                status: status.as_u16(),
                message: truncate(&text),
            });
        }

        let value = parse_chat_body(&text)?;
        enforce_schema(request.schema, value)
    }
}
