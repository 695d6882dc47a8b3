//! Error taxonomy shared by the generation and editing services.

use thiserror::Error;
use uuid::Uuid;

use crate::llm::CompletionError;

/// Failure of a plan-level operation.
///
/// Every variant carries enough detail for logs; [`ServiceError::user_message`]
/// gives the stable text shown to end users.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller input is malformed.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Plan, day, item, or user does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The plan belongs to someone else.
    #[error("plan {plan_id} is not owned by user {user_id}")]
    Forbidden { plan_id: Uuid, user_id: Uuid },

    /// The plan's status does not allow the operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The user has no generations left.
    #[error("user {user_id} has no generations remaining")]
    QuotaExceeded { user_id: Uuid },

    /// Stored content exists but cannot be turned into an itinerary.
    #[error("stored itinerary for plan {plan_id} is unrenderable: {reason}")]
    UnrenderableContent { plan_id: Uuid, reason: String },

    /// The model returned output that does not fit the itinerary shape.
    #[error("model output rejected: {0}")]
    SchemaViolation(String),

    /// Provider, network, or timeout failure.
    #[error("external service failure: {0}")]
    ExternalService(String),

    /// Persistence failure.
    #[error("database error: {0:#}")]
    Database(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable, user-facing description. Internal details stay in logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => format!("Invalid request: {msg}"),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Forbidden { .. } => "You do not have access to this plan.".to_owned(),
            Self::Conflict(msg) => format!("This action is not allowed right now: {msg}"),
            Self::QuotaExceeded { .. } => {
                "You have used all of your plan generations.".to_owned()
            }
            Self::UnrenderableContent { .. } => {
                "The saved itinerary for this plan could not be displayed.".to_owned()
            }
            Self::SchemaViolation(_) | Self::ExternalService(_) => {
                "The itinerary could not be generated. Please try again.".to_owned()
            }
            Self::Database(_) => "Something went wrong while saving. Please try again.".to_owned(),
        }
    }

    /// Whether a user may sensibly retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SchemaViolation(_) | Self::ExternalService(_) | Self::Database(_)
        )
    }
}

impl From<CompletionError> for ServiceError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::SchemaViolation(msg) => Self::SchemaViolation(msg),
            other => Self::ExternalService(other.to_string()),
        }
    }
}
