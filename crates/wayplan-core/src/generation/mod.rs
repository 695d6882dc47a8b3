//! Generation orchestration: eligibility, context, one model call,
//! normalization, and an atomic commit.
//!
//! A request moves `Eligible -> Generating -> Persisted`, or ends in
//! `Failed` with the plan and the user's allowance untouched. The model is
//! called at most once per request; retrying is left to the user.

pub mod prompt;
pub mod schema;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use wayplan_db::models::{Plan, PlanStatus};

use crate::error::ServiceError;
use crate::itinerary::{GeneratedItinerary, normalize_with_reason};
use crate::llm::{CompletionRequest, LlmConfig, StructuredCompletion};
use crate::store::{CommitOutcome, PlanStore};

pub use prompt::{GenerationContext, system_prompt, user_prompt};
pub use schema::itinerary_schema;

/// Settings that shape a generation request.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub model: String,
    /// Language for every human-readable field of the itinerary.
    pub language: String,
    /// Upper bound for the model call, on top of any client timeout.
    pub call_timeout: Duration,
}

impl GenerationConfig {
    pub const DEFAULT_LANGUAGE: &str = "English";
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: LlmConfig::DEFAULT_MODEL.to_owned(),
            language: Self::DEFAULT_LANGUAGE.to_owned(),
            call_timeout: LlmConfig::DEFAULT_TIMEOUT + Duration::from_secs(5),
        }
    }
}

/// Where a generation request is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Eligible,
    Generating,
    Persisted,
    Failed,
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eligible => "eligible",
            Self::Generating => "generating",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        })
    }
}

/// A committed generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub itinerary: GeneratedItinerary,
    /// Allowance left after this generation was charged.
    pub remaining_generations: i32,
}

/// Runs generation requests against a store and an optional model client.
///
/// A missing client is legal at startup; requests then fail as an external
/// service failure once the plan and quota checks pass.
#[derive(Clone)]
pub struct Generator {
    store: Arc<dyn PlanStore>,
    completion: Option<Arc<dyn StructuredCompletion>>,
    config: GenerationConfig,
}

impl Generator {
    pub fn new(
        store: Arc<dyn PlanStore>,
        completion: Option<Arc<dyn StructuredCompletion>>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            store,
            completion,
            config,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Generate (or regenerate) the itinerary of `plan_id` for its owner.
    pub async fn generate(&self, plan_id: Uuid, user_id: Uuid) -> Result<Generation, ServiceError> {
        let result = self.run(plan_id, user_id).await;
        if let Err(err) = &result {
            tracing::warn!(
                plan_id = %plan_id,
                user_id = %user_id,
                phase = %GenerationPhase::Failed,
                error = %err,
                "generation failed"
            );
        }
        result
    }

    async fn run(&self, plan_id: Uuid, user_id: Uuid) -> Result<Generation, ServiceError> {
        // 1. Preconditions, cheapest first. Nothing below may reach the model
        //    unless all of them hold.
        let plan = self.check_eligible(plan_id, user_id).await?;
        let client = self.completion.as_ref().ok_or_else(|| {
            ServiceError::ExternalService("no LLM provider credential is configured".to_owned())
        })?;
        tracing::info!(plan_id = %plan_id, phase = %GenerationPhase::Eligible, "plan eligible for generation");

        // 2. Context assembly.
        let fixed_points = self.store.load_fixed_points(plan_id).await?;
        let preferences = self.store.load_preferences(user_id).await?;
        let ctx = GenerationContext::new(&plan, fixed_points, preferences, &self.config.language);
        let system = system_prompt(&ctx);
        let user = user_prompt(&ctx);
        let schema = itinerary_schema()
            .map_err(|e| ServiceError::ExternalService(format!("itinerary schema: {e}")))?;

        // 3. One model call, bounded.
        tracing::info!(
            plan_id = %plan_id,
            phase = %GenerationPhase::Generating,
            provider = client.name(),
            model = %self.config.model,
            fixed_points = ctx.fixed_points.len(),
            "calling model"
        );
        let request = CompletionRequest {
            system_prompt: &system,
            user_prompt: &user,
            schema: &schema,
            model: &self.config.model,
        };
        let raw = match tokio::time::timeout(self.config.call_timeout, client.complete(&request))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ServiceError::ExternalService(format!(
                    "model call exceeded {:?}",
                    self.config.call_timeout
                )));
            }
        };

        // 4. The model's answer is untrusted even after schema enforcement.
        let itinerary = normalize_with_reason(&raw)
            .map_err(|reason| ServiceError::SchemaViolation(reason.to_string()))?;

        // 5. Content, status, and quota in one unit.
        let content = itinerary.to_json();
        match self.store.commit_generation(plan_id, user_id, &content).await? {
            CommitOutcome::Committed { remaining } => {
                tracing::info!(
                    plan_id = %plan_id,
                    phase = %GenerationPhase::Persisted,
                    days = itinerary.days.len(),
                    items = itinerary.item_count(),
                    remaining_generations = remaining,
                    "itinerary generated"
                );
                Ok(Generation {
                    itinerary,
                    remaining_generations: remaining,
                })
            }
            CommitOutcome::QuotaExhausted => Err(ServiceError::QuotaExceeded { user_id }),
            CommitOutcome::PlanUnavailable => Err(ServiceError::conflict(format!(
                "plan {plan_id} was archived or deleted during generation"
            ))),
        }
    }

    async fn check_eligible(&self, plan_id: Uuid, user_id: Uuid) -> Result<Plan, ServiceError> {
        let plan = self
            .store
            .load_plan(plan_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("plan {plan_id}")))?;

        if plan.user_id != user_id {
            return Err(ServiceError::Forbidden { plan_id, user_id });
        }
        if plan.status == PlanStatus::Archived {
            return Err(ServiceError::conflict(format!(
                "plan {plan_id} is archived and cannot be regenerated"
            )));
        }

        match self.store.remaining_generations(user_id).await? {
            Some(n) if n > 0 => Ok(plan),
            Some(_) => Err(ServiceError::QuotaExceeded { user_id }),
            None => Err(ServiceError::not_found(format!("user {user_id}"))),
        }
    }
}
