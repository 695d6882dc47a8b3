//! The narrow persistence interface consumed by generation and editing.
//!
//! The trait is object-safe so services hold an `Arc<dyn PlanStore>`;
//! [`PgStore`] backs it with PostgreSQL and [`MemoryStore`] with in-process
//! maps for tests and demos.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use wayplan_db::models::{FixedPoint, Plan, PlanStatus, UserPreferences};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of the atomic generation commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Content saved, status `generated`, one unit of allowance consumed.
    Committed { remaining: i32 },
    /// The allowance ran out between the eligibility check and the commit.
    QuotaExhausted,
    /// The plan was deleted or archived while the model was running.
    PlanUnavailable,
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn load_plan(&self, plan_id: Uuid) -> Result<Option<Plan>>;

    /// Fixed points of a plan, ordered by `event_at`.
    async fn load_fixed_points(&self, plan_id: Uuid) -> Result<Vec<FixedPoint>>;

    async fn load_preferences(&self, user_id: Uuid) -> Result<Option<UserPreferences>>;

    /// Remaining generation allowance, `None` for an unknown user.
    async fn remaining_generations(&self, user_id: Uuid) -> Result<Option<i32>>;

    /// Save generated content, set status `generated`, and consume one unit
    /// of allowance, all or nothing.
    async fn commit_generation(
        &self,
        plan_id: Uuid,
        user_id: Uuid,
        content: &Value,
    ) -> Result<CommitOutcome>;

    /// Replace the whole content document if the plan still has
    /// `expected_status`. Returns `false` otherwise.
    async fn save_plan_content(
        &self,
        plan_id: Uuid,
        content: &Value,
        expected_status: PlanStatus,
    ) -> Result<bool>;
}
