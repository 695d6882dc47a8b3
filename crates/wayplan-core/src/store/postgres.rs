//! [`PlanStore`] backed by PostgreSQL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use wayplan_db::models::{FixedPoint, Plan, PlanStatus, UserPreferences};
use wayplan_db::queries::{fixed_points, plans, preferences, users};

use super::{CommitOutcome, PlanStore};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn load_plan(&self, plan_id: Uuid) -> Result<Option<Plan>> {
        plans::get_plan(&self.pool, plan_id).await
    }

    async fn load_fixed_points(&self, plan_id: Uuid) -> Result<Vec<FixedPoint>> {
        fixed_points::list_fixed_points(&self.pool, plan_id).await
    }

    async fn load_preferences(&self, user_id: Uuid) -> Result<Option<UserPreferences>> {
        preferences::get_preferences(&self.pool, user_id).await
    }

    async fn remaining_generations(&self, user_id: Uuid) -> Result<Option<i32>> {
        users::remaining_generations(&self.pool, user_id).await
    }

    /// Decrement and content write share one transaction; any early return
    /// drops `tx` uncommitted, which rolls both back.
    async fn commit_generation(
        &self,
        plan_id: Uuid,
        user_id: Uuid,
        content: &Value,
    ) -> Result<CommitOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        let Some(remaining) = users::decrement_quota(&mut *tx, user_id).await? else {
            return Ok(CommitOutcome::QuotaExhausted);
        };

        let rows = plans::save_generated_content(&mut *tx, plan_id, content).await?;
        if rows == 0 {
            return Ok(CommitOutcome::PlanUnavailable);
        }

        tx.commit().await.context("failed to commit generation")?;
        Ok(CommitOutcome::Committed { remaining })
    }

    async fn save_plan_content(
        &self,
        plan_id: Uuid,
        content: &Value,
        expected_status: PlanStatus,
    ) -> Result<bool> {
        plans::save_plan_content(&self.pool, plan_id, content, expected_status).await
    }
}
