//! Database query functions for the `plan_feedback` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::PlanFeedback;

/// Record feedback on a plan.
pub async fn insert_feedback(
    pool: &PgPool,
    plan_id: Uuid,
    user_id: Uuid,
    helpful: bool,
    comment: Option<&str>,
) -> Result<PlanFeedback> {
    let feedback = sqlx::query_as::<_, PlanFeedback>(
        "INSERT INTO plan_feedback (plan_id, user_id, helpful, comment) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(plan_id)
    .bind(user_id)
    .bind(helpful)
    .bind(comment)
    .fetch_one(pool)
    .await
    .context("failed to insert feedback")?;

    Ok(feedback)
}

/// List feedback for a plan, newest first.
pub async fn list_feedback(pool: &PgPool, plan_id: Uuid) -> Result<Vec<PlanFeedback>> {
    let rows = sqlx::query_as::<_, PlanFeedback>(
        "SELECT * FROM plan_feedback WHERE plan_id = $1 ORDER BY created_at DESC",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .context("failed to list feedback")?;

    Ok(rows)
}
