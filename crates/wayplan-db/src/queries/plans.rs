//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{Plan, PlanStatus};

/// User-editable plan columns.
#[derive(Debug, Clone)]
pub struct PlanDetails<'a> {
    pub name: &'a str,
    pub destination: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<&'a str>,
}

/// Insert a new draft plan. Returns the inserted plan with server-generated
/// defaults (id, timestamps, status).
pub async fn insert_plan(pool: &PgPool, user_id: Uuid, details: &PlanDetails<'_>) -> Result<Plan> {
    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (user_id, name, destination, start_date, end_date, notes) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(details.name)
    .bind(details.destination)
    .bind(details.start_date)
    .bind(details.end_date)
    .bind(details.notes)
    .fetch_one(pool)
    .await
    .context("failed to insert plan")?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// List a user's plans, newest first.
pub async fn list_plans_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list plans")?;

    Ok(plans)
}

/// Update the editable columns of a non-archived plan.
///
/// Returns `None` when the plan does not exist or is archived.
pub async fn update_plan_details(
    pool: &PgPool,
    id: Uuid,
    details: &PlanDetails<'_>,
) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE plans \
         SET name = $2, destination = $3, start_date = $4, end_date = $5, notes = $6, \
             updated_at = now() \
         WHERE id = $1 AND status <> 'archived' \
         RETURNING *",
    )
    .bind(id)
    .bind(details.name)
    .bind(details.destination)
    .bind(details.start_date)
    .bind(details.end_date)
    .bind(details.notes)
    .fetch_optional(pool)
    .await
    .context("failed to update plan")?;

    Ok(plan)
}

/// Move a plan to `archived`.
///
/// Returns the updated plan, or `None` when the plan does not exist or is
/// already archived.
pub async fn archive_plan(pool: &PgPool, id: Uuid) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE plans \
         SET status = 'archived', updated_at = now() \
         WHERE id = $1 AND status <> 'archived' \
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to archive plan")?;

    Ok(plan)
}

/// Store freshly generated content and mark the plan `generated`.
///
/// Refuses archived plans. Returns the number of rows written (0 or 1) so
/// callers inside a transaction can roll back when the plan vanished or was
/// archived concurrently.
pub async fn save_generated_content<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    content: &serde_json::Value,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE plans \
         SET generated_content = $2, status = 'generated', \
             generated_at = now(), updated_at = now() \
         WHERE id = $1 AND status <> 'archived'",
    )
    .bind(id)
    .bind(content)
    .execute(executor)
    .await
    .context("failed to save generated content")?;

    Ok(result.rows_affected())
}

/// Replace the whole content document of a plan whose status is still
/// `expected_status`. Returns `false` when the plan is gone or its status
/// changed underneath the caller.
pub async fn save_plan_content<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    content: &serde_json::Value,
    expected_status: PlanStatus,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE plans \
         SET generated_content = $2, updated_at = now() \
         WHERE id = $1 AND status = $3",
    )
    .bind(id)
    .bind(content)
    .bind(expected_status)
    .execute(executor)
    .await
    .context("failed to save plan content")?;

    Ok(result.rows_affected() > 0)
}

/// Delete a plan. Fixed points and feedback go with it (`ON DELETE CASCADE`).
pub async fn delete_plan(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM plans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete plan")?;

    Ok(result.rows_affected() > 0)
}
