//! Database query functions for the `fixed_points` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::FixedPoint;

/// Column values for a new fixed point.
#[derive(Debug, Clone)]
pub struct NewFixedPoint<'a> {
    pub location: &'a str,
    pub event_at: DateTime<Utc>,
    pub event_duration: Option<i32>,
    pub description: Option<&'a str>,
}

/// Insert a fixed point into a plan.
pub async fn insert_fixed_point(
    pool: &PgPool,
    plan_id: Uuid,
    new: &NewFixedPoint<'_>,
) -> Result<FixedPoint> {
    let point = sqlx::query_as::<_, FixedPoint>(
        "INSERT INTO fixed_points (plan_id, location, event_at, event_duration, description) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(plan_id)
    .bind(new.location)
    .bind(new.event_at)
    .bind(new.event_duration)
    .bind(new.description)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert fixed point for plan {plan_id}"))?;

    Ok(point)
}

/// List a plan's fixed points in chronological order.
pub async fn list_fixed_points(pool: &PgPool, plan_id: Uuid) -> Result<Vec<FixedPoint>> {
    let points = sqlx::query_as::<_, FixedPoint>(
        "SELECT * FROM fixed_points WHERE plan_id = $1 ORDER BY event_at, created_at",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .context("failed to list fixed points")?;

    Ok(points)
}

/// Delete a fixed point from a plan. Returns `false` when nothing matched.
pub async fn delete_fixed_point(pool: &PgPool, plan_id: Uuid, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM fixed_points WHERE id = $1 AND plan_id = $2")
        .bind(id)
        .bind(plan_id)
        .execute(pool)
        .await
        .context("failed to delete fixed point")?;

    Ok(result.rows_affected() > 0)
}
