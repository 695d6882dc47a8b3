//! Database query functions for the `user_preferences` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{BudgetLevel, TravelPace, UserPreferences};

/// Insert or replace a user's preferences.
pub async fn upsert_preferences(
    pool: &PgPool,
    user_id: Uuid,
    travel_pace: TravelPace,
    interests: &[String],
    budget_level: BudgetLevel,
) -> Result<UserPreferences> {
    let prefs = sqlx::query_as::<_, UserPreferences>(
        "INSERT INTO user_preferences (user_id, travel_pace, interests, budget_level) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id) DO UPDATE \
         SET travel_pace = EXCLUDED.travel_pace, \
             interests = EXCLUDED.interests, \
             budget_level = EXCLUDED.budget_level, \
             updated_at = now() \
         RETURNING *",
    )
    .bind(user_id)
    .bind(travel_pace)
    .bind(interests)
    .bind(budget_level)
    .fetch_one(pool)
    .await
    .context("failed to upsert preferences")?;

    Ok(prefs)
}

/// Fetch a user's preferences, if they ever saved any.
pub async fn get_preferences(pool: &PgPool, user_id: Uuid) -> Result<Option<UserPreferences>> {
    let prefs =
        sqlx::query_as::<_, UserPreferences>("SELECT * FROM user_preferences WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch preferences")?;

    Ok(prefs)
}
