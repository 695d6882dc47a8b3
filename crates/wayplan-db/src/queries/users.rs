//! Database query functions for the `users` table and the per-user
//! generation allowance.

use anyhow::{Context, Result};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::User;

/// Insert a user with an initial generation allowance.
pub async fn insert_user(pool: &PgPool, email: &str, generations: i32) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, generations_remaining) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(email)
    .bind(generations)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert user {email:?}"))?;

    Ok(user)
}

/// Fetch a user by ID.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user")?;

    Ok(user)
}

/// Fetch a user by email address.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by email")?;

    Ok(user)
}

/// Current generation allowance, or `None` when the user does not exist.
pub async fn remaining_generations<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<i32>> {
    let remaining: Option<i32> =
        sqlx::query_scalar("SELECT generations_remaining FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("failed to read generation allowance")?;

    Ok(remaining)
}

/// Atomically take one unit of generation allowance.
///
/// Returns the remaining count after the decrement, or `None` if the user
/// has nothing left (or does not exist). The conditional update never lets
/// the counter go below zero, whatever the interleaving of callers.
pub async fn decrement_quota<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<Option<i32>> {
    let remaining: Option<i32> = sqlx::query_scalar(
        "UPDATE users \
         SET generations_remaining = generations_remaining - 1 \
         WHERE id = $1 AND generations_remaining > 0 \
         RETURNING generations_remaining",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to decrement generation allowance")?;

    Ok(remaining)
}

/// Overwrite a user's generation allowance.
pub async fn set_quota(pool: &PgPool, id: Uuid, generations: i32) -> Result<()> {
    let result = sqlx::query("UPDATE users SET generations_remaining = $1 WHERE id = $2")
        .bind(generations)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to set generation allowance")?;

    if result.rows_affected() == 0 {
        anyhow::bail!("user {id} not found");
    }

    Ok(())
}
