//! CLI handlers for `wayplan user` and `wayplan prefs`.

use anyhow::{Context, Result, bail};
use sqlx::PgPool;

use wayplan_core::plan::{list_plans, set_preferences};
use wayplan_db::models::UserPreferences;
use wayplan_db::queries::{preferences as prefs_db, users as user_db};

use crate::resolve::resolve_user_id;
use crate::{PrefsCommands, UserCommands};

/// Dispatch a `UserCommands` variant to the appropriate handler.
pub async fn run_user_command(command: UserCommands, pool: &PgPool) -> Result<()> {
    match command {
        UserCommands::Add { email, generations } => cmd_add(pool, &email, generations).await,
        UserCommands::Show { user } => cmd_show(pool, &user).await,
        UserCommands::SetQuota { user, generations } => {
            cmd_set_quota(pool, &user, generations).await
        }
    }
}

/// Dispatch a `PrefsCommands` variant for the given `--user`.
pub async fn run_prefs_command(command: PrefsCommands, pool: &PgPool, user: &str) -> Result<()> {
    let user_id = resolve_user_id(pool, user).await?;
    match command {
        PrefsCommands::Set {
            pace,
            budget,
            interests,
        } => {
            let prefs = set_preferences(pool, user_id, pace, &interests, budget).await?;
            println!("Preferences saved.");
            print_preferences(&prefs);
            Ok(())
        }
        PrefsCommands::Show => match prefs_db::get_preferences(pool, user_id).await? {
            Some(prefs) => {
                print_preferences(&prefs);
                Ok(())
            }
            None => {
                println!("No preferences stored. Use `wayplan prefs --user {user} set` to add them.");
                Ok(())
            }
        },
    }
}

async fn cmd_add(pool: &PgPool, email: &str, generations: i32) -> Result<()> {
    let email = email.trim();
    if !email.contains('@') {
        bail!("invalid email address: {email:?}");
    }
    if generations < 0 {
        bail!("generation allowance must not be negative, got {generations}");
    }
    if user_db::get_user_by_email(pool, email).await?.is_some() {
        bail!("a user with email {email:?} already exists");
    }

    let user = user_db::insert_user(pool, email, generations)
        .await
        .with_context(|| format!("failed to add user {email}"))?;
    tracing::info!(user_id = %user.id, "user added");

    println!("User added.");
    println!();
    println!("  ID:          {}", user.id);
    println!("  Email:       {}", user.email);
    println!("  Generations: {}", user.generations_remaining);
    Ok(())
}

async fn cmd_show(pool: &PgPool, user: &str) -> Result<()> {
    let user_id = resolve_user_id(pool, user).await?;
    let Some(user) = user_db::get_user(pool, user_id).await? else {
        bail!("user {user_id} not found");
    };
    let plans = list_plans(pool, user.id).await?;

    println!("User: {}", user.email);
    println!("  ID:          {}", user.id);
    println!("  Generations: {}", user.generations_remaining);
    println!("  Plans:       {}", plans.len());
    println!("  Created:     {}", user.created_at.format("%Y-%m-%d %H:%M"));

    if let Some(prefs) = prefs_db::get_preferences(pool, user.id).await? {
        println!();
        print_preferences(&prefs);
    }
    Ok(())
}

async fn cmd_set_quota(pool: &PgPool, user: &str, generations: i32) -> Result<()> {
    if generations < 0 {
        bail!("generation allowance must not be negative, got {generations}");
    }
    let user_id = resolve_user_id(pool, user).await?;
    if user_db::get_user(pool, user_id).await?.is_none() {
        bail!("user {user_id} not found");
    }
    user_db::set_quota(pool, user_id, generations).await?;
    println!("User {user_id} now has {generations} generation(s) remaining.");
    Ok(())
}

fn print_preferences(prefs: &UserPreferences) {
    let interests = if prefs.interests.is_empty() {
        "(none)".to_owned()
    } else {
        prefs.interests.join(", ")
    };
    println!("Preferences:");
    println!("  Pace:      {}", prefs.travel_pace);
    println!("  Budget:    {}", prefs.budget_level);
    println!("  Interests: {interests}");
}
