//! Argument resolution helpers.
//!
//! - [`resolve_user_id`] accepts either a UUID or an email address and looks
//!   the user up when given an email.
//! - [`parse_date`] and [`parse_datetime`] turn operator input into the
//!   chrono types the services expect.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use wayplan_db::queries::users as user_db;

/// Parse a UUID argument, naming the kind of id in the error.
pub fn parse_id(kind: &str, input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).with_context(|| format!("invalid {kind} ID: {input:?}"))
}

/// Returns true if the input looks like an email rather than a UUID.
fn looks_like_email(input: &str) -> bool {
    input.contains('@')
}

/// Resolve a `--user` argument to a user id.
pub async fn resolve_user_id(pool: &PgPool, input: &str) -> Result<Uuid> {
    if !looks_like_email(input) {
        return parse_id("user", input);
    }
    match user_db::get_user_by_email(pool, input.trim()).await? {
        Some(user) => Ok(user.id),
        None => bail!("no user with email {input:?}.\nRun `wayplan user add {input}` first."),
    }
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date {input:?} (expected YYYY-MM-DD)"))
}

/// Parse a moment in time.
///
/// Accepts RFC 3339 (`2025-06-01T09:30:00+02:00`) or a naive
/// `YYYY-MM-DD HH:MM` / `YYYY-MM-DDTHH:MM`, which is taken as UTC.
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }
    bail!("invalid date-time {input:?} (expected RFC 3339 or YYYY-MM-DD HH:MM)")
}
