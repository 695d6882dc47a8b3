//! Plan service layer.
//!
//! Draft plans, fixed points, preferences, archiving, deletion, and
//! feedback. Every function checks ownership before touching a row and
//! reports failures in the [`ServiceError`] taxonomy.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use wayplan_db::models::{
    BudgetLevel, FixedPoint, Plan, PlanFeedback, PlanStatus, TravelPace, UserPreferences,
};
use wayplan_db::queries::fixed_points::{self as fixed_point_db, NewFixedPoint};
use wayplan_db::queries::plans::{self as plan_db, PlanDetails};
use wayplan_db::queries::{feedback as feedback_db, preferences as prefs_db, users as user_db};

use crate::error::ServiceError;

/// Longest trip a plan may span, in days.
pub const MAX_TRIP_DAYS: i64 = 30;

/// Caller input for creating or updating a plan.
#[derive(Debug, Clone)]
pub struct PlanInput {
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
}

impl PlanInput {
    /// Check required fields and the date range.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::validation("plan name must not be empty"));
        }
        if self.destination.trim().is_empty() {
            return Err(ServiceError::validation("destination must not be empty"));
        }
        if self.end_date < self.start_date {
            return Err(ServiceError::validation(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            )));
        }
        let days = (self.end_date - self.start_date).num_days() + 1;
        if days > MAX_TRIP_DAYS {
            return Err(ServiceError::validation(format!(
                "trip spans {days} days, at most {MAX_TRIP_DAYS} are supported"
            )));
        }
        Ok(())
    }

    fn details(&self) -> PlanDetails<'_> {
        PlanDetails {
            name: self.name.trim(),
            destination: self.destination.trim(),
            start_date: self.start_date,
            end_date: self.end_date,
            notes: self.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()),
        }
    }
}

/// Check a fixed point against its plan's date range.
pub fn validate_fixed_point(plan: &Plan, point: &NewFixedPoint<'_>) -> Result<(), ServiceError> {
    if point.location.trim().is_empty() {
        return Err(ServiceError::validation("fixed point location must not be empty"));
    }
    if let Some(minutes) = point.event_duration {
        if minutes <= 0 {
            return Err(ServiceError::validation(format!(
                "fixed point duration must be positive, got {minutes}"
            )));
        }
    }
    let day = point.event_at.date_naive();
    if day < plan.start_date || day > plan.end_date {
        return Err(ServiceError::validation(format!(
            "fixed point on {day} is outside the trip ({} to {})",
            plan.start_date, plan.end_date
        )));
    }
    Ok(())
}

/// Load a plan and check that `user_id` owns it.
pub async fn owned_plan(pool: &PgPool, plan_id: Uuid, user_id: Uuid) -> Result<Plan, ServiceError> {
    let plan = plan_db::get_plan(pool, plan_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("plan {plan_id}")))?;
    if plan.user_id != user_id {
        return Err(ServiceError::Forbidden { plan_id, user_id });
    }
    Ok(plan)
}

fn ensure_editable(plan: &Plan) -> Result<(), ServiceError> {
    if !plan.status.is_editable() {
        return Err(ServiceError::conflict(format!("plan {} is archived", plan.id)));
    }
    Ok(())
}

/// Create a draft plan for an existing user.
pub async fn create_plan(pool: &PgPool, user_id: Uuid, input: &PlanInput) -> Result<Plan, ServiceError> {
    input.validate()?;
    if user_db::get_user(pool, user_id).await?.is_none() {
        return Err(ServiceError::not_found(format!("user {user_id}")));
    }

    let plan = plan_db::insert_plan(pool, user_id, &input.details()).await?;
    tracing::info!(plan_id = %plan.id, user_id = %user_id, destination = %plan.destination, "plan created");
    Ok(plan)
}

/// Replace the editable details of a non-archived plan.
///
/// Existing generated content is kept; regenerate to reflect the change.
pub async fn update_plan(
    pool: &PgPool,
    plan_id: Uuid,
    user_id: Uuid,
    input: &PlanInput,
) -> Result<Plan, ServiceError> {
    input.validate()?;
    let plan = owned_plan(pool, plan_id, user_id).await?;
    ensure_editable(&plan)?;

    plan_db::update_plan_details(pool, plan_id, &input.details())
        .await?
        .ok_or_else(|| ServiceError::conflict(format!("plan {plan_id} was archived meanwhile")))
}

pub async fn list_plans(pool: &PgPool, user_id: Uuid) -> Result<Vec<Plan>, ServiceError> {
    Ok(plan_db::list_plans_for_user(pool, user_id).await?)
}

/// Add a fixed point to a non-archived plan.
pub async fn add_fixed_point(
    pool: &PgPool,
    plan_id: Uuid,
    user_id: Uuid,
    point: &NewFixedPoint<'_>,
) -> Result<FixedPoint, ServiceError> {
    let plan = owned_plan(pool, plan_id, user_id).await?;
    ensure_editable(&plan)?;
    validate_fixed_point(&plan, point)?;

    let point = NewFixedPoint {
        location: point.location.trim(),
        description: point.description.map(str::trim).filter(|d| !d.is_empty()),
        ..point.clone()
    };
    let saved = fixed_point_db::insert_fixed_point(pool, plan_id, &point).await?;
    tracing::info!(plan_id = %plan_id, fixed_point_id = %saved.id, "fixed point added");
    Ok(saved)
}

pub async fn list_fixed_points(
    pool: &PgPool,
    plan_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<FixedPoint>, ServiceError> {
    owned_plan(pool, plan_id, user_id).await?;
    Ok(fixed_point_db::list_fixed_points(pool, plan_id).await?)
}

pub async fn remove_fixed_point(
    pool: &PgPool,
    plan_id: Uuid,
    user_id: Uuid,
    point_id: Uuid,
) -> Result<(), ServiceError> {
    let plan = owned_plan(pool, plan_id, user_id).await?;
    ensure_editable(&plan)?;

    if !fixed_point_db::delete_fixed_point(pool, plan_id, point_id).await? {
        return Err(ServiceError::not_found(format!("fixed point {point_id}")));
    }
    Ok(())
}

/// Make a plan read-only. Archiving twice is a conflict.
pub async fn archive_plan(pool: &PgPool, plan_id: Uuid, user_id: Uuid) -> Result<Plan, ServiceError> {
    let plan = owned_plan(pool, plan_id, user_id).await?;
    ensure_editable(&plan)?;

    let archived = plan_db::archive_plan(pool, plan_id)
        .await?
        .ok_or_else(|| ServiceError::conflict(format!("plan {plan_id} is archived")))?;
    tracing::info!(plan_id = %plan_id, "plan archived");
    Ok(archived)
}

/// Delete a plan with its fixed points and feedback.
pub async fn delete_plan(pool: &PgPool, plan_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
    owned_plan(pool, plan_id, user_id).await?;
    if !plan_db::delete_plan(pool, plan_id).await? {
        return Err(ServiceError::not_found(format!("plan {plan_id}")));
    }
    tracing::info!(plan_id = %plan_id, "plan deleted");
    Ok(())
}

/// Store a user's travel preferences, replacing earlier ones.
pub async fn set_preferences(
    pool: &PgPool,
    user_id: Uuid,
    travel_pace: TravelPace,
    interests: &[String],
    budget_level: BudgetLevel,
) -> Result<UserPreferences, ServiceError> {
    if user_db::get_user(pool, user_id).await?.is_none() {
        return Err(ServiceError::not_found(format!("user {user_id}")));
    }
    let mut cleaned: Vec<String> = Vec::with_capacity(interests.len());
    for interest in interests {
        let interest = interest.trim().to_lowercase();
        if !interest.is_empty() && !cleaned.contains(&interest) {
            cleaned.push(interest);
        }
    }

    Ok(prefs_db::upsert_preferences(pool, user_id, travel_pace, &cleaned, budget_level).await?)
}

/// Record whether a generated itinerary was helpful.
pub async fn submit_feedback(
    pool: &PgPool,
    plan_id: Uuid,
    user_id: Uuid,
    helpful: bool,
    comment: Option<&str>,
) -> Result<PlanFeedback, ServiceError> {
    let plan = owned_plan(pool, plan_id, user_id).await?;
    if plan.status == PlanStatus::Draft {
        return Err(ServiceError::conflict(format!(
            "plan {plan_id} has no itinerary to give feedback on"
        )));
    }
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());
    Ok(feedback_db::insert_feedback(pool, plan_id, user_id, helpful, comment).await?)
}
