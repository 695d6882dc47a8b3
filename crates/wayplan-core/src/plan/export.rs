//! Read paths over stored content: the plan view and Markdown export.
//!
//! Stored content is re-normalized on every read. Content that no longer
//! normalizes is reported as unrenderable, never shown in part.

use serde::Serialize;
use uuid::Uuid;

use wayplan_db::models::Plan;

use crate::error::ServiceError;
use crate::itinerary::{GeneratedItinerary, normalize_with_reason, render_markdown};
use crate::store::PlanStore;

/// A plan together with its normalized itinerary.
///
/// The stored document is never serialized; clients only see `itinerary`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    #[serde(serialize_with = "serialize_without_content")]
    pub plan: Plan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itinerary: Option<GeneratedItinerary>,
    /// Set when the plan should have an itinerary but its content is
    /// unusable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_error: Option<String>,
}

fn serialize_without_content<S: serde::Serializer>(
    plan: &Plan,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut value = serde_json::to_value(plan).map_err(serde::ser::Error::custom)?;
    if let Some(fields) = value.as_object_mut() {
        fields.remove("generated_content");
    }
    value.serialize(serializer)
}

async fn load_owned(store: &dyn PlanStore, plan_id: Uuid, user_id: Uuid) -> Result<Plan, ServiceError> {
    let plan = store
        .load_plan(plan_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("plan {plan_id}")))?;
    if plan.user_id != user_id {
        return Err(ServiceError::Forbidden { plan_id, user_id });
    }
    Ok(plan)
}

/// Normalize the stored content of a plan that should carry one.
pub fn plan_itinerary(plan: &Plan) -> Result<GeneratedItinerary, ServiceError> {
    let raw = plan
        .generated_content
        .as_ref()
        .ok_or_else(|| ServiceError::UnrenderableContent {
            plan_id: plan.id,
            reason: "no stored content".to_owned(),
        })?;
    normalize_with_reason(raw).map_err(|r| ServiceError::UnrenderableContent {
        plan_id: plan.id,
        reason: r.to_string(),
    })
}

/// Load a plan for display.
///
/// Plans that were never generated have no itinerary. Otherwise an
/// unrenderable document yields `content_error` instead of an itinerary.
pub async fn load_plan_view(
    store: &dyn PlanStore,
    plan_id: Uuid,
    user_id: Uuid,
) -> Result<PlanView, ServiceError> {
    let plan = load_owned(store, plan_id, user_id).await?;
    if !plan.was_generated() {
        return Ok(PlanView {
            plan,
            itinerary: None,
            content_error: None,
        });
    }

    match plan_itinerary(&plan) {
        Ok(itinerary) => Ok(PlanView {
            plan,
            itinerary: Some(itinerary),
            content_error: None,
        }),
        Err(err) => {
            tracing::warn!(plan_id = %plan_id, error = %err, "stored itinerary is unrenderable");
            Ok(PlanView {
                plan,
                itinerary: None,
                content_error: Some(err.user_message()),
            })
        }
    }
}

/// Title line used for exported documents.
pub fn export_title(plan: &Plan) -> String {
    format!(
        "{}: {} ({} to {})",
        plan.name, plan.destination, plan.start_date, plan.end_date
    )
}

/// Render a generated plan, or an archived one that kept its content, as
/// Markdown.
pub async fn export_plan(
    store: &dyn PlanStore,
    plan_id: Uuid,
    user_id: Uuid,
) -> Result<String, ServiceError> {
    let plan = load_owned(store, plan_id, user_id).await?;
    if !plan.was_generated() {
        return Err(ServiceError::conflict(format!(
            "plan {plan_id} has not been generated yet"
        )));
    }
    let itinerary = plan_itinerary(&plan)?;
    Ok(render_markdown(&export_title(&plan), &itinerary))
}
