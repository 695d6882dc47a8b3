//! Item-level edits inside a generated itinerary.
//!
//! Items are addressed by `(date, id)`: the date must match a day exactly
//! and the id is only looked up inside that day. Every edit rewrites the
//! whole content document.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use wayplan_db::models::PlanStatus;

use crate::error::ServiceError;
use crate::itinerary::{Category, GeneratedItinerary, ItemType, TimelineItem, normalize_with_reason};
use crate::store::PlanStore;

/// A new timeline entry supplied by the user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewActivity {
    pub title: String,
    #[serde(default, rename = "type")]
    pub item_type: Option<ItemType>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub estimated_price: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<String>,
}

/// Partial update of a timeline entry.
///
/// `None` leaves a field alone. For optional text fields an empty string
/// clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<ItemType>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub estimated_price: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<String>,
}

impl ActivityPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.item_type.is_none()
            && self.category.is_none()
            && self.time.is_none()
            && self.location.is_none()
            && self.description.is_none()
            && self.notes.is_none()
            && self.estimated_price.is_none()
            && self.estimated_duration.is_none()
    }
}

fn clean(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty())
}

fn patch_text(field: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *field = clean(Some(value.clone()));
    }
}

fn required_title(title: &str) -> Result<String, ServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ServiceError::validation("activity title must not be empty"));
    }
    Ok(title.to_owned())
}

fn day_not_found(date: &str) -> ServiceError {
    ServiceError::not_found(format!("day {date}"))
}

fn item_not_found(date: &str, item_id: &str) -> ServiceError {
    ServiceError::not_found(format!("item {item_id} on {date}"))
}

/// Id not used anywhere in the itinerary.
fn fresh_item_id(itinerary: &GeneratedItinerary) -> String {
    loop {
        let id = format!("item-{}", Uuid::new_v4().simple());
        if !itinerary.contains_item_id(&id) {
            return id;
        }
    }
}

/// Append a new item to the day `date`.
pub fn add_item(
    itinerary: &mut GeneratedItinerary,
    date: &str,
    new: NewActivity,
) -> Result<TimelineItem, ServiceError> {
    let title = required_title(&new.title)?;
    if itinerary.day(date).is_none() {
        return Err(day_not_found(date));
    }

    let item = TimelineItem {
        id: fresh_item_id(itinerary),
        title,
        item_type: new.item_type.unwrap_or_default(),
        category: new.category.unwrap_or_default(),
        time: clean(new.time),
        location: clean(new.location),
        description: clean(new.description),
        notes: clean(new.notes),
        estimated_price: clean(new.estimated_price),
        estimated_duration: clean(new.estimated_duration),
    };
    let day = itinerary.day_mut(date).ok_or_else(|| day_not_found(date))?;
    day.items.push(item.clone());
    Ok(item)
}

/// Apply `patch` to item `item_id` of day `date`.
///
/// The itinerary is untouched unless the whole patch applies.
pub fn update_item(
    itinerary: &mut GeneratedItinerary,
    date: &str,
    item_id: &str,
    patch: &ActivityPatch,
) -> Result<TimelineItem, ServiceError> {
    if patch.is_empty() {
        return Err(ServiceError::validation("no fields to update"));
    }
    let title = patch.title.as_deref().map(required_title).transpose()?;

    let day = itinerary.day_mut(date).ok_or_else(|| day_not_found(date))?;
    let item = day
        .items
        .iter_mut()
        .find(|i| i.id == item_id)
        .ok_or_else(|| item_not_found(date, item_id))?;

    if let Some(title) = title {
        item.title = title;
    }
    if let Some(item_type) = patch.item_type {
        item.item_type = item_type;
    }
    if let Some(category) = patch.category {
        item.category = category;
    }
    patch_text(&mut item.time, &patch.time);
    patch_text(&mut item.location, &patch.location);
    patch_text(&mut item.description, &patch.description);
    patch_text(&mut item.notes, &patch.notes);
    patch_text(&mut item.estimated_price, &patch.estimated_price);
    patch_text(&mut item.estimated_duration, &patch.estimated_duration);

    Ok(item.clone())
}

/// Remove item `item_id` from day `date`.
pub fn remove_item(
    itinerary: &mut GeneratedItinerary,
    date: &str,
    item_id: &str,
) -> Result<TimelineItem, ServiceError> {
    let day = itinerary.day_mut(date).ok_or_else(|| day_not_found(date))?;
    let pos = day
        .items
        .iter()
        .position(|i| i.id == item_id)
        .ok_or_else(|| item_not_found(date, item_id))?;
    Ok(day.items.remove(pos))
}

/// Store-backed item edits for generated plans.
#[derive(Clone)]
pub struct ActivityMutator {
    store: Arc<dyn PlanStore>,
}

impl ActivityMutator {
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        Self { store }
    }

    pub async fn add_activity(
        &self,
        plan_id: Uuid,
        user_id: Uuid,
        date: &str,
        new: NewActivity,
    ) -> Result<TimelineItem, ServiceError> {
        self.edit(plan_id, user_id, |it| add_item(it, date, new)).await
    }

    pub async fn update_activity(
        &self,
        plan_id: Uuid,
        user_id: Uuid,
        date: &str,
        item_id: &str,
        patch: &ActivityPatch,
    ) -> Result<TimelineItem, ServiceError> {
        self.edit(plan_id, user_id, |it| update_item(it, date, item_id, patch))
            .await
    }

    pub async fn delete_activity(
        &self,
        plan_id: Uuid,
        user_id: Uuid,
        date: &str,
        item_id: &str,
    ) -> Result<TimelineItem, ServiceError> {
        self.edit(plan_id, user_id, |it| remove_item(it, date, item_id))
            .await
    }

    /// Load, check, edit, and write back the whole document.
    async fn edit<F>(&self, plan_id: Uuid, user_id: Uuid, apply: F) -> Result<TimelineItem, ServiceError>
    where
        F: FnOnce(&mut GeneratedItinerary) -> Result<TimelineItem, ServiceError>,
    {
        let plan = self
            .store
            .load_plan(plan_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("plan {plan_id}")))?;
        if plan.user_id != user_id {
            return Err(ServiceError::Forbidden { plan_id, user_id });
        }
        if plan.status != PlanStatus::Generated {
            return Err(ServiceError::conflict(format!(
                "plan {plan_id} is {}, only generated plans can be edited",
                plan.status
            )));
        }

        let raw = plan.generated_content.as_ref().ok_or_else(|| {
            ServiceError::UnrenderableContent {
                plan_id,
                reason: "generated plan has no content".to_owned(),
            }
        })?;
        let mut itinerary =
            normalize_with_reason(raw).map_err(|r| ServiceError::UnrenderableContent {
                plan_id,
                reason: r.to_string(),
            })?;

        let item = apply(&mut itinerary)?;

        let saved = self
            .store
            .save_plan_content(plan_id, &itinerary.to_json(), PlanStatus::Generated)
            .await?;
        if !saved {
            return Err(ServiceError::conflict(format!(
                "plan {plan_id} changed status while being edited"
            )));
        }

        tracing::debug!(plan_id = %plan_id, item_id = %item.id, "itinerary updated");
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::itinerary::normalize;

    fn museum_day() -> GeneratedItinerary {
        normalize(&json!({
            "days": [
                { "date": "2025-06-01", "items": [ { "id": "a1", "title": "Museum" } ] },
                { "date": "2025-06-02", "items": [ { "id": "b1", "title": "Beach" } ] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn museum_scenario() {
        let mut it = museum_day();
        let museum = &it.days[0].items[0];
        assert_eq!(museum.category, Category::Other);
        assert_eq!(museum.item_type, ItemType::Activity);

        let lunch = add_item(
            &mut it,
            "2025-06-01",
            NewActivity {
                title: "Lunch".into(),
                category: Some(Category::Food),
                ..NewActivity::default()
            },
        )
        .unwrap();
        assert_eq!(it.days[0].items.len(), 2);
        assert_eq!(it.days[0].items[1].id, lunch.id);
        assert_ne!(lunch.id, "a1");

        let before = it.days[0].items[0].clone();
        let patch = ActivityPatch {
            title: Some("City Museum".into()),
            ..ActivityPatch::default()
        };
        let updated = update_item(&mut it, "2025-06-01", "a1", &patch).unwrap();
        assert_eq!(updated.title, "City Museum");
        assert_eq!(
            TimelineItem {
                title: before.title.clone(),
                ..updated.clone()
            },
            before,
            "only the title changed"
        );

        remove_item(&mut it, "2025-06-01", "a1").unwrap();
        assert_eq!(it.days[0].items.len(), 1);
        assert_eq!(it.days[0].items[0].title, "Lunch");
    }

    #[test]
    fn add_then_remove_round_trips() {
        let mut it = museum_day();
        let original = it.clone();
        let added = add_item(
            &mut it,
            "2025-06-02",
            NewActivity {
                title: "Sunset walk".into(),
                ..NewActivity::default()
            },
        )
        .unwrap();
        remove_item(&mut it, "2025-06-02", &added.id).unwrap();
        assert_eq!(it, original);
    }

    #[test]
    fn failed_update_leaves_document_unchanged() {
        let mut it = museum_day();
        let before = it.to_json().to_string();
        let patch = ActivityPatch {
            title: Some("Anything".into()),
            ..ActivityPatch::default()
        };

        // `b1` exists, but on another day.
        let err = update_item(&mut it, "2025-06-01", "b1", &patch).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = update_item(&mut it, "2025-06-03", "a1", &patch).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let blank = ActivityPatch {
            title: Some("  ".into()),
            location: Some("Somewhere".into()),
            ..ActivityPatch::default()
        };
        let err = update_item(&mut it, "2025-06-01", "a1", &blank).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        assert_eq!(it.to_json().to_string(), before);
    }

    #[test]
    fn date_must_match_exactly() {
        let mut it = museum_day();
        let err = add_item(
            &mut it,
            "2025-6-1",
            NewActivity {
                title: "Lunch".into(),
                ..NewActivity::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(it.days.len(), 2, "no day is created");
    }

    #[test]
    fn empty_text_clears_optional_fields() {
        let mut it = museum_day();
        let set = ActivityPatch {
            location: Some("Rua da Madre de Deus 4".into()),
            ..ActivityPatch::default()
        };
        update_item(&mut it, "2025-06-01", "a1", &set).unwrap();
        let clear = ActivityPatch {
            location: Some(String::new()),
            ..ActivityPatch::default()
        };
        let item = update_item(&mut it, "2025-06-01", "a1", &clear).unwrap();
        assert_eq!(item.location, None);

        let err = update_item(&mut it, "2025-06-01", "a1", &ActivityPatch::default()).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn patch_deserializes_type_field() {
        let patch: ActivityPatch =
            serde_json::from_value(json!({ "type": "meal", "category": "food" })).unwrap();
        assert_eq!(patch.item_type, Some(ItemType::Meal));
        assert_eq!(patch.category, Some(Category::Food));
    }
}
