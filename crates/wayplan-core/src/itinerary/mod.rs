//! The normalized itinerary document stored in `plans.generated_content`.
//!
//! Values of these types are only ever produced by [`normalize`] (from
//! untrusted JSON) or by the activity editing operations, so the enum
//! fields always hold one of the closed variants.

pub mod normalize;
pub mod render;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use normalize::{Rejection, normalize, normalize_with_reason};
pub use render::render_markdown;

/// Currency used when the document does not name one.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// A complete multi-day itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedItinerary {
    pub summary: String,
    pub currency: String,
    /// Index order is the canonical day order.
    pub days: Vec<DayPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl GeneratedItinerary {
    /// Find a day by exact date string.
    pub fn day(&self, date: &str) -> Option<&DayPlan> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn day_mut(&mut self, date: &str) -> Option<&mut DayPlan> {
        self.days.iter_mut().find(|d| d.date == date)
    }

    /// Total number of timeline items across all days.
    pub fn item_count(&self) -> usize {
        self.days.iter().map(|d| d.items.len()).sum()
    }

    /// Whether any day already uses `id`.
    pub fn contains_item_id(&self, id: &str) -> bool {
        self.days
            .iter()
            .any(|d| d.items.iter().any(|item| item.id == id))
    }

    /// Serialize back to the stored JSON shape.
    pub fn to_json(&self) -> serde_json::Value {
        // Every field is a string, list, or nested struct of those; this
        // cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One calendar day of the itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    /// ISO date as produced by the model; compared by string equality.
    pub date: String,
    pub items: Vec<TimelineItem>,
}

/// A single entry on a day's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    /// Unique within the enclosing plan.
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
}

impl TimelineItem {
    /// A bare item with defaulted enums and no optional fields.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            item_type: ItemType::default(),
            category: Category::default(),
            time: None,
            location: None,
            description: None,
            notes: None,
            estimated_price: None,
            estimated_duration: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of timeline entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    Activity,
    Meal,
    Transport,
}

impl ItemType {
    pub const ALL: [ItemType; 3] = [Self::Activity, Self::Meal, Self::Transport];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Meal => "meal",
            Self::Transport => "transport",
        }
    }

    /// Map free text onto a variant, falling back to `activity`.
    pub fn coerce(raw: &str) -> Self {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(raw))
            .unwrap_or_default()
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thematic category of a timeline entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sightseeing,
    Culture,
    Nature,
    Food,
    Nightlife,
    Shopping,
    Relaxation,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Self::Sightseeing,
        Self::Culture,
        Self::Nature,
        Self::Food,
        Self::Nightlife,
        Self::Shopping,
        Self::Relaxation,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sightseeing => "sightseeing",
            Self::Culture => "culture",
            Self::Nature => "nature",
            Self::Food => "food",
            Self::Nightlife => "nightlife",
            Self::Shopping => "shopping",
            Self::Relaxation => "relaxation",
            Self::Other => "other",
        }
    }

    /// Map free text onto a variant, falling back to `other`.
    pub fn coerce(raw: &str) -> Self {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(raw))
            .unwrap_or_default()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
