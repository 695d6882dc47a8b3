use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Error returned when a stored or user-supplied enum string is not one of
/// the known variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl EnumParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Lifecycle status of a plan.
///
/// ```text
/// draft     -> generated  (successful generation)
/// generated -> generated  (re-generation overwrites content)
/// draft     -> archived
/// generated -> archived
/// ```
///
/// `archived` is terminal for edits but remains readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Generated,
    Archived,
}

impl PlanStatus {
    /// Whether the plan may still be changed (content, fixed points, items).
    pub fn is_editable(self) -> bool {
        !matches!(self, Self::Archived)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Generated => "generated",
            Self::Archived => "archived",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "generated" => Ok(Self::Generated),
            "archived" => Ok(Self::Archived),
            other => Err(EnumParseError::new("plan status", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// How densely the traveller wants their days filled.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TravelPace {
    Slow,
    #[default]
    Moderate,
    Fast,
}

impl fmt::Display for TravelPace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Slow => "slow",
            Self::Moderate => "moderate",
            Self::Fast => "fast",
        };
        f.write_str(s)
    }
}

impl FromStr for TravelPace {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slow" => Ok(Self::Slow),
            "moderate" => Ok(Self::Moderate),
            "fast" => Ok(Self::Fast),
            other => Err(EnumParseError::new("travel pace", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Rough spending level for suggestions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BudgetLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for BudgetLevel {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(EnumParseError::new("budget level", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// An account that owns plans and a generation allowance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub generations_remaining: i32,
    pub created_at: DateTime<Utc>,
}

/// Stored travel preferences fed into generation prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserPreferences {
    pub user_id: Uuid,
    pub travel_pace: TravelPace,
    pub interests: Vec<String>,
    pub budget_level: BudgetLevel,
    pub updated_at: DateTime<Utc>,
}

/// A travel plan. `generated_content` holds the itinerary document as
/// written by the last successful generation or item edit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
    pub status: PlanStatus,
    pub generated_content: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl Plan {
    /// Number of calendar days covered, inclusive of both ends.
    pub fn trip_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Whether an itinerary was ever stored for this plan.
    ///
    /// Archiving keeps content, so an archived plan counts only if it still
    /// carries a document. A plan archived straight from draft does not.
    pub fn was_generated(&self) -> bool {
        self.status == PlanStatus::Generated || self.generated_content.is_some()
    }
}

/// An immovable commitment inside a plan (flight, concert, booked tour).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FixedPoint {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub location: String,
    pub event_at: DateTime<Utc>,
    /// Duration in minutes.
    pub event_duration: Option<i32>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Whether a generated plan was useful.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanFeedback {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub user_id: Uuid,
    pub helpful: bool,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
