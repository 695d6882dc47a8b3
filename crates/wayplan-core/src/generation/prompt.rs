//! Prompt assembly for itinerary generation.

use std::fmt::Write as _;

use chrono::NaiveDate;

use wayplan_db::models::{FixedPoint, Plan, UserPreferences};

use crate::itinerary::{Category, ItemType};

/// Everything the model is told about one trip.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
    /// Sorted by `event_at`.
    pub fixed_points: Vec<FixedPoint>,
    pub preferences: Option<UserPreferences>,
    pub language: String,
}

impl GenerationContext {
    pub fn new(
        plan: &Plan,
        mut fixed_points: Vec<FixedPoint>,
        preferences: Option<UserPreferences>,
        language: &str,
    ) -> Self {
        fixed_points.sort_by_key(|p| (p.event_at, p.created_at));
        Self {
            destination: plan.destination.clone(),
            start_date: plan.start_date,
            end_date: plan.end_date,
            notes: plan
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_owned),
            fixed_points,
            preferences,
            language: language.to_owned(),
        }
    }

    /// Inclusive trip length in days.
    pub fn trip_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Dates the itinerary must cover, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start_date
            .iter_days()
            .take_while(|d| *d <= self.end_date)
    }
}

fn joined<T: Copy>(values: &[T], as_str: impl Fn(T) -> &'static str) -> String {
    values
        .iter()
        .map(|v| as_str(*v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Output language and formatting rules.
pub fn system_prompt(ctx: &GenerationContext) -> String {
    format!(
        "You are an experienced travel planner. Produce a realistic day-by-day itinerary \
as JSON matching the provided schema.\n\
\n\
Rules:\n\
- Write every human-readable field in {language}.\n\
- Return exactly one entry in `days` per trip date, in chronological order, \
with `date` formatted as YYYY-MM-DD.\n\
- Give every item an `id` that is unique across the whole itinerary.\n\
- `type` is one of: {types}.\n\
- `category` is one of: {categories}.\n\
- `time` is a 24h start time such as 09:30, or null.\n\
- Prices are plain amounts in the itinerary `currency`, given as text.\n\
- Fixed points are hard constraints: keep their date, time and location, \
and plan everything else around them.\n\
- If the traveller's notes cannot be honoured, explain the change in \
`modifications`. Put safety, booking or opening-hour caveats in `warnings`.",
        language = ctx.language,
        types = joined(&ItemType::ALL, ItemType::as_str),
        categories = joined(&Category::ALL, Category::as_str),
    )
}

/// Trip-specific facts.
pub fn user_prompt(ctx: &GenerationContext) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Destination: {}", ctx.destination);
    let _ = writeln!(
        out,
        "Dates: {} to {} ({} days)",
        ctx.start_date,
        ctx.end_date,
        ctx.trip_days()
    );

    if let Some(prefs) = &ctx.preferences {
        let _ = writeln!(out, "Travel pace: {}", prefs.travel_pace);
        let _ = writeln!(out, "Budget level: {}", prefs.budget_level);
        if !prefs.interests.is_empty() {
            let _ = writeln!(out, "Interests: {}", prefs.interests.join(", "));
        }
    }

    if ctx.fixed_points.is_empty() {
        let _ = writeln!(out, "\nFixed points: none");
    } else {
        let _ = writeln!(out, "\nFixed points (do not move):");
        for point in &ctx.fixed_points {
            let _ = write!(
                out,
                "- {} at {}",
                point.event_at.format("%Y-%m-%d %H:%M UTC"),
                point.location
            );
            if let Some(minutes) = point.event_duration {
                let _ = write!(out, " for {minutes} minutes");
            }
            if let Some(description) = &point.description {
                let _ = write!(out, ": {description}");
            }
            out.push('\n');
        }
    }

    if let Some(notes) = &ctx.notes {
        let _ = writeln!(out, "\nTraveller notes:\n{notes}");
    }

    out
}
