//! Conversion of untrusted JSON into a [`GeneratedItinerary`].
//!
//! Structure is strict: a missing `days` list, a day without `date`/`items`,
//! or an item without `id`/`title` rejects the whole document. Enumerated
//! values are lenient: unknown `type` becomes `activity`, unknown `category`
//! becomes `other`. Optional fields of the wrong shape are dropped.
//!
//! Normalization is pure and idempotent, so stored content is re-normalized
//! on every read.

use std::collections::HashSet;

use serde_json::{Map, Value};
use thiserror::Error;

use super::{Category, DEFAULT_CURRENCY, DayPlan, GeneratedItinerary, ItemType, TimelineItem};

/// Why a document could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("content is a string that does not decode as JSON")]
    UndecodableString,

    #[error("content is not a JSON object")]
    NotAnObject,

    #[error("`days` is missing")]
    DaysMissing,

    #[error("`days` is not a list")]
    DaysNotList,

    #[error("day {day} is not an object")]
    DayNotObject { day: usize },

    #[error("day {day} has no `date`")]
    DayMissingDate { day: usize },

    #[error("day {day} has no `items` list")]
    DayMissingItems { day: usize },

    #[error("item {item} of day {day} is not an object")]
    ItemNotObject { day: usize, item: usize },

    #[error("item {item} of day {day} has no `id`")]
    ItemMissingId { day: usize, item: usize },

    #[error("item {item} of day {day} has no `title`")]
    ItemMissingTitle { day: usize, item: usize },
}

/// Normalize untrusted content, returning `None` when it is structurally
/// unusable.
pub fn normalize(raw: &Value) -> Option<GeneratedItinerary> {
    normalize_with_reason(raw).ok()
}

/// Like [`normalize`] but reports why the document was rejected.
pub fn normalize_with_reason(raw: &Value) -> Result<GeneratedItinerary, Rejection> {
    // Older rows stored the document as a JSON-encoded string.
    if let Value::String(encoded) = raw {
        let decoded: Value =
            serde_json::from_str(encoded).map_err(|_| Rejection::UndecodableString)?;
        return normalize_object(&decoded);
    }
    normalize_object(raw)
}

fn normalize_object(raw: &Value) -> Result<GeneratedItinerary, Rejection> {
    let obj = raw.as_object().ok_or(Rejection::NotAnObject)?;

    let raw_days = match obj.get("days") {
        None | Some(Value::Null) => return Err(Rejection::DaysMissing),
        Some(Value::Array(days)) => days,
        Some(_) => return Err(Rejection::DaysNotList),
    };

    let mut ids = IdAllocator::default();
    let mut days = Vec::with_capacity(raw_days.len());
    for (day_idx, raw_day) in raw_days.iter().enumerate() {
        days.push(normalize_day(raw_day, day_idx, &mut ids)?);
    }

    let summary = obj
        .get("summary")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_owned())
        .unwrap_or_default();

    let currency = obj
        .get("currency")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_owned();

    Ok(GeneratedItinerary {
        summary,
        currency,
        days,
        modifications: string_list(obj.get("modifications")),
        warnings: string_list(obj.get("warnings")),
    })
}

fn normalize_day(
    raw: &Value,
    day: usize,
    ids: &mut IdAllocator,
) -> Result<DayPlan, Rejection> {
    let obj = raw.as_object().ok_or(Rejection::DayNotObject { day })?;

    let date = non_empty_str(obj.get("date")).ok_or(Rejection::DayMissingDate { day })?;

    let raw_items = obj
        .get("items")
        .and_then(Value::as_array)
        .ok_or(Rejection::DayMissingItems { day })?;

    let mut items = Vec::with_capacity(raw_items.len());
    for (item, raw_item) in raw_items.iter().enumerate() {
        let obj = raw_item
            .as_object()
            .ok_or(Rejection::ItemNotObject { day, item })?;
        items.push(normalize_item(obj, day, item, ids)?);
    }

    Ok(DayPlan { date, items })
}

fn normalize_item(
    obj: &Map<String, Value>,
    day: usize,
    item: usize,
    ids: &mut IdAllocator,
) -> Result<TimelineItem, Rejection> {
    // Ids are opaque; numeric ids from older documents are kept as text.
    let id = match obj.get("id") {
        Some(Value::Number(n)) => Some(n.to_string()),
        other => non_empty_str(other),
    }
    .ok_or(Rejection::ItemMissingId { day, item })?;

    let title = non_empty_str(obj.get("title")).ok_or(Rejection::ItemMissingTitle { day, item })?;

    let item_type = obj
        .get("type")
        .and_then(Value::as_str)
        .map(ItemType::coerce)
        .unwrap_or_default();

    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .map(Category::coerce)
        .unwrap_or_default();

    Ok(TimelineItem {
        id: ids.claim(id),
        title,
        item_type,
        category,
        time: optional_text(obj.get("time")),
        location: optional_text(obj.get("location")),
        description: optional_text(obj.get("description")),
        notes: optional_text(obj.get("notes")),
        estimated_price: optional_text(obj.get("estimated_price")),
        estimated_duration: optional_text(obj.get("estimated_duration")),
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Trimmed string, or `None` when absent, blank, or not a string.
fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Like [`non_empty_str`] but also accepts numbers (`"estimated_price": 12`).
fn optional_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Number(n)) => Some(n.to_string()),
        other => non_empty_str(other),
    }
}

/// Non-blank string entries of a list; `None` when nothing remains.
fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let entries: Vec<String> = value
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|v| non_empty_str(Some(v)))
        .collect();
    (!entries.is_empty()).then_some(entries)
}

/// Hands out plan-wide unique ids, re-keying repeats as `<id>-2`, `<id>-3`, ...
#[derive(Default)]
struct IdAllocator {
    seen: HashSet<String>,
}

impl IdAllocator {
    fn claim(&mut self, id: String) -> String {
        if self.seen.insert(id.clone()) {
            return id;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{id}-{n}");
            if self.seen.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn museum_doc() -> Value {
        json!({
            "days": [
                { "date": "2025-06-01", "items": [ { "id": "a1", "title": "Museum" } ] }
            ]
        })
    }

    #[test]
    fn minimal_document_gets_defaults() {
        let it = normalize(&museum_doc()).expect("should normalize");
        assert_eq!(it.summary, "");
        assert_eq!(it.currency, DEFAULT_CURRENCY);
        assert!(it.modifications.is_none());
        assert!(it.warnings.is_none());

        let item = &it.days[0].items[0];
        assert_eq!(item.id, "a1");
        assert_eq!(item.title, "Museum");
        assert_eq!(item.category, Category::Other);
        assert_eq!(item.item_type, ItemType::Activity);
    }

    #[test]
    fn missing_or_non_list_days_rejected() {
        for raw in [
            json!({}),
            json!({"days": null}),
            json!({"days": "2025-06-01"}),
            json!({"days": {"date": "2025-06-01"}}),
            json!({"days": 3}),
        ] {
            assert!(normalize(&raw).is_none(), "should reject {raw}");
        }
        assert_eq!(
            normalize_with_reason(&json!({"days": {}})),
            Err(Rejection::DaysNotList)
        );
    }

    #[test]
    fn non_object_roots_rejected() {
        for raw in [json!(null), json!([]), json!(42), json!(true)] {
            assert_eq!(normalize_with_reason(&raw), Err(Rejection::NotAnObject));
        }
    }

    #[test]
    fn malformed_day_rejects_whole_document() {
        let raw = json!({
            "days": [
                { "date": "2025-06-01", "items": [] },
                { "items": [] }
            ]
        });
        assert_eq!(
            normalize_with_reason(&raw),
            Err(Rejection::DayMissingDate { day: 1 })
        );

        let raw = json!({ "days": [ { "date": "2025-06-01" } ] });
        assert_eq!(
            normalize_with_reason(&raw),
            Err(Rejection::DayMissingItems { day: 0 })
        );
    }

    #[test]
    fn malformed_item_rejects_whole_document() {
        let raw = json!({
            "days": [ { "date": "2025-06-01", "items": [
                { "id": "a1", "title": "Museum" },
                { "id": "a2" }
            ] } ]
        });
        assert_eq!(
            normalize_with_reason(&raw),
            Err(Rejection::ItemMissingTitle { day: 0, item: 1 })
        );

        let raw = json!({
            "days": [ { "date": "2025-06-01", "items": [ { "title": "Museum" } ] } ]
        });
        assert_eq!(
            normalize_with_reason(&raw),
            Err(Rejection::ItemMissingId { day: 0, item: 0 })
        );

        let raw = json!({ "days": [ { "date": "2025-06-01", "items": [ "Museum" ] } ] });
        assert_eq!(
            normalize_with_reason(&raw),
            Err(Rejection::ItemNotObject { day: 0, item: 0 })
        );
    }

    #[test]
    fn unknown_enums_fall_back() {
        let raw = json!({
            "days": [ { "date": "2025-06-01", "items": [
                { "id": "a", "title": "Zipline", "category": "adventure", "type": "excursion" },
                { "id": "b", "title": "Tapas", "category": "food", "type": "meal" },
                { "id": "c", "title": "Train", "category": 7, "type": null }
            ] } ]
        });
        let it = normalize(&raw).unwrap();
        let items = &it.days[0].items;
        assert_eq!(items[0].category, Category::Other);
        assert_eq!(items[0].item_type, ItemType::Activity);
        assert_eq!(items[1].category, Category::Food);
        assert_eq!(items[1].item_type, ItemType::Meal);
        assert_eq!(items[2].category, Category::Other);
        assert_eq!(items[2].item_type, ItemType::Activity);
    }

    #[test]
    fn optional_fields_are_cleaned() {
        let raw = json!({
            "summary": "  Three sunny days ",
            "currency": "  ",
            "days": [ { "date": "2025-06-01", "items": [ {
                "id": 17,
                "title": "Tram 28",
                "time": "09:30",
                "location": "",
                "description": ["not", "text"],
                "estimated_price": 3.5,
                "estimated_duration": "1h"
            } ] } ],
            "warnings": ["", "Trams get crowded", 4],
            "modifications": []
        });
        let it = normalize(&raw).unwrap();
        assert_eq!(it.summary, "Three sunny days");
        assert_eq!(it.currency, DEFAULT_CURRENCY);
        assert_eq!(it.warnings, Some(vec!["Trams get crowded".to_string()]));
        assert!(it.modifications.is_none());

        let item = &it.days[0].items[0];
        assert_eq!(item.id, "17");
        assert_eq!(item.time.as_deref(), Some("09:30"));
        assert!(item.location.is_none());
        assert!(item.description.is_none());
        assert_eq!(item.estimated_price.as_deref(), Some("3.5"));
        assert_eq!(item.estimated_duration.as_deref(), Some("1h"));
    }

    #[test]
    fn duplicate_ids_are_rekeyed_across_days() {
        let raw = json!({
            "days": [
                { "date": "2025-06-01", "items": [
                    { "id": "a", "title": "One" },
                    { "id": "a", "title": "Two" }
                ] },
                { "date": "2025-06-02", "items": [
                    { "id": "a-2", "title": "Three" },
                    { "id": "a", "title": "Four" }
                ] }
            ]
        });
        let it = normalize(&raw).unwrap();
        let ids: Vec<&str> = it
            .days
            .iter()
            .flat_map(|d| d.items.iter().map(|i| i.id.as_str()))
            .collect();
        assert_eq!(ids, vec!["a", "a-2", "a-2-2", "a-3"]);
    }

    #[test]
    fn encoded_string_content_is_decoded() {
        let encoded = Value::String(museum_doc().to_string());
        let it = normalize(&encoded).expect("string-encoded rows should load");
        assert_eq!(it.days[0].items[0].title, "Museum");

        assert_eq!(
            normalize_with_reason(&Value::String("{not json".into())),
            Err(Rejection::UndecodableString)
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let docs = [
            museum_doc(),
            json!({
                "summary": "Coast and castles",
                "currency": "usd",
                "days": [
                    { "date": "2025-06-02", "items": [
                        { "id": "x", "title": "Sintra", "category": "CULTURE", "type": "transport",
                          "notes": " bring water ", "estimated_price": 10 },
                        { "id": "x", "title": "Dinner", "category": "food", "type": "meal" }
                    ] },
                    { "date": "2025-06-01", "items": [] }
                ],
                "modifications": ["Moved Sintra to day two"],
                "warnings": [null, "Palace closes at 18:00"]
            }),
        ];
        for doc in docs {
            let once = normalize(&doc).unwrap();
            let twice = normalize(&once.to_json()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn day_order_is_preserved() {
        let raw = json!({
            "days": [
                { "date": "2025-06-03", "items": [] },
                { "date": "2025-06-01", "items": [] }
            ]
        });
        let it = normalize(&raw).unwrap();
        assert_eq!(it.days[0].date, "2025-06-03");
        assert_eq!(it.days[1].date, "2025-06-01");
    }
}
