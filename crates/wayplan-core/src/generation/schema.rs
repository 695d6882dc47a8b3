//! The strict output schema requested from the model.
//!
//! Strict structured output needs every property listed in `required`, so
//! optional fields are expressed as nullable types instead.

use serde_json::{Value, json};

use crate::itinerary::{Category, ItemType};
use crate::llm::{OutputSchema, SchemaDefinitionError};

pub const SCHEMA_NAME: &str = "travel_itinerary";

fn nullable_string() -> Value {
    json!({ "type": ["string", "null"] })
}

fn string_enum(values: &[&str]) -> Value {
    json!({ "type": "string", "enum": values })
}

fn item_schema() -> Value {
    let types: Vec<&str> = ItemType::ALL.iter().map(|t| t.as_str()).collect();
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": [
            "id", "title", "type", "category", "time", "location",
            "description", "notes", "estimated_price", "estimated_duration"
        ],
        "properties": {
            "id": { "type": "string" },
            "title": { "type": "string" },
            "type": string_enum(&types),
            "category": string_enum(&categories),
            "time": nullable_string(),
            "location": nullable_string(),
            "description": nullable_string(),
            "notes": nullable_string(),
            "estimated_price": nullable_string(),
            "estimated_duration": nullable_string()
        }
    })
}

fn string_list() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

/// Build the closed itinerary schema.
pub fn itinerary_schema() -> Result<OutputSchema, SchemaDefinitionError> {
    let schema = json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["summary", "currency", "days", "modifications", "warnings"],
        "properties": {
            "summary": { "type": "string" },
            "currency": { "type": "string" },
            "days": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["date", "items"],
                    "properties": {
                        "date": { "type": "string" },
                        "items": { "type": "array", "items": item_schema() }
                    }
                }
            },
            "modifications": string_list(),
            "warnings": string_list()
        }
    });
    OutputSchema::new(SCHEMA_NAME, schema)
}
