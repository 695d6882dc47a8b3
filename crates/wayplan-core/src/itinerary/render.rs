//! Markdown rendering of a normalized itinerary.

use std::fmt::Write as _;

use super::{GeneratedItinerary, TimelineItem};

/// Render an itinerary as a Markdown document titled `title`.
///
/// Advisory lists (`modifications`, `warnings`) are only emitted when they
/// have entries.
pub fn render_markdown(title: &str, itinerary: &GeneratedItinerary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {title}");
    out.push('\n');

    if !itinerary.summary.is_empty() {
        let _ = writeln!(out, "{}", itinerary.summary);
        out.push('\n');
    }
    let _ = writeln!(out, "_Prices in {}_", itinerary.currency);

    for (n, day) in itinerary.days.iter().enumerate() {
        out.push('\n');
        let _ = writeln!(out, "## Day {} ({})", n + 1, day.date);
        if day.items.is_empty() {
            out.push('\n');
            out.push_str("Free day.\n");
            continue;
        }
        out.push('\n');
        for item in &day.items {
            render_item(&mut out, item);
        }
    }

    render_list(&mut out, "Changes to your notes", itinerary.modifications.as_deref());
    render_list(&mut out, "Warnings", itinerary.warnings.as_deref());

    out
}

fn render_item(out: &mut String, item: &TimelineItem) {
    let when = item
        .time
        .as_deref()
        .map(|t| format!("**{t}** "))
        .unwrap_or_default();
    let _ = write!(
        out,
        "- {when}{} _({}, {})_",
        item.title, item.item_type, item.category
    );
    if let Some(location) = &item.location {
        let _ = write!(out, " @ {location}");
    }
    out.push('\n');

    for (label, value) in [
        ("", &item.description),
        ("Notes: ", &item.notes),
        ("Price: ", &item.estimated_price),
        ("Duration: ", &item.estimated_duration),
    ] {
        if let Some(value) = value {
            let _ = writeln!(out, "  - {label}{value}");
        }
    }
}

fn render_list(out: &mut String, heading: &str, entries: Option<&[String]>) {
    let Some(entries) = entries.filter(|e| !e.is_empty()) else {
        return;
    };
    out.push('\n');
    let _ = writeln!(out, "## {heading}");
    out.push('\n');
    for entry in entries {
        let _ = writeln!(out, "- {entry}");
    }
}
