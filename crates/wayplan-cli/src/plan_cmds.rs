//! CLI handlers for `wayplan plan` subcommands.
//!
//! Implements:
//! - `wayplan plan create|update|show|list|archive|delete`
//! - `wayplan plan generate`        -- call the model and store the itinerary
//! - `wayplan plan export`          -- Markdown to stdout or a file
//! - `wayplan plan feedback`
//! - `wayplan plan fixed-point add|remove|list`
//! - `wayplan plan activity add|update|remove`

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use uuid::Uuid;

use wayplan_core::activity::{ActivityMutator, ActivityPatch, NewActivity};
use wayplan_core::generation::Generator;
use wayplan_core::itinerary::{Category, GeneratedItinerary, ItemType, TimelineItem};
use wayplan_core::llm::{OpenRouterClient, StructuredCompletion};
use wayplan_core::plan::{
    PlanInput, add_fixed_point, archive_plan, create_plan, delete_plan, export_plan,
    list_fixed_points, list_plans, load_plan_view, owned_plan, remove_fixed_point,
    submit_feedback, update_plan,
};
use wayplan_core::store::{PgStore, PlanStore};
use wayplan_db::models::Plan;
use wayplan_db::queries::fixed_points::NewFixedPoint;

use crate::config::WayplanConfig;
use crate::resolve::{parse_date, parse_datetime, parse_id, resolve_user_id};
use crate::{ActivityCommands, ActivityFields, FixedPointCommands, PlanCommands};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(
    command: PlanCommands,
    pool: &PgPool,
    user: &str,
    config: &WayplanConfig,
) -> Result<()> {
    let user_id = resolve_user_id(pool, user).await?;
    match command {
        PlanCommands::Create {
            name,
            destination,
            start,
            end,
            notes,
        } => {
            let input = PlanInput {
                name,
                destination,
                start_date: parse_date(&start)?,
                end_date: parse_date(&end)?,
                notes,
            };
            cmd_create(pool, user_id, &input).await
        }
        PlanCommands::Update {
            plan_id,
            name,
            destination,
            start,
            end,
            notes,
        } => {
            let plan_id = parse_id("plan", &plan_id)?;
            let current = owned_plan(pool, plan_id, user_id).await?;
            let input = PlanInput {
                name: name.unwrap_or(current.name),
                destination: destination.unwrap_or(current.destination),
                start_date: start.as_deref().map(parse_date).transpose()?.unwrap_or(current.start_date),
                end_date: end.as_deref().map(parse_date).transpose()?.unwrap_or(current.end_date),
                notes: notes.or(current.notes),
            };
            let plan = update_plan(pool, plan_id, user_id, &input).await?;
            println!("Plan updated.");
            print_plan_header(&plan);
            Ok(())
        }
        PlanCommands::Show { plan_id } => cmd_show(pool, user_id, &plan_id).await,
        PlanCommands::List => cmd_list(pool, user_id).await,
        PlanCommands::Generate { plan_id } => cmd_generate(pool, user_id, &plan_id, config).await,
        PlanCommands::Archive { plan_id } => {
            let plan = archive_plan(pool, parse_id("plan", &plan_id)?, user_id).await?;
            println!("Plan {} archived. It stays readable and exportable.", plan.id);
            Ok(())
        }
        PlanCommands::Delete { plan_id } => {
            let plan_id = parse_id("plan", &plan_id)?;
            delete_plan(pool, plan_id, user_id).await?;
            println!("Plan {plan_id} deleted.");
            Ok(())
        }
        PlanCommands::Export { plan_id, output } => {
            cmd_export(pool, user_id, &plan_id, output.as_deref()).await
        }
        PlanCommands::Feedback {
            plan_id,
            not_helpful,
            comment,
        } => {
            let plan_id = parse_id("plan", &plan_id)?;
            submit_feedback(pool, plan_id, user_id, !not_helpful, comment.as_deref()).await?;
            println!("Thanks, feedback recorded for plan {plan_id}.");
            Ok(())
        }
        PlanCommands::FixedPoint { command } => run_fixed_point_command(command, pool, user_id).await,
        PlanCommands::Activity { command } => run_activity_command(command, pool, user_id).await,
    }
}

// -----------------------------------------------------------------------
// wayplan plan create / list / show
// -----------------------------------------------------------------------

async fn cmd_create(pool: &PgPool, user_id: Uuid, input: &PlanInput) -> Result<()> {
    let plan = create_plan(pool, user_id, input).await?;

    println!("Plan created successfully.");
    println!();
    print_plan_header(&plan);
    println!();
    println!("Next: add fixed points, then run `wayplan plan --user <user> generate {}`.", plan.id);
    Ok(())
}

async fn cmd_list(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let plans = list_plans(pool, user_id).await?;

    if plans.is_empty() {
        println!("No plans found. Use `wayplan plan create` to create one.");
        return Ok(());
    }

    // ID is always 36 chars (UUID). Status max is 9 (generated).
    let id_w = 36;
    let name_w = plans.iter().map(|p| p.name.len()).max().unwrap_or(4).max(4);
    let dest_w = plans.iter().map(|p| p.destination.len()).max().unwrap_or(11).max(11);
    let status_w = 9;

    println!(
        "{:<id_w$}  {:<name_w$}  {:<dest_w$}  {:<status_w$}  DATES",
        "ID", "NAME", "DESTINATION", "STATUS",
    );
    for plan in &plans {
        println!(
            "{:<id_w$}  {:<name_w$}  {:<dest_w$}  {:<status_w$}  {} to {}",
            plan.id, plan.name, plan.destination, plan.status, plan.start_date, plan.end_date,
        );
    }
    Ok(())
}

async fn cmd_show(pool: &PgPool, user_id: Uuid, plan_id: &str) -> Result<()> {
    let plan_id = parse_id("plan", plan_id)?;
    let store = PgStore::new(pool.clone());
    let view = load_plan_view(&store, plan_id, user_id).await?;
    let points = list_fixed_points(pool, plan_id, user_id).await?;

    print_plan_header(&view.plan);
    if let Some(notes) = &view.plan.notes {
        println!("  Notes:       {notes}");
    }

    if !points.is_empty() {
        println!();
        println!("Fixed points:");
        for point in &points {
            let duration = point
                .event_duration
                .map(|m| format!(" ({m} min)"))
                .unwrap_or_default();
            println!(
                "  {}  {} at {}{}",
                point.id,
                point.event_at.format("%Y-%m-%d %H:%M"),
                point.location,
                duration
            );
        }
    }

    println!();
    match (&view.itinerary, &view.content_error) {
        (Some(itinerary), _) => print_itinerary(itinerary),
        (None, Some(err)) => println!("Itinerary unavailable: {err}"),
        (None, None) => println!("No itinerary yet."),
    }
    Ok(())
}

// -----------------------------------------------------------------------
// wayplan plan generate / export
// -----------------------------------------------------------------------

/// Build a generator from resolved config. Without an API key the generator
/// still runs its checks and then reports the provider as unavailable.
pub fn build_generator(store: Arc<dyn PlanStore>, config: &WayplanConfig) -> Result<Generator> {
    let completion: Option<Arc<dyn StructuredCompletion>> = if config.llm.has_credentials() {
        let client = OpenRouterClient::new(&config.llm).context("failed to build LLM client")?;
        Some(Arc::new(client))
    } else {
        tracing::warn!("no LLM credential configured, generation is disabled");
        None
    };
    Ok(Generator::new(store, completion, config.generation.clone()))
}

async fn cmd_generate(
    pool: &PgPool,
    user_id: Uuid,
    plan_id: &str,
    config: &WayplanConfig,
) -> Result<()> {
    let plan_id = parse_id("plan", plan_id)?;
    let generator = build_generator(Arc::new(PgStore::new(pool.clone())), config)?;

    println!("Generating itinerary with {}...", generator.config().model);
    let generation = generator.generate(plan_id, user_id).await?;

    println!();
    print_itinerary(&generation.itinerary);
    println!();
    println!(
        "{} item(s) generated. {} generation(s) remaining.",
        generation.itinerary.item_count(),
        generation.remaining_generations
    );
    Ok(())
}

async fn cmd_export(
    pool: &PgPool,
    user_id: Uuid,
    plan_id: &str,
    output: Option<&str>,
) -> Result<()> {
    let plan_id = parse_id("plan", plan_id)?;
    let store = PgStore::new(pool.clone());
    let markdown = export_plan(&store, plan_id, user_id).await?;

    match output {
        Some(path) => {
            std::fs::write(path, &markdown)
                .with_context(|| format!("failed to write export to {path}"))?;
            println!("Plan exported to {path}");
        }
        None => print!("{markdown}"),
    }
    Ok(())
}

// -----------------------------------------------------------------------
// wayplan plan fixed-point
// -----------------------------------------------------------------------

async fn run_fixed_point_command(
    command: FixedPointCommands,
    pool: &PgPool,
    user_id: Uuid,
) -> Result<()> {
    match command {
        FixedPointCommands::Add {
            plan_id,
            location,
            at,
            duration,
            description,
        } => {
            let plan_id = parse_id("plan", &plan_id)?;
            let point = NewFixedPoint {
                location: &location,
                event_at: parse_datetime(&at)?,
                event_duration: duration,
                description: description.as_deref(),
            };
            let saved = add_fixed_point(pool, plan_id, user_id, &point).await?;
            println!("Fixed point {} added.", saved.id);
            Ok(())
        }
        FixedPointCommands::Remove {
            plan_id,
            fixed_point_id,
        } => {
            let plan_id = parse_id("plan", &plan_id)?;
            let point_id = parse_id("fixed point", &fixed_point_id)?;
            remove_fixed_point(pool, plan_id, user_id, point_id).await?;
            println!("Fixed point {point_id} removed.");
            Ok(())
        }
        FixedPointCommands::List { plan_id } => {
            let plan_id = parse_id("plan", &plan_id)?;
            let points = list_fixed_points(pool, plan_id, user_id).await?;
            if points.is_empty() {
                println!("No fixed points.");
            }
            for point in &points {
                println!(
                    "{}  {}  {}  {}",
                    point.id,
                    point.event_at.format("%Y-%m-%d %H:%M"),
                    point.location,
                    point.description.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// wayplan plan activity
// -----------------------------------------------------------------------

fn parse_item_type(raw: &str) -> Result<ItemType> {
    match ItemType::ALL.into_iter().find(|t| t.as_str() == raw.trim()) {
        Some(t) => Ok(t),
        None => bail!(
            "invalid item type {raw:?}, expected one of: {}",
            ItemType::ALL.map(ItemType::as_str).join(", ")
        ),
    }
}

fn parse_category(raw: &str) -> Result<Category> {
    match Category::ALL.into_iter().find(|c| c.as_str() == raw.trim()) {
        Some(c) => Ok(c),
        None => bail!(
            "invalid category {raw:?}, expected one of: {}",
            Category::ALL.map(Category::as_str).join(", ")
        ),
    }
}

fn new_activity(title: String, fields: ActivityFields) -> Result<NewActivity> {
    Ok(NewActivity {
        title,
        item_type: fields.item_type.as_deref().map(parse_item_type).transpose()?,
        category: fields.category.as_deref().map(parse_category).transpose()?,
        time: fields.time,
        location: fields.location,
        description: fields.description,
        notes: fields.notes,
        estimated_price: fields.price,
        estimated_duration: fields.duration,
    })
}

fn activity_patch(title: Option<String>, fields: ActivityFields) -> Result<ActivityPatch> {
    Ok(ActivityPatch {
        title,
        item_type: fields.item_type.as_deref().map(parse_item_type).transpose()?,
        category: fields.category.as_deref().map(parse_category).transpose()?,
        time: fields.time,
        location: fields.location,
        description: fields.description,
        notes: fields.notes,
        estimated_price: fields.price,
        estimated_duration: fields.duration,
    })
}

async fn run_activity_command(
    command: ActivityCommands,
    pool: &PgPool,
    user_id: Uuid,
) -> Result<()> {
    let mutator = ActivityMutator::new(Arc::new(PgStore::new(pool.clone())));
    match command {
        ActivityCommands::Add {
            plan_id,
            date,
            title,
            fields,
        } => {
            let plan_id = parse_id("plan", &plan_id)?;
            let item = mutator
                .add_activity(plan_id, user_id, &date, new_activity(title, fields)?)
                .await?;
            println!("Added {} on {date}.", item.id);
            print_item(&item);
            Ok(())
        }
        ActivityCommands::Update {
            plan_id,
            date,
            item_id,
            title,
            fields,
        } => {
            let plan_id = parse_id("plan", &plan_id)?;
            let patch = activity_patch(title, fields)?;
            let item = mutator
                .update_activity(plan_id, user_id, &date, &item_id, &patch)
                .await?;
            println!("Updated {} on {date}.", item.id);
            print_item(&item);
            Ok(())
        }
        ActivityCommands::Remove {
            plan_id,
            date,
            item_id,
        } => {
            let plan_id = parse_id("plan", &plan_id)?;
            let item = mutator.delete_activity(plan_id, user_id, &date, &item_id).await?;
            println!("Removed {} ({}) from {date}.", item.id, item.title);
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// Output helpers
// -----------------------------------------------------------------------

fn print_plan_header(plan: &Plan) {
    println!("Plan: {}", plan.name);
    println!("  ID:          {}", plan.id);
    println!("  Destination: {}", plan.destination);
    println!(
        "  Dates:       {} to {} ({} days)",
        plan.start_date,
        plan.end_date,
        plan.trip_days()
    );
    println!("  Status:      {}", plan.status);
}

fn print_item(item: &TimelineItem) {
    let time = item.time.as_deref().unwrap_or("--:--");
    let location = item
        .location
        .as_deref()
        .map(|l| format!(" @ {l}"))
        .unwrap_or_default();
    println!(
        "  {time}  [{}/{}] {}{location}  ({})",
        item.item_type, item.category, item.title, item.id
    );
}

fn print_itinerary(itinerary: &GeneratedItinerary) {
    if !itinerary.summary.is_empty() {
        println!("{}", itinerary.summary);
        println!();
    }
    for day in &itinerary.days {
        println!("{}", day.date);
        if day.items.is_empty() {
            println!("  (nothing planned)");
        }
        for item in &day.items {
            print_item(item);
        }
    }
    if let Some(warnings) = &itinerary.warnings {
        println!();
        println!("Warnings:");
        for w in warnings {
            println!("  - {w}");
        }
    }
}
