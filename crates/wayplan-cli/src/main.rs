mod config;
mod plan_cmds;
mod resolve;
mod serve_cmd;
mod user_cmds;

#[cfg(test)]
mod test_util;

use clap::{Parser, Subcommand};

use wayplan_db::models::{BudgetLevel, TravelPace};
use wayplan_db::pool;

use config::WayplanConfig;

#[derive(Parser)]
#[command(name = "wayplan", about = "Travel plans with generated day-by-day itineraries")]
struct Cli {
    /// Database URL (overrides WAYPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a wayplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/wayplan")]
        db_url: String,
        /// OpenRouter API key (can also come from OPENROUTER_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
        /// Model identifier, e.g. openai/gpt-4o-mini
        #[arg(long)]
        model: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the wayplan database (requires config file or env vars)
    DbInit,
    /// Run the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// User accounts and generation allowance
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Travel preferences used when generating
    Prefs {
        /// User ID or email
        #[arg(long)]
        user: String,
        #[command(subcommand)]
        command: PrefsCommands,
    },
    /// Plan management
    Plan {
        /// User ID or email acting on the plan
        #[arg(long)]
        user: String,
        #[command(subcommand)]
        command: PlanCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user
    Add {
        email: String,
        /// Number of itinerary generations granted
        #[arg(long, default_value_t = 5)]
        generations: i32,
    },
    /// Show a user with preferences and plan count
    Show {
        /// User ID or email
        user: String,
    },
    /// Set the remaining generation allowance
    SetQuota {
        /// User ID or email
        user: String,
        generations: i32,
    },
}

#[derive(Subcommand)]
pub enum PrefsCommands {
    /// Replace the stored preferences
    Set {
        /// slow, moderate or fast
        #[arg(long, default_value = "moderate")]
        pace: TravelPace,
        /// low, medium or high
        #[arg(long, default_value = "medium")]
        budget: BudgetLevel,
        /// Comma-separated interests (e.g. "food,museums")
        #[arg(long, value_delimiter = ',')]
        interests: Vec<String>,
    },
    /// Show the stored preferences
    Show,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a draft plan
    Create {
        /// Plan name
        #[arg(long)]
        name: String,
        #[arg(long)]
        destination: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Free-form wishes passed to generation
        #[arg(long)]
        notes: Option<String>,
    },
    /// Change name, destination, dates or notes
    Update {
        plan_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// New notes (empty string clears them)
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show a plan with its itinerary
    Show { plan_id: String },
    /// List the user's plans
    List,
    /// Generate (or regenerate) the itinerary
    Generate { plan_id: String },
    /// Make a plan read-only
    Archive { plan_id: String },
    /// Delete a plan with its fixed points and feedback
    Delete { plan_id: String },
    /// Export the itinerary as Markdown
    Export {
        plan_id: String,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Record whether the itinerary was helpful
    Feedback {
        plan_id: String,
        /// Mark the itinerary as not helpful
        #[arg(long)]
        not_helpful: bool,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Immovable commitments inside the trip
    FixedPoint {
        #[command(subcommand)]
        command: FixedPointCommands,
    },
    /// Edit items of a generated itinerary
    Activity {
        #[command(subcommand)]
        command: ActivityCommands,
    },
}

#[derive(Subcommand)]
pub enum FixedPointCommands {
    /// Add a fixed point
    Add {
        plan_id: String,
        #[arg(long)]
        location: String,
        /// Start time (RFC 3339 or "YYYY-MM-DD HH:MM" in UTC)
        #[arg(long)]
        at: String,
        /// Duration in minutes
        #[arg(long)]
        duration: Option<i32>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a fixed point
    Remove { plan_id: String, fixed_point_id: String },
    /// List fixed points in time order
    List { plan_id: String },
}

/// Optional item fields shared by `activity add` and `activity update`.
#[derive(clap::Args, Debug, Default)]
pub struct ActivityFields {
    /// activity, meal or transport
    #[arg(long = "type")]
    pub item_type: Option<String>,
    /// sightseeing, culture, nature, food, nightlife, shopping, relaxation or other
    #[arg(long)]
    pub category: Option<String>,
    /// Time of day (HH:MM)
    #[arg(long)]
    pub time: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub price: Option<String>,
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Subcommand)]
pub enum ActivityCommands {
    /// Append an item to a day
    Add {
        plan_id: String,
        /// Day of the itinerary (YYYY-MM-DD)
        date: String,
        #[arg(long)]
        title: String,
        #[command(flatten)]
        fields: ActivityFields,
    },
    /// Change fields of an item (empty string clears an optional field)
    Update {
        plan_id: String,
        date: String,
        item_id: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: ActivityFields,
    },
    /// Remove an item from a day
    Remove {
        plan_id: String,
        date: String,
        item_id: String,
    },
}

/// Execute the `wayplan init` command: write config file.
fn cmd_init(
    db_url: &str,
    api_key: Option<String>,
    model: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        llm: config::LlmSection {
            api_key,
            model: model.clone(),
            ..Default::default()
        },
        generation: config::GenerationSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if let Some(model) = &model {
        println!("  llm.model = {model}");
    }
    if has_key {
        println!("  llm.api_key = (set)");
    } else {
        println!(
            "  llm.api_key not set; export {} to enable generation.",
            config::API_KEY_ENV
        );
    }
    println!();
    println!("Next: run `wayplan db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `wayplan db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = WayplanConfig::resolve(cli_db_url)?;

    println!("Initializing wayplan database...");

    // 1. Create the database if it does not exist.
    pool::ensure_database_exists(&resolved.db_config).await?;

    // 2. Connect to the target database.
    let db_pool = pool::create_pool(&resolved.db_config).await?;

    // 3. Run migrations.
    pool::run_migrations(&db_pool).await?;

    // 4. Print success with table counts.
    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    // 5. Clean shutdown.
    db_pool.close().await;

    println!("wayplan db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            model,
            force,
        } => {
            cmd_init(&db_url, api_key, model, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = WayplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = serve_cmd::run_serve(db_pool.clone(), &resolved, &bind, port).await;
            db_pool.close().await;
            result?;
        }
        Commands::User { command } => {
            let resolved = WayplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = user_cmds::run_user_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Prefs { user, command } => {
            let resolved = WayplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = user_cmds::run_prefs_command(command, &db_pool, &user).await;
            db_pool.close().await;
            result?;
        }
        Commands::Plan { user, command } => {
            let resolved = WayplanConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = plan_cmds::run_plan_command(command, &db_pool, &user, &resolved).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
