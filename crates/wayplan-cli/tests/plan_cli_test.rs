//! Integration tests for the `wayplan` binary.
//!
//! These tests run the real executable against a temporary database. The
//! config directory points at an empty temp dir so a developer's own config
//! file never leaks in.

use tokio::process::Command;
use uuid::Uuid;

use wayplan_db::models::PlanStatus;
use wayplan_db::queries::{fixed_points, plans, preferences, users};
use wayplan_test_utils::{create_test_db, drop_test_db, pg_url};

struct CliOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

async fn wayplan(db_url: &str, config_home: &std::path::Path, args: &[&str]) -> CliOutput {
    let output = Command::new(env!("CARGO_BIN_EXE_wayplan"))
        .arg("--database-url")
        .arg(db_url)
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("WAYPLAN_MODEL")
        .env("RUST_LOG", "warn")
        .output()
        .await
        .expect("failed to run wayplan binary");
    CliOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

/// Pull the UUID printed on the `ID:` line of a summary block.
fn printed_id(stdout: &str) -> Uuid {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("ID:"))
        .and_then(|rest| Uuid::parse_str(rest.trim()).ok())
        .unwrap_or_else(|| panic!("no ID line in output:\n{stdout}"))
}

#[tokio::test]
async fn user_plan_and_fixed_point_flow() {
    let (pool, db_name) = create_test_db().await;
    let db_url = format!("{}/{db_name}", pg_url().await);
    let config_home = tempfile::tempdir().unwrap();
    let home = config_home.path();

    let out = wayplan(&db_url, home, &["user", "add", "ana@example.com", "--generations", "3"]).await;
    assert!(out.success, "{}", out.stderr);
    let user_id = printed_id(&out.stdout);

    let out = wayplan(
        &db_url,
        home,
        &[
            "prefs", "--user", "ana@example.com", "set", "--pace", "slow", "--budget", "low",
            "--interests", "Food, museums,food",
        ],
    )
    .await;
    assert!(out.success, "{}", out.stderr);
    let prefs = preferences::get_preferences(&pool, user_id).await.unwrap().unwrap();
    assert_eq!(prefs.interests, vec!["food", "museums"]);

    let out = wayplan(
        &db_url,
        home,
        &[
            "plan", "--user", "ana@example.com", "create", "--name", "Lisbon long weekend",
            "--destination", "Lisbon, Portugal", "--start", "2025-06-01", "--end", "2025-06-03",
        ],
    )
    .await;
    assert!(out.success, "{}", out.stderr);
    let plan_id = printed_id(&out.stdout);
    let plan_arg = plan_id.to_string();

    let out = wayplan(
        &db_url,
        home,
        &[
            "plan", "--user", &user_id.to_string(), "fixed-point", "add", &plan_arg,
            "--location", "Coliseu dos Recreios", "--at", "2025-06-02 20:00", "--duration", "120",
        ],
    )
    .await;
    assert!(out.success, "{}", out.stderr);
    let points = fixed_points::list_fixed_points(&pool, plan_id).await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].event_duration, Some(120));

    let out = wayplan(&db_url, home, &["plan", "--user", "ana@example.com", "list"]).await;
    assert!(out.success, "{}", out.stderr);
    assert!(out.stdout.contains("Lisbon long weekend"), "{}", out.stdout);

    let out = wayplan(&db_url, home, &["plan", "--user", "ana@example.com", "show", &plan_arg]).await;
    assert!(out.success, "{}", out.stderr);
    assert!(out.stdout.contains("Coliseu dos Recreios"), "{}", out.stdout);
    assert!(out.stdout.contains("No itinerary yet."), "{}", out.stdout);

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn draft_plans_cannot_be_exported_and_generation_needs_a_key() {
    let (pool, db_name) = create_test_db().await;
    let db_url = format!("{}/{db_name}", pg_url().await);
    let config_home = tempfile::tempdir().unwrap();
    let home = config_home.path();

    let user = users::insert_user(&pool, "ben@example.com", 2).await.unwrap();
    let plan = wayplan_test_utils::seed_plan(&pool, user.id).await;
    let plan_arg = plan.id.to_string();

    let out = wayplan(&db_url, home, &["plan", "--user", "ben@example.com", "export", &plan_arg]).await;
    assert!(!out.success);
    assert!(out.stderr.contains("not been generated"), "{}", out.stderr);

    let out = wayplan(&db_url, home, &["plan", "--user", "ben@example.com", "generate", &plan_arg]).await;
    assert!(!out.success);
    assert_eq!(
        users::remaining_generations(&pool, user.id).await.unwrap(),
        Some(2),
        "a failed generation must not consume allowance"
    );

    let out = wayplan(&db_url, home, &["plan", "--user", "ben@example.com", "archive", &plan_arg]).await;
    assert!(out.success, "{}", out.stderr);
    let saved = plans::get_plan(&pool, plan.id).await.unwrap().unwrap();
    assert_eq!(saved.status, PlanStatus::Archived);

    let stranger = users::insert_user(&pool, "eve@example.com", 1).await.unwrap();
    let out = wayplan(&db_url, home, &["plan", "--user", &stranger.email, "delete", &plan_arg]).await;
    assert!(!out.success);
    assert!(plans::get_plan(&pool, plan.id).await.unwrap().is_some());

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn init_writes_config_and_refuses_to_overwrite() {
    let config_home = tempfile::tempdir().unwrap();
    let home = config_home.path();
    let db_url = "postgresql://localhost:5432/wayplan_cli_init";

    let out = wayplan(db_url, home, &["init", "--db-url", db_url, "--model", "openai/gpt-4o"]).await;
    assert!(out.success, "{}", out.stderr);

    let written = std::fs::read_to_string(home.join("wayplan").join("config.toml")).unwrap();
    assert!(written.contains(db_url), "{written}");
    assert!(written.contains("openai/gpt-4o"), "{written}");

    let out = wayplan(db_url, home, &["init", "--db-url", db_url]).await;
    assert!(!out.success);
    assert!(out.stderr.contains("already exists"), "{}", out.stderr);
}
