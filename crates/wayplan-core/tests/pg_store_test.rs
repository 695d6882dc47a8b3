//! PgStore against a real PostgreSQL database.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use wayplan_core::ServiceError;
use wayplan_core::activity::{ActivityMutator, NewActivity};
use wayplan_core::generation::{GenerationConfig, Generator};
use wayplan_core::llm::{CompletionError, CompletionRequest, StructuredCompletion};
use wayplan_core::store::{CommitOutcome, PgStore, PlanStore};
use wayplan_db::models::PlanStatus;
use wayplan_db::queries::{plans as plan_db, users as user_db};
use wayplan_test_utils::{create_test_db, drop_test_db, seed_plan, seed_user};

struct Fixed(Value);

#[async_trait]
impl StructuredCompletion for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<Value, CompletionError> {
        Ok(self.0.clone())
    }
}

fn content() -> Value {
    json!({
        "summary": "Three days in Lisbon.",
        "currency": "EUR",
        "days": [
            { "date": "2025-06-01", "items": [ { "id": "a1", "title": "Museum" } ] },
            { "date": "2025-06-02", "items": [] },
            { "date": "2025-06-03", "items": [] }
        ]
    })
}

#[tokio::test]
async fn commit_is_all_or_nothing() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());
    let user = seed_user(&pool, 1).await;
    let plan = seed_plan(&pool, user.id).await;

    let outcome = store
        .commit_generation(plan.id, user.id, &content())
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Committed { remaining: 0 });

    let saved = plan_db::get_plan(&pool, plan.id).await.unwrap().unwrap();
    assert_eq!(saved.status, PlanStatus::Generated);
    assert_eq!(saved.generated_content, Some(content()));
    assert!(saved.generated_at.is_some());

    let outcome = store
        .commit_generation(plan.id, user.id, &json!({ "days": [] }))
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::QuotaExhausted);
    let saved = plan_db::get_plan(&pool, plan.id).await.unwrap().unwrap();
    assert_eq!(saved.generated_content, Some(content()), "content untouched");

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn archived_plan_rolls_back_the_decrement() {
    let (pool, db_name) = create_test_db().await;
    let store = PgStore::new(pool.clone());
    let user = seed_user(&pool, 2).await;
    let plan = seed_plan(&pool, user.id).await;
    plan_db::archive_plan(&pool, plan.id).await.unwrap();

    let outcome = store
        .commit_generation(plan.id, user.id, &content())
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::PlanUnavailable);
    assert_eq!(
        user_db::remaining_generations(&pool, user.id).await.unwrap(),
        Some(2)
    );

    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn generate_then_edit_end_to_end() {
    let (pool, db_name) = create_test_db().await;
    let store: Arc<dyn PlanStore> = Arc::new(PgStore::new(pool.clone()));
    let user = seed_user(&pool, 1).await;
    let plan = seed_plan(&pool, user.id).await;

    let client: Arc<dyn StructuredCompletion> = Arc::new(Fixed(content()));
    let generator = Generator::new(store.clone(), Some(client), GenerationConfig::default());
    let generation = generator.generate(plan.id, user.id).await.unwrap();
    assert_eq!(generation.remaining_generations, 0);

    let mutator = ActivityMutator::new(store.clone());
    mutator
        .add_activity(
            plan.id,
            user.id,
            "2025-06-02",
            NewActivity {
                title: "Sintra day trip".into(),
                ..NewActivity::default()
            },
        )
        .await
        .unwrap();

    let saved = plan_db::get_plan(&pool, plan.id).await.unwrap().unwrap();
    let doc = saved.generated_content.unwrap();
    assert_eq!(doc["days"][1]["items"][0]["title"], "Sintra day trip");

    let err = generator.generate(plan.id, user.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::QuotaExceeded { .. }));

    drop_test_db(&db_name).await;
}
