use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use wayplan_core::ServiceError;
use wayplan_core::activity::{ActivityMutator, ActivityPatch, NewActivity};
use wayplan_core::generation::Generator;
use wayplan_core::itinerary::GeneratedItinerary;
use wayplan_core::plan::{export_plan, load_plan_view};
use wayplan_core::store::{PgStore, PlanStore};

use crate::config::WayplanConfig;
use crate::plan_cmds::build_generator;

/// Header carrying the caller's user id.
pub const USER_HEADER: &str = "x-user-id";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
}

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        ServiceError::UnrenderableContent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::SchemaViolation(_) | ServiceError::ExternalService(_) => {
            StatusCode::BAD_GATEWAY
        }
        ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(status = %status, error = %err, "request failed");
        } else {
            tracing::debug!(status = %status, error = %err, "request rejected");
        }
        Self {
            status,
            message: err.user_message(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Caller identity
// ---------------------------------------------------------------------------

/// The user a request acts for, taken from the `x-user-id` header.
pub struct Caller(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| AppError::bad_request(format!("Invalid request: missing {USER_HEADER} header")))?;
        value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Caller)
            .ok_or_else(|| AppError::bad_request(format!("Invalid request: malformed {USER_HEADER} header")))
    }
}

fn parse_plan_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::bad_request(format!("Invalid request: malformed plan id {raw:?}")))
}

// ---------------------------------------------------------------------------
// State and response types
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PlanStore>,
    pub generator: Generator,
    pub mutator: ActivityMutator,
}

impl AppState {
    pub fn new(store: Arc<dyn PlanStore>, generator: Generator) -> Self {
        Self {
            mutator: ActivityMutator::new(store.clone()),
            store,
            generator,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub itinerary: GeneratedItinerary,
    pub remaining_generations: i32,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/plans/{id}", get(get_plan))
        .route("/api/plans/{id}/generate", post(generate))
        .route("/api/plans/{id}/export", get(export))
        .route("/api/plans/{id}/days/{date}/items", post(add_item))
        .route(
            "/api/plans/{id}/days/{date}/items/{item_id}",
            patch(update_item).delete(delete_item),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pool: PgPool, config: &WayplanConfig, bind: &str, port: u16) -> Result<()> {
    let store: Arc<dyn PlanStore> = Arc::new(PgStore::new(pool));
    let generator = build_generator(store.clone(), config)?;
    let generation_enabled = generator.has_completion();
    let app = build_router(AppState::new(store, generator));

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!(
        model = %config.generation.model,
        generation_enabled,
        "wayplan serve listening on http://{addr}"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("wayplan serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl+C, shutting down");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_plan(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<axum::response::Response, AppError> {
    let plan_id = parse_plan_id(&id)?;
    let view = load_plan_view(state.store.as_ref(), plan_id, user_id).await?;
    Ok(Json(view).into_response())
}

async fn generate(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<axum::response::Response, AppError> {
    let plan_id = parse_plan_id(&id)?;
    let generation = state.generator.generate(plan_id, user_id).await?;
    Ok(Json(GenerateResponse {
        itinerary: generation.itinerary,
        remaining_generations: generation.remaining_generations,
    })
    .into_response())
}

async fn export(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<axum::response::Response, AppError> {
    let plan_id = parse_plan_id(&id)?;
    let markdown = export_plan(state.store.as_ref(), plan_id, user_id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        markdown,
    )
        .into_response())
}

async fn add_item(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path((id, date)): Path<(String, String)>,
    body: Result<Json<NewActivity>, JsonRejection>,
) -> Result<axum::response::Response, AppError> {
    let plan_id = parse_plan_id(&id)?;
    let Json(new) = body?;
    let item = state.mutator.add_activity(plan_id, user_id, &date, new).await?;
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

async fn update_item(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path((id, date, item_id)): Path<(String, String, String)>,
    body: Result<Json<ActivityPatch>, JsonRejection>,
) -> Result<axum::response::Response, AppError> {
    let plan_id = parse_plan_id(&id)?;
    let Json(patch) = body?;
    let item = state
        .mutator
        .update_activity(plan_id, user_id, &date, &item_id, &patch)
        .await?;
    Ok(Json(item).into_response())
}

async fn delete_item(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path((id, date, item_id)): Path<(String, String, String)>,
) -> Result<axum::response::Response, AppError> {
    let plan_id = parse_plan_id(&id)?;
    state
        .mutator
        .delete_activity(plan_id, user_id, &date, &item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono::NaiveDate;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use wayplan_core::generation::GenerationConfig;
    use wayplan_core::llm::{CompletionError, CompletionRequest, StructuredCompletion};
    use wayplan_core::store::MemoryStore;
    use wayplan_db::models::PlanStatus;

    use super::*;

    // -----------------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------------

    /// Answers every call with the same itinerary, or with a 503.
    struct Canned {
        reply: Option<Value>,
    }

    #[async_trait]
    impl StructuredCompletion for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<Value, CompletionError> {
            self.reply.clone().ok_or_else(|| CompletionError::Provider {
                status: 503,
                message: "upstream overloaded".into(),
            })
        }
    }

    fn itinerary() -> Value {
        json!({
            "summary": "Three days in Lisbon.",
            "currency": "EUR",
            "days": [
                { "date": "2025-06-01", "items": [
                    { "id": "m1", "title": "Gulbenkian Museum", "type": "activity", "category": "culture" }
                ] },
                { "date": "2025-06-02", "items": [] },
                { "date": "2025-06-03", "items": [] }
            ]
        })
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        user: Uuid,
        plan: Uuid,
        app: Router,
    }

    /// `None` runs without a completion client; `Some(None)` with a failing one.
    fn fixture(reply: Option<Option<Value>>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user(2);
        let plan = store
            .add_plan(
                user,
                "Lisbon",
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
                None,
            )
            .id;

        let completion: Option<Arc<dyn StructuredCompletion>> = reply.map(|reply| {
            let client: Arc<dyn StructuredCompletion> = Arc::new(Canned { reply });
            client
        });
        let dyn_store: Arc<dyn PlanStore> = store.clone();
        let generator = Generator::new(dyn_store.clone(), completion, GenerationConfig::default());
        let app = build_router(AppState::new(dyn_store, generator));
        Fixture {
            store,
            user,
            plan,
            app,
        }
    }

    fn generated_fixture() -> Fixture {
        let fx = fixture(None);
        let mut plan = fx.store.plan(fx.plan).unwrap();
        plan.status = PlanStatus::Generated;
        plan.generated_content = Some(itinerary());
        fx.store.put_plan(plan);
        fx
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn draft_plan_has_no_itinerary() {
        let fx = fixture(None);
        let resp = send(&fx.app, Method::GET, &format!("/api/plans/{}", fx.plan), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["plan"]["status"], "draft");
        assert!(json["itinerary"].is_null());
    }

    #[tokio::test]
    async fn generated_plan_returns_itinerary_without_stored_document() {
        let fx = generated_fixture();
        let resp = send(&fx.app, Method::GET, &format!("/api/plans/{}", fx.plan), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["plan"]["status"], "generated");
        assert!(json["plan"].get("generated_content").is_none(), "{json}");
        assert!(json["itinerary"]["days"].is_array());
    }

    #[tokio::test]
    async fn identity_header_is_required() {
        let fx = fixture(None);
        let uri = format!("/api/plans/{}", fx.plan);

        let resp = send(&fx.app, Method::GET, &uri, None, None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("x-user-id"));

        let stranger = fx.store.add_user(1);
        let resp = send(&fx.app, Method::GET, &uri, Some(stranger), None).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(resp).await["error"], "You do not have access to this plan.");

        let resp = send(&fx.app, Method::GET, "/api/plans/not-a-uuid", Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(&fx.app, Method::GET, &format!("/api/plans/{}", Uuid::new_v4()), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generate_returns_itinerary_and_remaining_quota() {
        let fx = fixture(Some(Some(itinerary())));
        let uri = format!("/api/plans/{}/generate", fx.plan);

        let resp = send(&fx.app, Method::POST, &uri, Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["remaining_generations"], 1);
        assert_eq!(json["itinerary"]["days"][0]["items"][0]["title"], "Gulbenkian Museum");
        assert_eq!(fx.store.plan(fx.plan).unwrap().status, PlanStatus::Generated);

        fx.store.set_quota(fx.user, 0);
        let resp = send(&fx.app, Method::POST, &uri, Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn provider_failures_are_bad_gateway_without_details() {
        let fx = fixture(Some(None));
        let resp = send(&fx.app, Method::POST, &format!("/api/plans/{}/generate", fx.plan), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let message = body_json(resp).await["error"].as_str().unwrap().to_owned();
        assert!(!message.contains("upstream"), "{message}");
        assert_eq!(fx.store.quota(fx.user), Some(2));
    }

    #[tokio::test]
    async fn missing_credentials_are_bad_gateway() {
        let fx = fixture(None);
        let resp = send(&fx.app, Method::POST, &format!("/api/plans/{}/generate", fx.plan), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn item_lifecycle() {
        let fx = generated_fixture();
        let items = format!("/api/plans/{}/days/2025-06-02/items", fx.plan);

        let resp = send(
            &fx.app,
            Method::POST,
            &items,
            Some(fx.user),
            Some(json!({ "title": "Tram 28", "type": "transport", "time": "09:00" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        let item_id = created["id"].as_str().unwrap().to_owned();
        assert_eq!(created["type"], "transport");

        let resp = send(
            &fx.app,
            Method::PATCH,
            &format!("{items}/{item_id}"),
            Some(fx.user),
            Some(json!({ "time": "", "category": "sightseeing" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let updated = body_json(resp).await;
        assert!(updated["time"].is_null());
        assert_eq!(updated["category"], "sightseeing");

        let resp = send(&fx.app, Method::DELETE, &format!("{items}/{item_id}"), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = send(&fx.app, Method::DELETE, &format!("{items}/{item_id}"), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn item_edits_validate_input_and_status() {
        let fx = generated_fixture();
        let items = format!("/api/plans/{}/days/2025-06-01/items", fx.plan);

        let resp = send(&fx.app, Method::POST, &items, Some(fx.user), Some(json!({ "title": "  " }))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(&fx.app, Method::POST, &items, Some(fx.user), Some(json!({ "category": "spa" }))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(
            &fx.app,
            Method::POST,
            &format!("/api/plans/{}/days/2030-01-01/items", fx.plan),
            Some(fx.user),
            Some(json!({ "title": "Fado night" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        fx.store.set_status(fx.plan, PlanStatus::Archived);
        let resp = send(&fx.app, Method::POST, &items, Some(fx.user), Some(json!({ "title": "Fado night" }))).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unrenderable_content_is_an_explicit_state() {
        let fx = generated_fixture();
        let mut plan = fx.store.plan(fx.plan).unwrap();
        plan.generated_content = Some(json!(42));
        fx.store.put_plan(plan);

        let resp = send(&fx.app, Method::GET, &format!("/api/plans/{}", fx.plan), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(json["itinerary"].is_null());
        assert!(json["content_error"].is_string());

        let resp = send(&fx.app, Method::GET, &format!("/api/plans/{}/export", fx.plan), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = send(
            &fx.app,
            Method::PATCH,
            &format!("/api/plans/{}/days/2025-06-01/items/m1", fx.plan),
            Some(fx.user),
            Some(json!({ "title": "x" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn export_is_markdown() {
        let fx = generated_fixture();
        let resp = send(&fx.app, Method::GET, &format!("/api/plans/{}/export", fx.plan), Some(fx.user), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/markdown; charset=utf-8"
        );
        let text = body_text(resp).await;
        assert!(text.contains("Gulbenkian Museum"), "{text}");

        let draft = fixture(None);
        let resp = send(&draft.app, Method::GET, &format!("/api/plans/{}/export", draft.plan), Some(draft.user), None).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
