//! API Server module
//!
//! This module provides the HTTP API for generating, parsing and tracking plans.

use std::net::SocketAddr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::{PlanError, TaskCoord};
use crate::service::{ChatRequest, GenerateRequest};
use crate::store::PlanKey;
use crate::Core;

/// Request to generate a plan for a user
#[derive(Serialize, Deserialize)]
pub struct GeneratePlanRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub request: GenerateRequest,
}

/// Request to structure raw text without calling the generator
#[derive(Serialize, Deserialize)]
pub struct ParseRequest {
    pub text: String,
    pub goal: String,
}

/// Chat message for a user
#[derive(Serialize, Deserialize)]
pub struct UserChatRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub request: ChatRequest,
}

/// Selects one of a user's plans
#[derive(Serialize, Deserialize, Default)]
pub struct GoalQuery {
    pub goal: Option<String>,
}

/// Request to flip a task's completion flag
#[derive(Serialize, Deserialize)]
pub struct ToggleTaskRequest {
    #[serde(default)]
    pub goal: Option<String>,
    pub coord: TaskCoord,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 3001).into(),
        }
    }
}

/// API responses
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

fn status_for(error: &PlanError) -> StatusCode {
    match error {
        PlanError::MissingGoal
        | PlanError::GoalTooLong { .. }
        | PlanError::MissingMessage
        | PlanError::InvalidCoord(_) => StatusCode::BAD_REQUEST,
        PlanError::PlanNotFound(_) | PlanError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        PlanError::Busy(_) => StatusCode::CONFLICT,
        PlanError::Generation(_) => StatusCode::BAD_GATEWAY,
        PlanError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Helper function to map Core results to Axum responses
fn map_core_result<T: Serialize>(result: Result<T, PlanError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!("Request failed: {}", e);
            }
            let message = match &e {
                PlanError::Generation(inner) => inner.user_message(),
                other => other.to_string(),
            };
            (status, Json(ApiResponse::<T>::error(message))).into_response()
        }
    }
}

/// Builds the application router
pub fn router(core: Core) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        .route("/api/generate-plan", post(generate_plan))
        .route("/api/parse", post(parse_plan))
        .route("/api/chat", post(chat))
        .route("/api/users/:user_id/plans", get(list_plans))
        .route("/api/users/:user_id/plan", get(get_plan).delete(delete_plan))
        .route("/api/users/:user_id/plan/toggle", post(toggle_task))
        .route("/api/users/:user_id/plan/progress", get(get_progress))
        .route("/api/users/:user_id/plan/suggestions", post(get_suggestions))
        .route("/api/users/:user_id/session", get(get_session))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(core)
}

/// Starts the API server
pub async fn serve(core: Core, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(core);

    tracing::info!("Starting server on {}", config.address);
    let listener = TcpListener::bind(config.address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn generate_plan(
    State(core): State<Core>,
    Json(payload): Json<GeneratePlanRequest>,
) -> impl IntoResponse {
    let result = core.generate_plan(&payload.user_id, payload.request).await;
    map_core_result(result)
}

async fn parse_plan(State(core): State<Core>, Json(payload): Json<ParseRequest>) -> impl IntoResponse {
    map_core_result(core.parse(&payload.text, &payload.goal))
}

async fn chat(State(core): State<Core>, Json(payload): Json<UserChatRequest>) -> impl IntoResponse {
    let result = core.chat(&payload.user_id, payload.request).await;
    map_core_result(result)
}

async fn list_plans(State(core): State<Core>, Path(user_id): Path<String>) -> impl IntoResponse {
    map_core_result(core.list_plans(&user_id).await)
}

async fn get_plan(
    State(core): State<Core>,
    Path(user_id): Path<String>,
    Query(query): Query<GoalQuery>,
) -> impl IntoResponse {
    let key = PlanKey::new(user_id, query.goal);
    map_core_result(core.get_plan(&key).await)
}

async fn delete_plan(
    State(core): State<Core>,
    Path(user_id): Path<String>,
    Query(query): Query<GoalQuery>,
) -> impl IntoResponse {
    let key = PlanKey::new(user_id, query.goal);
    map_core_result(core.delete_plan(&key).await)
}

async fn toggle_task(
    State(core): State<Core>,
    Path(user_id): Path<String>,
    Json(payload): Json<ToggleTaskRequest>,
) -> impl IntoResponse {
    let key = PlanKey::new(user_id, payload.goal);
    map_core_result(core.toggle_task(&key, &payload.coord).await)
}

async fn get_progress(
    State(core): State<Core>,
    Path(user_id): Path<String>,
    Query(query): Query<GoalQuery>,
) -> impl IntoResponse {
    let key = PlanKey::new(user_id, query.goal);
    map_core_result(core.progress(&key).await)
}

async fn get_suggestions(
    State(core): State<Core>,
    Path(user_id): Path<String>,
    payload: Option<Json<GoalQuery>>,
) -> impl IntoResponse {
    let goal = payload.and_then(|Json(query)| query.goal);
    let key = PlanKey::new(user_id, goal);
    map_core_result(core.suggestions(&key).await)
}

async fn get_session(State(core): State<Core>, Path(user_id): Path<String>) -> impl IntoResponse {
    map_core_result(Ok::<_, PlanError>(core.session(&user_id)))
}
