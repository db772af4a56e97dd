//! REST handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::tasks::Task;
use crate::user::User;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

/// POST /login
///
/// Finds the user, creating it on first login.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<User>> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("username must not be empty"));
    }

    let user = state.users.find_or_create(username).await?;
    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(Json(user))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    let user = state.users.find_by_id(id).await?;
    Ok(Json(user))
}

/// A task as served to clients: `cost` carries the subtree total.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub created_by: i64,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub cost: i64,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            created_by: task.created_by,
            completed: task.completed,
            parent_id: task.parent_id,
            cost: task.cost,
        }
    }
}

/// GET /tasks
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<Vec<TaskResponse>>> {
    let tasks = state.list.run().await?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// Create-task request body.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub id: Uuid,
    pub title: String,
    pub created_by: i64,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub cost: i64,
}

/// POST /tasks
pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<StatusCode> {
    let task = Task {
        id: request.id,
        title: request.title,
        created_by: request.created_by,
        completed: false,
        completed_by: None,
        parent_id: request.parent_id,
        cost: request.cost,
        total_cost: request.cost,
    };

    state.store.run(task).await?;
    Ok(StatusCode::CREATED)
}
