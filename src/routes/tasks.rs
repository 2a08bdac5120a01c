//! Task routes.
//!
//! GET    /tasks/available   - Tasks the caller can execute (optional ?platform=)
//! POST   /tasks             - Commission a new task
//! GET    /tasks/mine        - The caller's own tasks
//! PATCH  /tasks/{id}/status - Owner toggle between active and paused
//! DELETE /tasks/{id}        - Remove a task (owner or admin)

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Extension, Json, Router};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::catalog::{self, Platform, Role, TaskStatus};
use crate::engine;
use crate::error::ApiError;
use crate::models::{
    ApiResponse, AvailableFilter, CreateTaskRequest, Task, UpdateTaskStatusRequest,
};
use crate::store::NewTask;
use crate::AppState;

const MAX_URL_LEN: usize = 2048;

/// Build the tasks router.
pub fn router() -> Router {
    Router::new()
        .route("/tasks", post(create_task))
        .route("/tasks/available", get(available_tasks))
        .route("/tasks/mine", get(my_tasks))
        .route("/tasks/{id}/status", patch(set_status))
        .route("/tasks/{id}", delete(remove_task))
}

/// Tasks the caller can execute right now: active, not their own, not yet
/// executed by them, newest first.
async fn available_tasks(
    Extension(state): Extension<AppState>,
    AuthUser(profile): AuthUser,
    Query(filter): Query<AvailableFilter>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = state
        .store
        .available_tasks(profile.id, filter.platform)
        .await?;
    Ok(Json(ApiResponse {
        data: tasks,
        message: "available tasks retrieved".to_string(),
    }))
}

/// Commission a new task.
///
/// Point rates come from the catalog, never from the request. Creation is
/// refused up front when the caller's balance cannot cover the task's full
/// cost, even though owners are only debited as executions complete.
async fn create_task(
    Extension(state): Extension<AppState>,
    AuthUser(profile): AuthUser,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    let url = req.url.trim().to_string();
    if url.is_empty() || url.len() > MAX_URL_LEN {
        return Err(ApiError::BadRequest("a target URL is required".into()));
    }
    if !req.platform.supports(req.action_type) {
        return Err(ApiError::BadRequest(format!(
            "{} does not support {} tasks",
            req.platform, req.action_type
        )));
    }
    if req.platform == Platform::Telegram && catalog::telegram_deep_link(&url).is_none() {
        return Err(ApiError::BadRequest(
            "telegram tasks need a t.me channel link".into(),
        ));
    }
    if req.target_quantity < 1 {
        return Err(ApiError::BadRequest(
            "target quantity must be at least 1".into(),
        ));
    }

    let rate = req.action_type.rate();
    let total = engine::creation_cost(rate.cost, req.target_quantity)
        .ok_or_else(|| ApiError::BadRequest("target quantity is too large".into()))?;
    if profile.points < total {
        return Err(ApiError::BadRequest(format!(
            "insufficient points: {} x {} costs {}, balance is {}",
            req.target_quantity, req.action_type, total, profile.points
        )));
    }

    let task = state
        .store
        .insert_task(NewTask {
            user_id: profile.id,
            platform: req.platform,
            action_type: req.action_type,
            url,
            cost_per_action: rate.cost,
            reward_per_action: rate.reward,
            target_quantity: req.target_quantity,
        })
        .await?;
    info!(
        task = %task.id,
        owner = %profile.id,
        platform = %task.platform,
        action = %task.action_type,
        quantity = task.target_quantity,
        "task created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: task,
            message: "task created".to_string(),
        }),
    ))
}

async fn my_tasks(
    Extension(state): Extension<AppState>,
    AuthUser(profile): AuthUser,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = state.store.tasks_by_owner(profile.id).await?;
    Ok(Json(ApiResponse {
        data: tasks,
        message: "tasks retrieved".to_string(),
    }))
}

/// Owner toggle between active and paused. Stopped and finished are
/// terminal here; only moderation can stop, and only the engine finishes.
async fn set_status(
    Extension(state): Extension<AppState>,
    AuthUser(profile): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskStatusRequest>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    if !matches!(req.status, TaskStatus::Active | TaskStatus::Paused) {
        return Err(ApiError::BadRequest(
            "status can only be set to active or paused".into(),
        ));
    }
    let task = state.store.task(id).await?.ok_or(ApiError::NotFound)?;
    if task.user_id != profile.id {
        return Err(ApiError::Forbidden);
    }
    if !matches!(task.status, TaskStatus::Active | TaskStatus::Paused) {
        return Err(ApiError::BadRequest(format!(
            "a {} task cannot be toggled",
            task.status
        )));
    }

    let updated = state
        .store
        .set_task_status(id, profile.id, req.status)
        .await?;
    info!(task = %id, status = %updated.status, "task status updated");

    Ok(Json(ApiResponse {
        data: updated,
        message: "task status updated".to_string(),
    }))
}

/// Delete a task outright. Owners can remove their own; admins can remove
/// anything. Execution facts fall with the task.
async fn remove_task(
    Extension(state): Extension<AppState>,
    AuthUser(profile): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let task = state.store.task(id).await?.ok_or(ApiError::NotFound)?;
    if task.user_id != profile.id && profile.role != Role::Admin {
        return Err(ApiError::Forbidden);
    }

    state.store.delete_task(id).await?;
    info!(task = %id, by = %profile.id, "task deleted");

    Ok(Json(ApiResponse {
        data: (),
        message: "task deleted".to_string(),
    }))
}
