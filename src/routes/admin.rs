//! Moderation routes. Every endpoint requires the admin role.
//!
//! GET    /admin/overview        - Member and task counts
//! GET    /admin/users?limit=    - Most recently registered accounts
//! GET    /admin/tasks?limit=    - Most recently created tasks
//! POST   /admin/tasks/{id}/stop - Force-stop a task
//! DELETE /admin/tasks/{id}      - Remove a task outright

use axum::extract::{Path, Query};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use tracing::info;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::models::{ApiResponse, ExchangeCounts, ProfileView, RecentQuery, Task};
use crate::AppState;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

/// Build the admin router.
pub fn router() -> Router {
    Router::new()
        .route("/admin/overview", get(overview))
        .route("/admin/users", get(recent_users))
        .route("/admin/tasks", get(recent_tasks))
        .route("/admin/tasks/{id}/stop", post(stop_task))
        .route("/admin/tasks/{id}", delete(remove_task))
}

async fn overview(
    Extension(state): Extension<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ApiResponse<ExchangeCounts>>, ApiError> {
    let counts = state.store.counts().await?;
    Ok(Json(ApiResponse {
        data: counts,
        message: "overview retrieved".to_string(),
    }))
}

async fn recent_users(
    Extension(state): Extension<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ApiResponse<Vec<ProfileView>>>, ApiError> {
    let profiles = state.store.recent_profiles(clamp_limit(query.limit)).await?;
    Ok(Json(ApiResponse {
        data: profiles.into_iter().map(ProfileView::from).collect(),
        message: "recent users retrieved".to_string(),
    }))
}

async fn recent_tasks(
    Extension(state): Extension<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = state.store.recent_tasks(clamp_limit(query.limit)).await?;
    Ok(Json(ApiResponse {
        data: tasks,
        message: "recent tasks retrieved".to_string(),
    }))
}

/// Force-stop a task. Stopped is terminal: the owner cannot reactivate it
/// and it leaves the availability feed immediately.
async fn stop_task(
    Extension(state): Extension<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Task>>, ApiError> {
    let task = state.store.stop_task(id).await?;
    info!(task = %id, admin = %admin.id, "task stopped by moderation");
    Ok(Json(ApiResponse {
        data: task,
        message: "task stopped".to_string(),
    }))
}

async fn remove_task(
    Extension(state): Extension<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.store.delete_task(id).await?;
    info!(task = %id, admin = %admin.id, "task deleted by moderation");
    Ok(Json(ApiResponse {
        data: (),
        message: "task deleted".to_string(),
    }))
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
