//! Ledger claim procedures.
//!
//! POST /rpc/claim_task_reward - Credit the caller for executing a task
//! POST /rpc/claim_ad_reward   - Credit the caller for a completed ad view
//!
//! Business rejections come back as 200 with `success: false` and a
//! message; HTTP errors are reserved for auth and storage failure. Clients
//! need the distinction to show "the ledger said no" instead of retrying.

use axum::routing::post;
use axum::{Extension, Json, Router};
use chrono::Utc;
use tracing::info;

use crate::auth::AuthUser;
use crate::engine::ClaimOutcome;
use crate::error::ApiError;
use crate::models::{ClaimResponse, ClaimTaskRequest};
use crate::AppState;

/// Build the rewards router.
pub fn router() -> Router {
    Router::new()
        .route("/rpc/claim_task_reward", post(claim_task_reward))
        .route("/rpc/claim_ad_reward", post(claim_ad_reward))
}

/// Credit the caller for executing a task. The store runs the whole
/// procedure atomically; concurrent claims on the last slot produce
/// exactly one grant.
async fn claim_task_reward(
    Extension(state): Extension<AppState>,
    AuthUser(profile): AuthUser,
    Json(req): Json<ClaimTaskRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let outcome = state
        .store
        .claim_task_reward(profile.id, req.task_id, Utc::now())
        .await?;

    Ok(Json(match outcome {
        ClaimOutcome::Granted { points } => ClaimResponse::granted(points),
        ClaimOutcome::Rejected(rejection) => {
            info!(user = %profile.id, task = %req.task_id, reason = %rejection, "task claim rejected");
            ClaimResponse::rejected(rejection)
        }
    }))
}

/// Credit the caller for a completed ad view, once per cooldown window.
async fn claim_ad_reward(
    Extension(state): Extension<AppState>,
    AuthUser(profile): AuthUser,
) -> Result<Json<ClaimResponse>, ApiError> {
    let outcome = state
        .store
        .claim_ad_reward(
            profile.id,
            state.config.ad_reward_points,
            state.config.ad_cooldown,
            Utc::now(),
        )
        .await?;

    Ok(Json(match outcome {
        ClaimOutcome::Granted { points } => ClaimResponse::granted(points),
        ClaimOutcome::Rejected(rejection) => {
            info!(user = %profile.id, reason = %rejection, "ad claim rejected");
            ClaimResponse::rejected(rejection)
        }
    }))
}
