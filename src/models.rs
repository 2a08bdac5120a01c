//! Domain models for the engagement exchange.
//!
//! These structs map to the ledger tables and the JSON bodies of the HTTP
//! surface. Database rows and API shapes are kept separate where a row
//! carries something the API must never leak (password hashes).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{ActionType, Platform, Role, TaskStatus};
use crate::engine::ClaimRejection;

// ============================================================================
// Database Models (sqlx::FromRow)
// ============================================================================

/// A member account with its point balance and linked social handles.
///
/// Internal only; `ProfileView` is the serializable projection.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub points: i64,
    pub role: Role,
    #[sqlx(json)]
    pub social_accounts: BTreeMap<Platform, String>,
    pub created_at: DateTime<Utc>,
}

/// An opaque bearer session. Only the token digest is ever stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A commissioned engagement task.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub action_type: ActionType,
    pub url: String,
    pub cost_per_action: i64,
    pub reward_per_action: i64,
    pub target_quantity: i32,
    pub current_quantity: i32,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

/// The fact that a member executed a task. Its primary key
/// `(task_id, user_id)` is the authoritative double-claim guard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TaskExecution {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counts for the moderation overview.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExchangeCounts {
    pub users: i64,
    pub tasks: i64,
    pub active_tasks: i64,
}

// ============================================================================
// Request Models (Deserialize from JSON input)
// ============================================================================

/// Request body for creating an account.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for opening a session.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for replacing the caller's linked social accounts.
#[derive(Debug, Serialize, Deserialize)]
pub struct LinkAccountsRequest {
    pub accounts: BTreeMap<Platform, String>,
}

/// Request body for commissioning a task. Point rates are derived
/// server-side from the catalog and never accepted from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub platform: Platform,
    pub action_type: ActionType,
    pub url: String,
    pub target_quantity: i32,
}

/// Request body for the owner's active/paused toggle.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTaskStatusRequest {
    pub status: TaskStatus,
}

/// Request body for the task-reward claim procedure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimTaskRequest {
    pub task_id: Uuid,
}

/// Query filter for the availability feed.
#[derive(Debug, Default, Deserialize)]
pub struct AvailableFilter {
    pub platform: Option<Platform>,
}

/// Query parameters for the moderation listings.
#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

// ============================================================================
// Response Models
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub message: String,
}

/// A profile as the API exposes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: Uuid,
    pub email: String,
    pub points: i64,
    pub role: Role,
    pub social_accounts: BTreeMap<Platform, String>,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            points: profile.points,
            role: profile.role,
            social_accounts: profile.social_accounts,
            created_at: profile.created_at,
        }
    }
}

/// Response for a freshly opened session. The raw token appears here once
/// and is never retrievable again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// What `GET /auth/session` reports for a signed-in caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Outcome envelope of the two claim procedures.
///
/// Business rejections travel as `success: false` with a message, not as
/// HTTP errors, so callers can tell "the ledger said no" from transport
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ClaimResponse {
    pub fn granted(points: i64) -> Self {
        Self {
            success: true,
            points: Some(points),
            message: None,
        }
    }

    pub fn rejected(rejection: ClaimRejection) -> Self {
        Self {
            success: false,
            points: None,
            message: Some(rejection.to_string()),
        }
    }
}
