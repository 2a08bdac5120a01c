//! Account and session routes.
//!
//! POST /auth/register - Create an account (balance starts at zero)
//! POST /auth/login    - Exchange credentials for a bearer session token
//! POST /auth/logout   - Revoke the presented session
//! GET  /auth/session  - Describe the current session; null when signed out

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use tracing::info;

use crate::auth::{self, BearerToken, MaybeUser};
use crate::error::ApiError;
use crate::models::{
    ApiResponse, LoginRequest, ProfileView, RegisterRequest, Session, SessionInfo, SessionResponse,
};
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 6;

/// Build the auth router.
pub fn router() -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
}

/// Create an account. Emails are stored lowercased so sign-in is
/// case-insensitive.
async fn register(
    Extension(state): Extension<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProfileView>>), ApiError> {
    let email = req.email.trim().to_ascii_lowercase();
    if !looks_like_email(&email) {
        return Err(ApiError::BadRequest("email address is not valid".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(
            "password must be at least 6 characters".into(),
        ));
    }

    let hash = auth::hash_password(&req.password)?;
    let profile = state.store.create_account(&email, &hash).await?;
    info!(user = %profile.id, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: profile.into(),
            message: "account created".to_string(),
        }),
    ))
}

/// Open a session. The uniform failure message keeps valid emails
/// indistinguishable from wrong passwords.
async fn login(
    Extension(state): Extension<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let email = req.email.trim().to_ascii_lowercase();
    let profile = state
        .store
        .profile_by_email(&email)
        .await?
        .filter(|p| auth::verify_password(&req.password, &p.password_hash))
        .ok_or(ApiError::Unauthorized("invalid email or password"))?;

    let minted = auth::mint_token();
    let now = Utc::now();
    let session = Session {
        token_hash: minted.token_hash,
        user_id: profile.id,
        created_at: now,
        expires_at: now + state.config.session_ttl,
    };
    state.store.insert_session(&session).await?;
    info!(user = %profile.id, "session opened");

    Ok(Json(ApiResponse {
        data: SessionResponse {
            token: minted.token,
            user_id: profile.id,
            expires_at: session.expires_at,
        },
        message: "signed in".to_string(),
    }))
}

/// Revoke the presented session. Revocation is idempotent.
async fn logout(
    Extension(state): Extension<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .store
        .delete_session(&auth::token_digest(&token))
        .await?;
    Ok(Json(ApiResponse {
        data: (),
        message: "signed out".to_string(),
    }))
}

/// Report the current session. Anonymous callers get `data: null` and a
/// 200, never an error; presence is what gates protected views client-side.
async fn session(MaybeUser(profile): MaybeUser) -> Json<ApiResponse<Option<SessionInfo>>> {
    let info = profile.map(|p| SessionInfo {
        user_id: p.id,
        email: p.email,
        role: p.role,
    });
    Json(ApiResponse {
        data: info,
        message: "session retrieved".to_string(),
    })
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}
