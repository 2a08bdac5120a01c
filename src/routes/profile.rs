//! Profile routes.
//!
//! GET /profile                 - The caller's profile (balance, role, linked accounts)
//! PUT /profile/social-accounts - Replace the caller's linked social handles

use std::collections::BTreeMap;

use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use tracing::info;

use crate::auth::AuthUser;
use crate::catalog::Platform;
use crate::error::ApiError;
use crate::models::{ApiResponse, LinkAccountsRequest, ProfileView};
use crate::AppState;

/// Build the profile router.
pub fn router() -> Router {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/profile/social-accounts", put(set_social_accounts))
}

async fn get_profile(AuthUser(profile): AuthUser) -> Json<ApiResponse<ProfileView>> {
    Json(ApiResponse {
        data: profile.into(),
        message: "profile retrieved".to_string(),
    })
}

/// Replace the caller's linked accounts wholesale. Blank handles are
/// dropped rather than stored, so sending an empty string unlinks a
/// platform.
async fn set_social_accounts(
    Extension(state): Extension<AppState>,
    AuthUser(profile): AuthUser,
    Json(req): Json<LinkAccountsRequest>,
) -> Result<Json<ApiResponse<ProfileView>>, ApiError> {
    let accounts: BTreeMap<Platform, String> = req
        .accounts
        .into_iter()
        .filter_map(|(platform, handle)| {
            let handle = handle.trim().to_string();
            (!handle.is_empty()).then_some((platform, handle))
        })
        .collect();

    let updated = state
        .store
        .set_social_accounts(profile.id, &accounts)
        .await?;
    info!(user = %profile.id, platforms = accounts.len(), "social accounts updated");

    Ok(Json(ApiResponse {
        data: updated.into(),
        message: "social accounts updated".to_string(),
    }))
}
