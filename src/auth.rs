//! Password hashing, session tokens, and request authentication.
//!
//! Passwords are stored as argon2id PHC strings. Sessions are opaque
//! bearer tokens: 32 random bytes, hex encoded, shown to the client once;
//! only the BLAKE3 digest is persisted, so a leaked sessions table cannot
//! be replayed.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use chrono::Utc;
use rand::Rng;

use crate::catalog::Role;
use crate::error::ApiError;
use crate::models::Profile;
use crate::AppState;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Malformed stored hashes
/// verify as false rather than erroring.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// A freshly minted session token and the digest that gets stored.
pub struct MintedToken {
    pub token: String,
    pub token_hash: String,
}

pub fn mint_token() -> MintedToken {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    let token = hex::encode(bytes);
    let token_hash = token_digest(&token);
    MintedToken { token, token_hash }
}

pub fn token_digest(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

/// The raw bearer token from the `Authorization` header.
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(parts)
            .map(BearerToken)
            .ok_or(ApiError::Unauthorized("missing bearer token"))
    }
}

/// An authenticated caller, resolved from the bearer token to a profile.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Profile);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = app_state(parts)?;
        let token =
            bearer_token(parts).ok_or(ApiError::Unauthorized("missing bearer token"))?;
        resolve_session(&state, &token)
            .await?
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized("invalid or expired session"))
    }
}

/// An authenticated caller that also holds the moderation role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Profile);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(profile) = AuthUser::from_request_parts(parts, state).await?;
        if profile.role != Role::Admin {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(profile))
    }
}

/// Like `AuthUser`, but anonymous and broken sessions become `None`
/// instead of a rejection. For endpoints that report rather than gate.
pub struct MaybeUser(pub Option<Profile>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            match AuthUser::from_request_parts(parts, state).await {
                Ok(AuthUser(profile)) => Some(profile),
                Err(_) => None,
            },
        ))
    }
}

fn app_state(parts: &Parts) -> Result<AppState, ApiError> {
    parts.extensions.get::<AppState>().cloned().ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!("application state missing from request"))
    })
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

async fn resolve_session(state: &AppState, token: &str) -> Result<Option<Profile>, ApiError> {
    let digest = token_digest(token);
    let Some(session) = state.store.session_by_hash(&digest).await? else {
        return Ok(None);
    };
    if session.expires_at <= Utc::now() {
        return Ok(None);
    }
    Ok(state.store.profile(session.user_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn minted_tokens_are_unique_and_digest_stably() {
        let a = mint_token();
        let b = mint_token();
        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 64);
        assert_eq!(token_digest(&a.token), a.token_hash);
        assert_ne!(a.token_hash, a.token);
    }
}
