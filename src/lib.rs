//! # boostex
//!
//! Points-based social engagement exchange. Members commission engagement
//! tasks (subscribe, like, comment, view, follow, join) priced in points,
//! and earn points by executing other members' tasks or watching rewarded
//! ads. This crate is the ledger and task engine behind that exchange,
//! plus a typed client for the timer-driven member flows.
//!
//! The router is exposed through [`create_app`] so integration tests can
//! serve it in-process without `cargo run` in another terminal.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::store::ExchangeStore;

/// Shared application state injected into every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExchangeStore>,
    pub config: Arc<AppConfig>,
}

/// Build the Axum router with all route modules and middleware.
///
/// The caller provides the state; this does not bind a listener or touch
/// the environment.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::auth::router())
        .merge(routes::profile::router())
        .merge(routes::tasks::router())
        .merge(routes::rewards::router())
        .merge(routes::admin::router())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
