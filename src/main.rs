//! # boostex service
//!
//! The exchange API server: accounts and sessions, the task catalog and
//! availability feed, and the two ledger procedures (task-reward and
//! ad-reward claims).
//!
//! ## Architecture
//!
//! - Axum handles HTTP routing and the request/response lifecycle
//! - SQLx manages the Postgres ledger (profiles, tasks, execution facts)
//! - An in-memory store backs local development (`APP_STORE=memory`)
//!   and the test suite

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use boostex::config::{AppConfig, StoreKind};
use boostex::store::{ExchangeStore, MemoryStore, PgStore};
use boostex::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boostex=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting boostex exchange service");

    let config = Arc::new(AppConfig::from_env());

    let store: Arc<dyn ExchangeStore> = match config.store_kind {
        StoreKind::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&config.database_url)
                .await?;
            info!("Connected to ledger database");

            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Migrations complete");

            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            info!("Using the in-memory store; state is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let app = create_app(AppState {
        store,
        config: config.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
