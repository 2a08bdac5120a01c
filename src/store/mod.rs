//! Storage backends for the exchange ledger.
//!
//! `ExchangeStore` is deliberately coarse: every method is atomic within
//! its backend, so the claim procedures can promise exactly-once effects
//! without the HTTP layer knowing how each backend serializes them.
//! Postgres does it with row locks inside a transaction; the in-memory
//! backend (local development, tests) with a whole-state write lock.
//!
//! Claim methods take `now` from the caller so tests can steer the clock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{ActionType, Platform, TaskStatus};
use crate::engine::ClaimOutcome;
use crate::models::{ExchangeCounts, Profile, Session, Task};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage failures. Business rejections of the claim procedures are not
/// errors; they come back as `ClaimOutcome::Rejected`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailTaken,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Backend(other.into()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Parameters for a new task, produced by the route layer after catalog
/// validation. Rates arrive here already derived; the store never prices.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: Uuid,
    pub platform: Platform,
    pub action_type: ActionType,
    pub url: String,
    pub cost_per_action: i64,
    pub reward_per_action: i64,
    pub target_quantity: i32,
}

#[async_trait]
pub trait ExchangeStore: Send + Sync {
    // Accounts
    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<Profile>;
    async fn profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;
    async fn profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>>;
    async fn set_social_accounts(
        &self,
        user_id: Uuid,
        accounts: &BTreeMap<Platform, String>,
    ) -> StoreResult<Profile>;

    // Sessions
    async fn insert_session(&self, session: &Session) -> StoreResult<()>;
    async fn session_by_hash(&self, token_hash: &str) -> StoreResult<Option<Session>>;
    async fn delete_session(&self, token_hash: &str) -> StoreResult<()>;

    // Tasks
    async fn insert_task(&self, new: NewTask) -> StoreResult<Task>;
    async fn task(&self, task_id: Uuid) -> StoreResult<Option<Task>>;
    /// Active tasks the viewer can execute: not their own, not already
    /// executed by them, newest first, optionally narrowed to one platform.
    async fn available_tasks(
        &self,
        viewer: Uuid,
        platform: Option<Platform>,
    ) -> StoreResult<Vec<Task>>;
    async fn tasks_by_owner(&self, owner: Uuid) -> StoreResult<Vec<Task>>;
    /// Owner toggle. Only flips tasks currently active or paused; a task
    /// that raced into a terminal state comes back as `NotFound`.
    async fn set_task_status(
        &self,
        task_id: Uuid,
        owner: Uuid,
        status: TaskStatus,
    ) -> StoreResult<Task>;
    async fn delete_task(&self, task_id: Uuid) -> StoreResult<()>;

    // Ledger procedures
    async fn claim_task_reward(
        &self,
        executor: Uuid,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome>;
    async fn claim_ad_reward(
        &self,
        user_id: Uuid,
        reward: i64,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome>;

    // Moderation
    async fn counts(&self) -> StoreResult<ExchangeCounts>;
    async fn recent_profiles(&self, limit: i64) -> StoreResult<Vec<Profile>>;
    async fn recent_tasks(&self, limit: i64) -> StoreResult<Vec<Task>>;
    async fn stop_task(&self, task_id: Uuid) -> StoreResult<Task>;
}
