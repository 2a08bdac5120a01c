//! Postgres-backed store.
//!
//! The claim procedures run inside a transaction and take `FOR UPDATE`
//! locks: the task row serializes all claims against one task (the
//! last-slot race has exactly one winner), and profile rows are locked in
//! ascending id order so two claims touching the same pair of accounts
//! cannot deadlock. The `(task_id, user_id)` primary key on executions is
//! the idempotence backstop underneath all of it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::catalog::{Platform, TaskStatus};
use crate::engine::{self, ClaimOutcome, ClaimRejection, TaskClaimContext};
use crate::models::{ExchangeCounts, Profile, Session, Task, TaskExecution};
use crate::store::{ExchangeStore, NewTask, StoreError, StoreResult};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExchangeStore for PgStore {
    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<Profile> {
        let inserted = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (email, password_hash)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(profile) => Ok(profile),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::EmailTaken)
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as("SELECT * FROM profiles WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn set_social_accounts(
        &self,
        user_id: Uuid,
        accounts: &BTreeMap<Platform, String>,
    ) -> StoreResult<Profile> {
        let profile = sqlx::query_as(
            r#"
            UPDATE profiles
            SET social_accounts = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(sqlx::types::Json(accounts))
        .fetch_optional(&self.pool)
        .await?;
        profile.ok_or(StoreError::NotFound)
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn session_by_hash(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as("SELECT * FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<()> {
        // Revocation is idempotent; deleting an unknown token is not an error.
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_task(&self, new: NewTask) -> StoreResult<Task> {
        let task = sqlx::query_as(
            r#"
            INSERT INTO tasks
                (user_id, platform, action_type, url,
                 cost_per_action, reward_per_action, target_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.platform)
        .bind(new.action_type)
        .bind(&new.url)
        .bind(new.cost_per_action)
        .bind(new.reward_per_action)
        .bind(new.target_quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(task)
    }

    async fn task(&self, task_id: Uuid) -> StoreResult<Option<Task>> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn available_tasks(
        &self,
        viewer: Uuid,
        platform: Option<Platform>,
    ) -> StoreResult<Vec<Task>> {
        let tasks = sqlx::query_as(
            r#"
            SELECT * FROM tasks
            WHERE status = 'active'
              AND user_id <> $1
              AND NOT EXISTS (
                  SELECT 1 FROM task_executions e
                  WHERE e.task_id = tasks.id AND e.user_id = $1
              )
              AND ($2::platform IS NULL OR platform = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(viewer)
        .bind(platform)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn tasks_by_owner(&self, owner: Uuid) -> StoreResult<Vec<Task>> {
        let tasks = sqlx::query_as(
            "SELECT * FROM tasks WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn set_task_status(
        &self,
        task_id: Uuid,
        owner: Uuid,
        status: TaskStatus,
    ) -> StoreResult<Task> {
        let task = sqlx::query_as(
            r#"
            UPDATE tasks
            SET status = $3
            WHERE id = $1 AND user_id = $2 AND status IN ('active', 'paused')
            RETURNING *
            "#,
        )
        .bind(task_id)
        .bind(owner)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        task.ok_or(StoreError::NotFound)
    }

    async fn delete_task(&self, task_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn claim_task_reward(
        &self,
        executor: Uuid,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome> {
        let mut tx = self.pool.begin().await?;

        // The task row lock serializes every claim against this task.
        let task: Option<Task> = sqlx::query_as("SELECT * FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(task) = task else {
            return Ok(ClaimOutcome::Rejected(ClaimRejection::TaskNotFound));
        };

        let already: Option<TaskExecution> = sqlx::query_as(
            "SELECT * FROM task_executions WHERE task_id = $1 AND user_id = $2",
        )
        .bind(task_id)
        .bind(executor)
        .fetch_optional(&mut *tx)
        .await?;

        // Lock both profile rows in ascending id order; claims touching the
        // same pair of accounts then always queue instead of deadlocking.
        let mut ids = [task.user_id, executor];
        ids.sort();
        let mut owner_points = 0i64;
        for id in ids {
            let (points,): (i64,) =
                sqlx::query_as("SELECT points FROM profiles WHERE id = $1 FOR UPDATE")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            if id == task.user_id {
                owner_points = points;
            }
        }

        let grant = match engine::vet_task_claim(&TaskClaimContext {
            task: &task,
            executor,
            already_executed: already.is_some(),
            owner_points,
        }) {
            Ok(grant) => grant,
            Err(rejection) => return Ok(ClaimOutcome::Rejected(rejection)),
        };

        sqlx::query(
            "INSERT INTO task_executions (task_id, user_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(task_id)
        .bind(executor)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE tasks SET current_quantity = current_quantity + 1, status = $2 WHERE id = $1")
            .bind(task_id)
            .bind(if grant.finishes_task {
                TaskStatus::Finished
            } else {
                task.status
            })
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE profiles SET points = points + $2 WHERE id = $1")
            .bind(executor)
            .bind(grant.reward)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE profiles SET points = points - $2 WHERE id = $1")
            .bind(task.user_id)
            .bind(grant.cost)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            task = %task_id,
            executor = %executor,
            owner = %task.user_id,
            reward = grant.reward,
            cost = grant.cost,
            "task reward claimed"
        );
        Ok(ClaimOutcome::Granted {
            points: grant.reward,
        })
    }

    async fn claim_ad_reward(
        &self,
        user_id: Uuid,
        reward: i64,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome> {
        let mut tx = self.pool.begin().await?;

        // The profile row is the per-user serialization point.
        let _: (i64,) = sqlx::query_as("SELECT points FROM profiles WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        let last: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT last_claimed_at FROM ad_reward_claims WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Err(rejection) = engine::vet_ad_claim(last.map(|(t,)| t), now, cooldown) {
            return Ok(ClaimOutcome::Rejected(rejection));
        }

        sqlx::query(
            r#"
            INSERT INTO ad_reward_claims (user_id, last_claimed_at)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET last_claimed_at = EXCLUDED.last_claimed_at
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE profiles SET points = points + $2 WHERE id = $1")
            .bind(user_id)
            .bind(reward)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(user = %user_id, reward, "ad reward claimed");
        Ok(ClaimOutcome::Granted { points: reward })
    }

    async fn counts(&self) -> StoreResult<ExchangeCounts> {
        let counts = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM profiles) AS users,
                (SELECT COUNT(*) FROM tasks) AS tasks,
                (SELECT COUNT(*) FROM tasks WHERE status = 'active') AS active_tasks
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn recent_profiles(&self, limit: i64) -> StoreResult<Vec<Profile>> {
        let profiles = sqlx::query_as(
            "SELECT * FROM profiles ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(profiles)
    }

    async fn recent_tasks(&self, limit: i64) -> StoreResult<Vec<Task>> {
        let tasks = sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn stop_task(&self, task_id: Uuid) -> StoreResult<Task> {
        let task = sqlx::query_as(
            "UPDATE tasks SET status = 'stopped' WHERE id = $1 RETURNING *",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        task.ok_or(StoreError::NotFound)
    }
}
