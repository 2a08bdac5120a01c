//! In-memory store for local development and tests.
//!
//! A single `RwLock` over the whole state; claim procedures take the write
//! lock for their entire body, which gives them the same serialization the
//! Postgres backend gets from row locks.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::catalog::{Platform, Role, TaskStatus};
use crate::engine::{self, ClaimOutcome, ClaimRejection, TaskClaimContext};
use crate::models::{ExchangeCounts, Profile, Session, Task, TaskExecution};
use crate::store::{ExchangeStore, NewTask, StoreError, StoreResult};

#[derive(Default)]
struct State {
    profiles: HashMap<Uuid, Profile>,
    sessions: HashMap<String, Session>,
    tasks: HashMap<Uuid, Task>,
    executions: HashMap<(Uuid, Uuid), TaskExecution>,
    ad_claims: HashMap<Uuid, DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/dev helper: add points to an account out of band.
    pub async fn credit_points(&self, user_id: Uuid, amount: i64) {
        let mut state = self.state.write().await;
        if let Some(profile) = state.profiles.get_mut(&user_id) {
            profile.points += amount;
        }
    }

    /// Test/dev helper: grant the moderation role. There is no self-serve
    /// path to admin through the API.
    pub async fn promote_to_admin(&self, user_id: Uuid) {
        let mut state = self.state.write().await;
        if let Some(profile) = state.profiles.get_mut(&user_id) {
            profile.role = Role::Admin;
        }
    }
}

#[async_trait]
impl ExchangeStore for MemoryStore {
    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<Profile> {
        let mut state = self.state.write().await;
        if state.profiles.values().any(|p| p.email == email) {
            return Err(StoreError::EmailTaken);
        }
        let profile = Profile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            points: 0,
            role: Role::User,
            social_accounts: BTreeMap::new(),
            created_at: Utc::now(),
        };
        state.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(&user_id).cloned())
    }

    async fn profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        let state = self.state.read().await;
        Ok(state.profiles.values().find(|p| p.email == email).cloned())
    }

    async fn set_social_accounts(
        &self,
        user_id: Uuid,
        accounts: &BTreeMap<Platform, String>,
    ) -> StoreResult<Profile> {
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        profile.social_accounts = accounts.clone();
        Ok(profile.clone())
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn session_by_hash(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(self.state.read().await.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<()> {
        self.state.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn insert_task(&self, new: NewTask) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        let task = Task {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            platform: new.platform,
            action_type: new.action_type,
            url: new.url,
            cost_per_action: new.cost_per_action,
            reward_per_action: new.reward_per_action,
            target_quantity: new.target_quantity,
            current_quantity: 0,
            status: TaskStatus::Active,
            created_at: Utc::now(),
        };
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn task(&self, task_id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.state.read().await.tasks.get(&task_id).cloned())
    }

    async fn available_tasks(
        &self,
        viewer: Uuid,
        platform: Option<Platform>,
    ) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Active)
            .filter(|t| t.user_id != viewer)
            .filter(|t| !state.executions.contains_key(&(t.id, viewer)))
            .filter(|t| platform.map_or(true, |p| t.platform == p))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn tasks_by_owner(&self, owner: Uuid) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn set_task_status(
        &self,
        task_id: Uuid,
        owner: Uuid,
        status: TaskStatus,
    ) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&task_id).ok_or(StoreError::NotFound)?;
        if task.user_id != owner
            || !matches!(task.status, TaskStatus::Active | TaskStatus::Paused)
        {
            return Err(StoreError::NotFound);
        }
        task.status = status;
        Ok(task.clone())
    }

    async fn delete_task(&self, task_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.tasks.remove(&task_id).ok_or(StoreError::NotFound)?;
        state.executions.retain(|(tid, _), _| *tid != task_id);
        Ok(())
    }

    async fn claim_task_reward(
        &self,
        executor: Uuid,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome> {
        let mut state = self.state.write().await;

        let Some(task) = state.tasks.get(&task_id).cloned() else {
            return Ok(ClaimOutcome::Rejected(ClaimRejection::TaskNotFound));
        };
        if !state.profiles.contains_key(&executor) {
            return Err(StoreError::NotFound);
        }
        let owner_points = state
            .profiles
            .get(&task.user_id)
            .map(|p| p.points)
            .unwrap_or_default();

        let grant = match engine::vet_task_claim(&TaskClaimContext {
            task: &task,
            executor,
            already_executed: state.executions.contains_key(&(task_id, executor)),
            owner_points,
        }) {
            Ok(grant) => grant,
            Err(rejection) => return Ok(ClaimOutcome::Rejected(rejection)),
        };

        state.executions.insert(
            (task_id, executor),
            TaskExecution {
                task_id,
                user_id: executor,
                created_at: now,
            },
        );
        if let Some(t) = state.tasks.get_mut(&task_id) {
            t.current_quantity += 1;
            if grant.finishes_task {
                t.status = TaskStatus::Finished;
            }
        }
        if let Some(p) = state.profiles.get_mut(&executor) {
            p.points += grant.reward;
        }
        if let Some(p) = state.profiles.get_mut(&task.user_id) {
            p.points -= grant.cost;
        }

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
        let mut state = self.state.write().await;
        if !state.profiles.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }

        let last = state.ad_claims.get(&user_id).copied();
        if let Err(rejection) = engine::vet_ad_claim(last, now, cooldown) {
            return Ok(ClaimOutcome::Rejected(rejection));
        }

        state.ad_claims.insert(user_id, now);
        if let Some(p) = state.profiles.get_mut(&user_id) {
            p.points += reward;
        }

        info!(user = %user_id, reward, "ad reward claimed");
        Ok(ClaimOutcome::Granted { points: reward })
    }

    async fn counts(&self) -> StoreResult<ExchangeCounts> {
        let state = self.state.read().await;
        Ok(ExchangeCounts {
            users: state.profiles.len() as i64,
            tasks: state.tasks.len() as i64,
            active_tasks: state
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Active)
                .count() as i64,
        })
    }

    async fn recent_profiles(&self, limit: i64) -> StoreResult<Vec<Profile>> {
        let state = self.state.read().await;
        let mut profiles: Vec<Profile> = state.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        profiles.truncate(limit.max(0) as usize);
        Ok(profiles)
    }

    async fn recent_tasks(&self, limit: i64) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit.max(0) as usize);
        Ok(tasks)
    }

    async fn stop_task(&self, task_id: Uuid) -> StoreResult<Task> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(&task_id).ok_or(StoreError::NotFound)?;
        task.status = TaskStatus::Stopped;
        Ok(task.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_task(store: &MemoryStore, owner_points: i64) -> (Profile, Task) {
        let owner = store
            .create_account("owner@example.com", "x")
            .await
            .unwrap();
        store.credit_points(owner.id, owner_points).await;
        let task = store
            .insert_task(NewTask {
                user_id: owner.id,
                platform: Platform::Youtube,
                action_type: crate::catalog::ActionType::Subscribe,
                url: "https://youtube.com/@chan".into(),
                cost_per_action: 5,
                reward_per_action: 3,
                target_quantity: 1,
            })
            .await
            .unwrap();
        (owner, task)
    }

    #[tokio::test]
    async fn duplicate_email_is_refused() {
        let store = MemoryStore::new();
        store.create_account("a@example.com", "x").await.unwrap();
        let err = store.create_account("a@example.com", "y").await;
        assert!(matches!(err, Err(StoreError::EmailTaken)));
    }

    #[tokio::test]
    async fn claim_moves_points_and_finishes() {
        let store = MemoryStore::new();
        let (owner, task) = seeded_task(&store, 10).await;
        let executor = store.create_account("exec@example.com", "x").await.unwrap();

        let outcome = store
            .claim_task_reward(executor.id, task.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Granted { points: 3 });

        let task = store.task(task.id).await.unwrap().unwrap();
        assert_eq!(task.current_quantity, 1);
        assert_eq!(task.status, TaskStatus::Finished);
        assert_eq!(store.profile(executor.id).await.unwrap().unwrap().points, 3);
        assert_eq!(store.profile(owner.id).await.unwrap().unwrap().points, 5);
    }

    #[tokio::test]
    async fn replayed_claim_is_rejected() {
        let store = MemoryStore::new();
        let (_, task) = seeded_task(&store, 10).await;
        let executor = store.create_account("exec@example.com", "x").await.unwrap();

        store
            .claim_task_reward(executor.id, task.id, Utc::now())
            .await
            .unwrap();
        let outcome = store
            .claim_task_reward(executor.id, task.id, Utc::now())
            .await
            .unwrap();
        // The finished status wins over the replay check, either way: no grant.
        assert!(matches!(outcome, ClaimOutcome::Rejected(_)));
        assert_eq!(store.profile(executor.id).await.unwrap().unwrap().points, 3);
    }
}
