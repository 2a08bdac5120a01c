//! Typed client for the exchange API.
//!
//! `ExchangeClient` wraps the HTTP surface and keeps the signed-in session
//! in a watch channel, so UI layers read it synchronously or subscribe to
//! auth-state changes instead of polling. The timer-driven flows build on
//! top of it: `ads` runs the rewarded-ad countdown and `execution` runs
//! the wait-then-claim task flow.

pub mod ads;
pub mod execution;

pub use ads::{AdWatcher, WatchHandle, WatchOutcome, WatchPhase};
pub use execution::{ExecutionHandle, ExecutionOutcome, ExecutionPlan, TaskRunner};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::catalog::{Platform, TaskStatus};
use crate::models::{
    ApiResponse, ClaimResponse, ClaimTaskRequest, CreateTaskRequest, ExchangeCounts,
    LinkAccountsRequest, LoginRequest, ProfileView, RegisterRequest, SessionResponse, Task,
    UpdateTaskStatusRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("not signed in")]
    NotSignedIn,
    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("no linked {0} account")]
    AccountNotLinked(Platform),
    #[error("an execution is already in flight")]
    ExecutionBusy,
    #[error("an ad is already playing")]
    WatchBusy,
    #[error("ad rewards are cooling down")]
    WatchCooldown,
}

/// The signed-in session as the client holds it. The raw token lives only
/// here and in the request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub struct ExchangeClient {
    http: reqwest::Client,
    base_url: String,
    session_tx: watch::Sender<Option<ClientSession>>,
}

impl ExchangeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            session_tx: watch::channel(None).0,
        }
    }

    /// The current session, if signed in.
    pub fn session(&self) -> Option<ClientSession> {
        self.session_tx.borrow().clone()
    }

    /// Subscribe to auth-state changes: sign-in, sign-out, and sessions
    /// dropped because the server stopped honoring them.
    pub fn subscribe(&self) -> watch::Receiver<Option<ClientSession>> {
        self.session_tx.subscribe()
    }

    // ---- auth ----

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<ProfileView, ClientError> {
        let body: ApiResponse<ProfileView> = self
            .send(self.http.post(self.url("/auth/register")).json(&RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
            }))
            .await?;
        Ok(body.data)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<ClientSession, ClientError> {
        let body: ApiResponse<SessionResponse> = self
            .send(self.http.post(self.url("/auth/login")).json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            }))
            .await?;
        let session = ClientSession {
            token: body.data.token,
            user_id: body.data.user_id,
            expires_at: body.data.expires_at,
        };
        self.session_tx.send_replace(Some(session.clone()));
        Ok(session)
    }

    /// Revoke the session server-side and forget it locally. A no-op when
    /// already signed out.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        if self.session().is_none() {
            return Ok(());
        }
        let _: ApiResponse<()> = self.send(self.http.post(self.url("/auth/logout"))).await?;
        self.session_tx.send_replace(None);
        Ok(())
    }

    // ---- profile ----

    pub async fn profile(&self) -> Result<ProfileView, ClientError> {
        let body: ApiResponse<ProfileView> =
            self.send(self.http.get(self.url("/profile"))).await?;
        Ok(body.data)
    }

    pub async fn link_accounts(
        &self,
        accounts: BTreeMap<Platform, String>,
    ) -> Result<ProfileView, ClientError> {
        let body: ApiResponse<ProfileView> = self
            .send(
                self.http
                    .put(self.url("/profile/social-accounts"))
                    .json(&LinkAccountsRequest { accounts }),
            )
            .await?;
        Ok(body.data)
    }

    // ---- tasks ----

    pub async fn available_tasks(
        &self,
        platform: Option<Platform>,
    ) -> Result<Vec<Task>, ClientError> {
        let mut req = self.http.get(self.url("/tasks/available"));
        if let Some(platform) = platform {
            req = req.query(&[("platform", platform.as_str())]);
        }
        let body: ApiResponse<Vec<Task>> = self.send(req).await?;
        Ok(body.data)
    }

    pub async fn create_task(&self, req: CreateTaskRequest) -> Result<Task, ClientError> {
        let body: ApiResponse<Task> =
            self.send(self.http.post(self.url("/tasks")).json(&req)).await?;
        Ok(body.data)
    }

    pub async fn my_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let body: ApiResponse<Vec<Task>> =
            self.send(self.http.get(self.url("/tasks/mine"))).await?;
        Ok(body.data)
    }

    pub async fn set_task_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
    ) -> Result<Task, ClientError> {
        let body: ApiResponse<Task> = self
            .send(
                self.http
                    .patch(self.url(&format!("/tasks/{}/status", task_id)))
                    .json(&UpdateTaskStatusRequest { status }),
            )
            .await?;
        Ok(body.data)
    }

    pub async fn delete_task(&self, task_id: Uuid) -> Result<(), ClientError> {
        let _: ApiResponse<()> = self
            .send(self.http.delete(self.url(&format!("/tasks/{}", task_id))))
            .await?;
        Ok(())
    }

    // ---- ledger procedures ----

    pub async fn claim_task_reward(&self, task_id: Uuid) -> Result<ClaimResponse, ClientError> {
        self.send(
            self.http
                .post(self.url("/rpc/claim_task_reward"))
                .json(&ClaimTaskRequest { task_id }),
        )
        .await
    }

    pub async fn claim_ad_reward(&self) -> Result<ClaimResponse, ClientError> {
        self.send(self.http.post(self.url("/rpc/claim_ad_reward")))
            .await
    }

    // ---- moderation ----

    pub async fn admin_overview(&self) -> Result<ExchangeCounts, ClientError> {
        let body: ApiResponse<ExchangeCounts> =
            self.send(self.http.get(self.url("/admin/overview"))).await?;
        Ok(body.data)
    }

    pub async fn admin_recent_users(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<ProfileView>, ClientError> {
        let mut req = self.http.get(self.url("/admin/users"));
        if let Some(limit) = limit {
            req = req.query(&[("limit", limit)]);
        }
        let body: ApiResponse<Vec<ProfileView>> = self.send(req).await?;
        Ok(body.data)
    }

    pub async fn admin_recent_tasks(&self, limit: Option<i64>) -> Result<Vec<Task>, ClientError> {
        let mut req = self.http.get(self.url("/admin/tasks"));
        if let Some(limit) = limit {
            req = req.query(&[("limit", limit)]);
        }
        let body: ApiResponse<Vec<Task>> = self.send(req).await?;
        Ok(body.data)
    }

    pub async fn admin_stop_task(&self, task_id: Uuid) -> Result<Task, ClientError> {
        let body: ApiResponse<Task> = self
            .send(
                self.http
                    .post(self.url(&format!("/admin/tasks/{}/stop", task_id))),
            )
            .await?;
        Ok(body.data)
    }

    pub async fn admin_delete_task(&self, task_id: Uuid) -> Result<(), ClientError> {
        let _: ApiResponse<()> = self
            .send(self.http.delete(self.url(&format!("/admin/tasks/{}", task_id))))
            .await?;
        Ok(())
    }

    // ---- plumbing ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let req = match self.session() {
            Some(session) => req.bearer_auth(&session.token),
            None => req,
        };
        let res = req.send().await?;
        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            // The server no longer honors this token; drop the local
            // session so subscribers observe the sign-out.
            self.session_tx.send_replace(None);
        }
        if !status.is_success() {
            let message = res
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::Api { status, message });
        }
        Ok(res.json().await?)
    }
}
