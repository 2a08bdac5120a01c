//! The task execution flow.
//!
//! A member opens the target URL (telegram links become deep links), the
//! runner waits out the action's verification window, then claims the
//! reward exactly once. One execution in flight at a time; cancelling
//! before the window elapses claims nothing. A linked account for the
//! task's platform is required before anything starts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::catalog;
use crate::client::{ClientError, ExchangeClient};
use crate::models::{ProfileView, Task};

/// What one execution asks of the member: where to go, and how long the
/// runner waits before claiming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub open_url: String,
    pub wait: Duration,
}

/// How an execution ended.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The ledger credited the reward.
    Credited { points: i64 },
    /// The ledger refused: already claimed, own task, slots gone, and so
    /// on. The runner does not retry.
    Refused { message: String },
    /// The claim never reached the ledger.
    Failed(ClientError),
    /// Cancelled before the verification window elapsed; nothing claimed.
    Cancelled,
}

pub struct TaskRunner {
    client: Arc<ExchangeClient>,
    wait_override: Option<Duration>,
    in_flight: Arc<Mutex<Option<Uuid>>>,
}

impl TaskRunner {
    pub fn new(client: Arc<ExchangeClient>) -> Self {
        Self {
            client,
            wait_override: None,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// The same flow with a fixed verification wait; tests run it in
    /// milliseconds.
    pub fn with_wait_override(client: Arc<ExchangeClient>, wait: Duration) -> Self {
        Self {
            client,
            wait_override: Some(wait),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// The task currently being executed, if any.
    pub async fn current(&self) -> Option<Uuid> {
        *self.in_flight.lock().await
    }

    /// Gate and describe an execution without starting it: the linked
    /// account check and the URL the member would open.
    pub fn plan(&self, task: &Task, profile: &ProfileView) -> Result<ExecutionPlan, ClientError> {
        if !profile.social_accounts.contains_key(&task.platform) {
            return Err(ClientError::AccountNotLinked(task.platform));
        }
        Ok(ExecutionPlan {
            open_url: catalog::execution_url(task.platform, &task.url),
            wait: self
                .wait_override
                .unwrap_or_else(|| task.action_type.rate().wait),
        })
    }

    /// Start executing a task. Checks the linked-account gate against a
    /// fresh profile, reserves the single in-flight slot, then waits and
    /// claims.
    pub async fn start(&self, task: &Task) -> Result<ExecutionHandle, ClientError> {
        let profile = self.client.profile().await?;
        let plan = self.plan(task, &profile)?;

        {
            let mut slot = self.in_flight.lock().await;
            if slot.is_some() {
                return Err(ClientError::ExecutionBusy);
            }
            *slot = Some(task.id);
        }

        debug!(
            task = %task.id,
            url = %plan.open_url,
            wait_ms = plan.wait.as_millis() as u64,
            "execution started"
        );

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<ExecutionOutcome>();
        let client = self.client.clone();
        let slot = self.in_flight.clone();
        let task_id = task.id;
        let wait = plan.wait;

        tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + wait;
            let outcome = tokio::select! {
                _ = cancel_rx => {
                    debug!(task = %task_id, "execution cancelled; nothing claimed");
                    ExecutionOutcome::Cancelled
                }
                _ = tokio::time::sleep_until(deadline) => {
                    match client.claim_task_reward(task_id).await {
                        Ok(res) if res.success => ExecutionOutcome::Credited {
                            points: res.points.unwrap_or_default(),
                        },
                        Ok(res) => ExecutionOutcome::Refused {
                            message: res.message.unwrap_or_default(),
                        },
                        Err(err) => ExecutionOutcome::Failed(err),
                    }
                }
            };
            *slot.lock().await = None;
            let _ = done_tx.send(outcome);
        });

        Ok(ExecutionHandle {
            plan,
            cancel: Some(cancel_tx),
            done: done_rx,
        })
    }
}

/// Handle to one running execution. Dropping it cancels the wait.
pub struct ExecutionHandle {
    pub plan: ExecutionPlan,
    cancel: Option<oneshot::Sender<()>>,
    done: oneshot::Receiver<ExecutionOutcome>,
}

impl ExecutionHandle {
    /// Abandon the execution; nothing is claimed. Has no effect once the
    /// verification window has elapsed and the claim is under way.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Wait for the claim outcome or observe the cancellation.
    pub async fn finished(self) -> ExecutionOutcome {
        self.done.await.unwrap_or(ExecutionOutcome::Cancelled)
    }
}
