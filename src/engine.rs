//! Claim vetting for the exchange ledger.
//!
//! Both storage backends funnel claims through these checks, so the
//! grant/reject decision is identical no matter where state lives. The
//! backends own atomicity and locking; this module owns the rules.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::TaskStatus;
use crate::models::Task;

/// Why a claim was refused. These are business outcomes, not errors; they
/// surface to the API as `success: false` with the message below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimRejection {
    #[error("task not found")]
    TaskNotFound,
    #[error("task is not active")]
    TaskNotActive,
    #[error("you cannot claim a reward for your own task")]
    OwnTask,
    #[error("reward already claimed for this task")]
    AlreadyClaimed,
    #[error("no task slots remaining")]
    QuantityExhausted,
    #[error("task owner cannot fund this reward right now")]
    OwnerInsolvent,
    #[error("ad reward is on cooldown")]
    CooldownActive,
}

/// Outcome of a ledger claim procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Granted { points: i64 },
    Rejected(ClaimRejection),
}

/// Everything `vet_task_claim` needs to decide on a claim. The caller must
/// read these under whatever lock makes the subsequent writes atomic.
#[derive(Debug)]
pub struct TaskClaimContext<'a> {
    pub task: &'a Task,
    pub executor: Uuid,
    pub already_executed: bool,
    pub owner_points: i64,
}

/// Ledger effects of a granted task claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskClaimGrant {
    pub reward: i64,
    pub cost: i64,
    /// This claim consumes the last slot; the task flips to finished.
    pub finishes_task: bool,
}

/// Vet a task-reward claim in the canonical order: status, self-claim,
/// replay, quantity, owner solvency.
///
/// Owners are debited per completed execution, never up front, so the
/// owner's balance can legitimately fall below the per-action cost while a
/// task is live. Such claims are refused rather than letting the balance
/// go negative; the task stays claimable for when the owner earns again.
pub fn vet_task_claim(ctx: &TaskClaimContext<'_>) -> Result<TaskClaimGrant, ClaimRejection> {
    let task = ctx.task;
    if task.status != TaskStatus::Active {
        return Err(ClaimRejection::TaskNotActive);
    }
    if task.user_id == ctx.executor {
        return Err(ClaimRejection::OwnTask);
    }
    if ctx.already_executed {
        return Err(ClaimRejection::AlreadyClaimed);
    }
    if task.current_quantity >= task.target_quantity {
        return Err(ClaimRejection::QuantityExhausted);
    }
    if ctx.owner_points < task.cost_per_action {
        return Err(ClaimRejection::OwnerInsolvent);
    }
    Ok(TaskClaimGrant {
        reward: task.reward_per_action,
        cost: task.cost_per_action,
        finishes_task: task.current_quantity + 1 >= task.target_quantity,
    })
}

/// Vet an ad-reward claim: refused while the previous grant is younger
/// than the cooldown window.
pub fn vet_ad_claim(
    last_claimed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Result<(), ClaimRejection> {
    if let Some(last) = last_claimed_at {
        if now - last < cooldown {
            return Err(ClaimRejection::CooldownActive);
        }
    }
    Ok(())
}

/// Total points a new task commits its owner to, or `None` on overflow.
pub fn creation_cost(cost_per_action: i64, target_quantity: i32) -> Option<i64> {
    cost_per_action.checked_mul(i64::from(target_quantity))
}
