//! The rewarded-ad flow.
//!
//! One ad at a time: `start` refuses while a watch is running or the
//! post-view breather is active. The countdown is anchored to the start
//! instant and recomputed on demand, never decremented, so a stalled task
//! cannot stretch the ad. When the countdown expires the watcher settles:
//! exactly one claim call, then back to idle whatever the ledger said.
//! Cancelling before expiry forfeits the reward and claims nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tracing::debug;

use crate::client::{ClientError, ExchangeClient};

/// Where the watcher currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    Watching,
    Settling,
}

/// How a watch ended.
#[derive(Debug)]
pub enum WatchOutcome {
    /// The ad completed and the ledger credited the reward.
    Credited { points: i64 },
    /// The ad completed but the ledger refused (cooldown, usually).
    Refused { message: String },
    /// The ad completed but the claim never reached the ledger. The
    /// watcher does not retry; re-watching is a member action.
    Failed(ClientError),
    /// Cancelled before expiry; the reward is forfeited.
    Cancelled,
}

// Defaults mirror the production ad: a 30 second spot with a short
// breather before the next one.
const AD_DURATION: Duration = Duration::from_secs(30);
const RESTART_COOLDOWN: Duration = Duration::from_secs(5);

struct WatcherState {
    phase: WatchPhase,
    anchor: Option<Instant>,
    cooldown_until: Option<Instant>,
}

pub struct AdWatcher {
    client: Arc<ExchangeClient>,
    ad_duration: Duration,
    cooldown: Duration,
    state: Arc<Mutex<WatcherState>>,
}

impl AdWatcher {
    pub fn new(client: Arc<ExchangeClient>) -> Self {
        Self::with_timings(client, AD_DURATION, RESTART_COOLDOWN)
    }

    /// The same machine with injected durations; tests run it in
    /// milliseconds.
    pub fn with_timings(
        client: Arc<ExchangeClient>,
        ad_duration: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            client,
            ad_duration,
            cooldown,
            state: Arc::new(Mutex::new(WatcherState {
                phase: WatchPhase::Idle,
                anchor: None,
                cooldown_until: None,
            })),
        }
    }

    pub async fn phase(&self) -> WatchPhase {
        self.state.lock().await.phase
    }

    /// Time left on the current ad, recomputed from the start anchor.
    pub async fn remaining(&self) -> Option<Duration> {
        let state = self.state.lock().await;
        let anchor = state.anchor?;
        Some(self.ad_duration.saturating_sub(anchor.elapsed()))
    }

    /// Begin watching an ad. Returns the handle that observes or cancels
    /// this one watch.
    pub async fn start(&self) -> Result<WatchHandle, ClientError> {
        let started = {
            let mut state = self.state.lock().await;
            if state.phase != WatchPhase::Idle {
                return Err(ClientError::WatchBusy);
            }
            if let Some(until) = state.cooldown_until {
                if Instant::now() < until {
                    return Err(ClientError::WatchCooldown);
                }
            }
            let started = Instant::now();
            state.phase = WatchPhase::Watching;
            state.anchor = Some(started);
            started
        };

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<WatchOutcome>();
        let client = self.client.clone();
        let state = self.state.clone();
        let ad_duration = self.ad_duration;
        let cooldown = self.cooldown;

        tokio::spawn(async move {
            let deadline = started + ad_duration;
            tokio::select! {
                _ = cancel_rx => {
                    let mut st = state.lock().await;
                    st.phase = WatchPhase::Idle;
                    st.anchor = None;
                    drop(st);
                    debug!("ad watch cancelled; reward forfeited");
                    let _ = done_tx.send(WatchOutcome::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    {
                        let mut st = state.lock().await;
                        st.phase = WatchPhase::Settling;
                        st.anchor = None;
                    }
                    let outcome = match client.claim_ad_reward().await {
                        Ok(res) if res.success => WatchOutcome::Credited {
                            points: res.points.unwrap_or_default(),
                        },
                        Ok(res) => WatchOutcome::Refused {
                            message: res.message.unwrap_or_default(),
                        },
                        Err(err) => WatchOutcome::Failed(err),
                    };
                    let mut st = state.lock().await;
                    st.phase = WatchPhase::Idle;
                    st.cooldown_until = Some(Instant::now() + cooldown);
                    drop(st);
                    let _ = done_tx.send(outcome);
                }
            }
        });

        Ok(WatchHandle {
            cancel: Some(cancel_tx),
            done: done_rx,
        })
    }
}

/// Handle to one running watch. Dropping it cancels the watch, so a torn
/// down caller never leaves a timer that later claims.
pub struct WatchHandle {
    cancel: Option<oneshot::Sender<()>>,
    done: oneshot::Receiver<WatchOutcome>,
}

impl WatchHandle {
    /// Abandon the ad before it finishes. Nothing is claimed. Has no
    /// effect once the countdown has expired and settling began.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Wait for the watch to settle or observe the cancellation.
    pub async fn finished(self) -> WatchOutcome {
        self.done.await.unwrap_or(WatchOutcome::Cancelled)
    }
}
