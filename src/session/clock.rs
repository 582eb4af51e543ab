//! The pausable elapsed-time clock.
//!
//! A periodic task advances the status handle's elapsed counter once per
//! tick while the session is live. Pause gates the tick instead of killing
//! the task, so elapsed time is monotonically non-decreasing and only
//! advances between pause gaps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::EngineError;

use super::status::SessionStatusHandle;

pub struct SessionClock {
    paused: Arc<AtomicBool>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionClock {
    /// Start ticking against the given status handle.
    pub fn spawn(status: SessionStatusHandle, tick: Duration) -> Self {
        let paused = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        let task_paused = paused.clone();
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick completes immediately; skip it so the
            // counter starts at zero.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if task_paused.load(Ordering::SeqCst) {
                            continue;
                        }
                        status.tick().await;
                    }
                }
            }
            debug!("Session clock stopped");
        });

        Self {
            paused,
            token,
            task: Some(task),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Stop the clock for good. Idempotent; called by teardown.
    pub async fn halt(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(
                    "{}",
                    EngineError::Resource(format!("clock task failed: {e}"))
                );
            }
        }
    }
}
