//! Keep-alive timer
//!
//! While active, calls `keepAlive` on the command namespace once per interval
//! without waiting for the answer.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::dispatcher::{Dispatcher, PendingCall};
use super::payload::COMMAND_NAMESPACE;
use crate::cdp::types::ObjectHandle;

/// Remote method called on every tick
pub const KEEP_ALIVE_METHOD: &str = "keepAlive";

/// Periodic keep-alive calls against one command handle
#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    /// Create a stopped heartbeat
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: Mutex::new(None),
        }
    }

    /// Tick interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking against `target`, replacing any running timer
    pub async fn start(&self, dispatcher: Dispatcher, target: ObjectHandle) {
        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let interval = self.interval;
        debug!("Starting keep-alive every {:?} on {}", interval, target);

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let dispatcher = dispatcher.clone();
                let call = PendingCall::new(target.clone(), COMMAND_NAMESPACE, KEEP_ALIVE_METHOD);
                tokio::spawn(async move {
                    if let Err(e) = dispatcher.dispatch(call).await {
                        warn!("Keep-alive failed: {}", e);
                    }
                });
            }
        }));
    }

    /// Stop ticking; stopping a stopped heartbeat does nothing
    pub async fn stop(&self) {
        if let Some(task) = self.task.lock().await.take() {
            debug!("Stopping keep-alive");
            task.abort();
        }
    }

    /// Whether a timer is running
    pub async fn is_active(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
