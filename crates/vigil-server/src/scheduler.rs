//! In-process release scheduler.
//!
//! Runs a routine pass every `interval`, bypassing admission control. A failed
//! pass is logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use vigil_core::effects::ReleaseEffects;
use vigil_release::ReleaseEngine;

#[derive(Debug, Clone, Copy)]
pub struct ReleaseScheduler {
    interval: Duration,
}

impl ReleaseScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Spawn the tick loop. It stops once `shutdown` observes `true` or its sender drops.
    pub fn spawn<E>(
        self,
        engine: Arc<ReleaseEngine<E>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()>
    where
        E: ReleaseEffects + 'static,
    {
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval_millis(period), "release scheduler started");

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match engine.run_scheduled().await {
                            Ok(report) => debug!(
                                released = report.released_configurations,
                                messages = report.messages_released,
                                "scheduled pass finished"
                            ),
                            Err(e) => error!(error = %e, "scheduled pass failed"),
                        }
                    }
                }
            }
            info!("release scheduler stopped");
        })
    }

    /// Spawn with its own shutdown channel.
    pub fn start<E>(self, engine: Arc<ReleaseEngine<E>>) -> SchedulerHandle
    where
        E: ReleaseEffects + 'static,
    {
        let (stop, rx) = watch::channel(false);
        SchedulerHandle {
            stop,
            task: self.spawn(engine, rx),
        }
    }
}

/// Milliseconds for logging, saturating at `u64::MAX`.
fn interval_millis(period: Duration) -> u64 {
    u64::try_from(period.as_millis()).unwrap_or(u64::MAX)
}

/// Running scheduler owned by the caller.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop and wait for the in-flight pass, if any, to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "release scheduler task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_millis_saturates() {
        assert_eq!(interval_millis(Duration::from_secs(30)), 30_000);
        assert_eq!(interval_millis(Duration::MAX), u64::MAX);
    }
}
