//! Best-effort liveness reporting to the registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::protocol::SignedRequest;
use crate::transport::Transport;

/// Heartbeat counters for monitoring.
#[derive(Debug, Default)]
pub struct HeartbeatStats {
    attempts: AtomicU64,
    failures: AtomicU64,
}

impl HeartbeatStats {
    fn record(&self, success: bool) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Total heartbeats sent.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Heartbeats the registry did not acknowledge with a 200.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Handle to the running heartbeat task.
///
/// Dropping the handle detaches the task; it keeps running for the lifetime
/// of the runtime.
#[derive(Debug)]
pub struct HeartbeatHandle {
    task: JoinHandle<()>,
    stats: Arc<HeartbeatStats>,
}

impl HeartbeatHandle {
    pub fn stats(&self) -> Arc<HeartbeatStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop sending heartbeats.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Spawn the heartbeat loop. The first beat goes out immediately.
///
/// A failed beat is logged and counted, never retried before the next tick.
pub(crate) fn spawn_heartbeat(
    transport: Arc<dyn Transport>,
    request: SignedRequest,
    interval: Duration,
) -> HeartbeatHandle {
    let stats = Arc::new(HeartbeatStats::default());
    let task_stats = Arc::clone(&stats);

    let task = tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            let success = match transport.send(request.clone()).await {
                Ok(response) if response.is_ok() => {
                    debug!(url = %request.url, "Heartbeat acknowledged");
                    true
                }
                Ok(response) => {
                    warn!(
                        url = %request.url,
                        status = response.status,
                        "Heartbeat rejected by registry"
                    );
                    false
                }
                Err(e) => {
                    warn!(url = %request.url, error = %e, "Heartbeat failed");
                    false
                }
            };
            task_stats.record(success);
        }
    });

    HeartbeatHandle { task, stats }
}
