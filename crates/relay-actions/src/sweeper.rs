//! Background reconciliation of expired approval requests.
//!
//! Requests that are never explicitly resolved must still leave the pending
//! set once their deadline passes. The sweeper runs a fixed-interval loop
//! owned and started by the composition root, not spawned implicitly at
//! construction time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

use crate::approval::ApprovalCoordinator;

/// Periodic task that force-expires stale approval requests.
pub struct ExpirationSweeper {
    approvals: Arc<ApprovalCoordinator>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl ExpirationSweeper {
    /// Create a sweeper over the given coordinator with a fixed interval.
    pub fn new(approvals: Arc<ApprovalCoordinator>, interval: Duration) -> Self {
        Self {
            approvals,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Run the sweep loop until a shutdown signal arrives.
    pub async fn run(&self) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    let expired = self.approvals.sweep_expired();
                    if !expired.is_empty() {
                        info!(count = expired.len(), "Swept expired approval requests");
                    }
                }
                _ = self.shutdown.notified() => {
                    return; // Graceful shutdown
                }
            }
        }
    }

    /// Signal the sweeper to shut down gracefully.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}
