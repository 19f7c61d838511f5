//! # LogWriter: pool event logger
//!
//! A minimal subscriber that forwards incoming [`Event`]s to `tracing`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO poolvisor: worker spawned pool="4b1c.." worker="4b1c..#1" ports=10000-34999
//! WARN poolvisor: worker closed pool="4b1c.." worker="4b1c..#1" reason="worker died: SIGKILL"
//! INFO poolvisor: room placed pool="4b1c.." worker="4b1c..#2" room="7f2e.."
//! INFO poolvisor: pool closed pool="4b1c.." reason=None
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let pool = e.pool.as_deref().unwrap_or("-");
        let worker = e.worker.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::WorkerSpawned => {
                tracing::info!(target: "poolvisor", pool, worker, ports = ?e.ports, "worker spawned");
            }
            EventKind::WorkerClosed => match e.reason.as_deref() {
                Some(reason) => {
                    tracing::warn!(target: "poolvisor", pool, worker, reason, "worker closed")
                }
                None => tracing::info!(target: "poolvisor", pool, worker, "worker closed"),
            },
            EventKind::PoolClosed => {
                tracing::info!(target: "poolvisor", pool, reason = ?e.reason, "pool closed");
            }
            EventKind::SettingsUpdated => {
                tracing::info!(target: "poolvisor", pool, "settings updated");
            }
            EventKind::RoomPlaced => {
                tracing::info!(target: "poolvisor", pool, worker, room = ?e.reason, "room placed");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "poolvisor", subscriber = worker, reason = ?e.reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: "poolvisor", subscriber = worker, info = ?e.reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
