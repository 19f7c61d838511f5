//! # Events emitted by a pool server.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Worker events**: a worker joined or left the pool
//! - **Pool events**: pool closed, settings propagated, room placed
//! - **Subscriber events**: overflow or panic in an observer
//!
//! The [`Event`] struct carries additional metadata such as timestamps, pool and
//! worker identifiers, reasons, and port slices.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use poolvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkerClosed)
//!     .with_pool("4b1c")
//!     .with_worker("4b1c#2")
//!     .with_reason("worker died: SIGKILL");
//!
//! assert_eq!(ev.kind, EventKind::WorkerClosed);
//! assert_eq!(ev.worker.as_deref(), Some("4b1c#2"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::partition::PortRange;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of pool events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Worker events ===
    /// Worker handle created and added to the live set.
    ///
    /// Sets:
    /// - `pool`: pool id
    /// - `worker`: worker id
    /// - `ports`: port slice assigned to the worker
    WorkerSpawned,

    /// Worker handle reported its close and left the live set.
    ///
    /// Sets:
    /// - `pool`: pool id
    /// - `worker`: worker id
    /// - `reason`: worker error, if the worker closed abnormally
    WorkerClosed,

    // === Pool events ===
    /// Pool closed (explicitly or after its last worker closed). Emitted once.
    ///
    /// Sets:
    /// - `pool`: pool id
    /// - `reason`: triggering worker error, if any
    PoolClosed,

    /// Settings were applied by every live worker.
    ///
    /// Sets:
    /// - `pool`: pool id
    SettingsUpdated,

    /// A room was created on one worker.
    ///
    /// Sets:
    /// - `pool`: pool id
    /// - `worker`: selected worker id
    /// - `reason`: room id
    RoomPlaced,
}

/// Pool event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Pool id, if applicable.
    pub pool: Option<Arc<str>>,
    /// Worker id (or subscriber name), if applicable.
    pub worker: Option<Arc<str>>,
    /// Human-readable reason (errors, room ids, overflow details).
    pub reason: Option<Arc<str>>,
    /// Port slice of the worker.
    pub ports: Option<PortRange>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pool: None,
            worker: None,
            reason: None,
            ports: None,
        }
    }

    /// Attaches a pool id.
    #[inline]
    pub fn with_pool(mut self, pool: impl Into<Arc<str>>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a port slice.
    #[inline]
    pub fn with_ports(mut self, ports: PortRange) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }

    /// True for events emitted by the subscriber layer itself.
    #[inline]
    pub(crate) fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::WorkerSpawned);
        let b = Event::new(EventKind::WorkerSpawned);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn overflow_event_names_subscriber() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_event());
        assert_eq!(ev.worker.as_deref(), Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
