//! # One-shot worker close notification.
//!
//! Each worker receives a [`CloseNotifier`] at spawn time. Firing it tells the pool
//! that the worker is gone:
//!
//! ```text
//! worker exits ──► notifier.notify(err) ──► Server::on_worker_closed(id, err)
//!                                               ├─► remove from live set (once)
//!                                               ├─► publish WorkerClosed
//!                                               └─► live set empty? ──► Server::close(err)
//! ```
//!
//! ## Rules
//! - `notify` consumes the notifier, so it fires at most once.
//! - Dropping an unfired notifier fires it without an error.
//! - The notifier holds a weak reference; it never keeps a pool alive.

use std::fmt;
use std::sync::Weak;

use crate::core::Server;
use crate::error::WorkerError;
use crate::workers::worker::WorkerId;

/// One-shot "worker closed" notification bound to one pool and one worker.
pub struct CloseNotifier {
    target: Option<(Weak<Server>, WorkerId)>,
}

impl CloseNotifier {
    pub(crate) fn new(server: Weak<Server>, worker: WorkerId) -> Self {
        Self {
            target: Some((server, worker)),
        }
    }

    /// Returns the id of the worker this notifier belongs to.
    pub fn worker(&self) -> Option<&WorkerId> {
        self.target.as_ref().map(|(_, id)| id)
    }

    /// Reports that the worker closed, optionally because of `error`.
    pub fn notify(mut self, error: Option<WorkerError>) {
        self.fire(error);
    }

    fn fire(&mut self, error: Option<WorkerError>) {
        if let Some((server, worker)) = self.target.take() {
            if let Some(server) = server.upgrade() {
                server.on_worker_closed(&worker, error);
            }
        }
    }
}

impl Drop for CloseNotifier {
    fn drop(&mut self) {
        self.fire(None);
    }
}

impl fmt::Debug for CloseNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseNotifier")
            .field("worker", &self.worker())
            .field("fired", &self.target.is_none())
            .finish()
    }
}
