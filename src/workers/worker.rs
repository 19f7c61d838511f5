//! # Worker handle abstraction.
//!
//! This module defines the [`Worker`] trait: the pool's view of one supervised
//! worker process. The common handle type is [`WorkerRef`], an `Arc<dyn Worker>`
//! suitable for sharing across the pool and its in-flight requests.
//!
//! A worker reports its own termination exactly once through the
//! [`CloseNotifier`](crate::CloseNotifier) it received at spawn time.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkerError;
use crate::workers::options::{Room, RoomOptions, WorkerSettings};

/// Identifier of a worker, unique within its pool: `"<pool id>#<ordinal>"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(Arc<str>);

impl WorkerId {
    /// Builds the id of the worker with 1-based `ordinal` in pool `pool`.
    ///
    /// # Example
    /// ```
    /// use poolvisor::WorkerId;
    ///
    /// assert_eq!(WorkerId::new("abc", 3).as_str(), "abc#3");
    /// ```
    pub fn new(pool: &str, ordinal: usize) -> Self {
        Self(Arc::from(format!("{pool}#{ordinal}")))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&WorkerId> for Arc<str> {
    fn from(id: &WorkerId) -> Self {
        Arc::clone(&id.0)
    }
}

/// # Handle to one supervised worker.
///
/// Every request method may run concurrently with others and with `close`.
/// A request issued before the worker closes is allowed to fail; the pool surfaces
/// that failure through the aggregate result.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use poolvisor::{Room, RoomOptions, Worker, WorkerError, WorkerId, WorkerSettings};
///
/// struct Echo {
///     id: WorkerId,
/// }
///
/// #[async_trait]
/// impl Worker for Echo {
///     fn id(&self) -> &WorkerId { &self.id }
///
///     fn close(&self) {}
///
///     async fn dump(&self) -> Result<serde_json::Value, WorkerError> {
///         Ok(serde_json::json!({ "rooms": [] }))
///     }
///
///     async fn update_settings(&self, _settings: WorkerSettings) -> Result<(), WorkerError> {
///         Ok(())
///     }
///
///     async fn create_room(&self, _options: RoomOptions) -> Result<Room, WorkerError> {
///         Ok(Room::new(self.id.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Returns the id the worker was spawned with.
    fn id(&self) -> &WorkerId;

    /// Requests termination. Must be idempotent; the result is not observed.
    ///
    /// The worker fires its [`CloseNotifier`](crate::CloseNotifier) once it is gone
    /// (possibly synchronously, from inside this call).
    fn close(&self);

    /// Returns an introspection snapshot of the worker.
    async fn dump(&self) -> Result<serde_json::Value, WorkerError>;

    /// Applies settings to the worker.
    async fn update_settings(&self, settings: WorkerSettings) -> Result<(), WorkerError>;

    /// Creates one room on the worker.
    async fn create_room(&self, options: RoomOptions) -> Result<Room, WorkerError>;
}

/// Shared handle type for workers.
pub type WorkerRef = Arc<dyn Worker>;
