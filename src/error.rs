//! Error types used by the pool supervisor and its workers.
//!
//! This module defines two main error enums:
//!
//! - [`PoolError`]: errors raised by pool-wide operations of the [`Server`](crate::Server).
//! - [`WorkerError`]: errors raised by individual worker handles.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use thiserror::Error;

/// # Errors produced by pool-wide operations.
///
/// Every operation of the [`Server`](crate::Server) reports failures through its
/// `Result`; nothing is retried at this layer.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum PoolError {
    /// The pool has already been closed (explicitly or by losing its last worker).
    #[error("pool closed")]
    Closed,

    /// The pool has no worker to serve the request.
    #[error("pool has no workers")]
    NoWorkers,

    /// A worker could not be created while building the pool.
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        /// Identifier of the worker that failed to start.
        worker: String,
        /// The underlying worker error.
        source: WorkerError,
    },

    /// A worker failed a request issued by the pool.
    #[error("worker {worker} failed: {source}")]
    Worker {
        /// Identifier of the failing worker.
        worker: String,
        /// The underlying worker error.
        source: WorkerError,
    },
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use poolvisor::PoolError;
    ///
    /// assert_eq!(PoolError::Closed.as_label(), "pool_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::Closed => "pool_closed",
            PoolError::NoWorkers => "pool_no_workers",
            PoolError::Spawn { .. } => "pool_spawn_failed",
            PoolError::Worker { .. } => "pool_worker_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PoolError::Closed => "pool closed".to_string(),
            PoolError::NoWorkers => "no live workers".to_string(),
            PoolError::Spawn { worker, source } => {
                format!("spawn worker={worker}: {}", source.as_message())
            }
            PoolError::Worker { worker, source } => {
                format!("worker={worker}: {}", source.as_message())
            }
        }
    }

    /// Returns the worker error carried by this error, if any.
    pub fn worker_error(&self) -> Option<&WorkerError> {
        match self {
            PoolError::Spawn { source, .. } | PoolError::Worker { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// # Errors produced by worker handles.
///
/// `WorkerError` is `Clone` so that the same error can both fail a request and be
/// carried by the close notification of the pool.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The worker process could not be started.
    #[error("spawn failed: {error}")]
    Spawn {
        /// The underlying error message.
        error: String,
    },

    /// The worker is closed and cannot serve requests.
    #[error("worker closed")]
    Closed,

    /// The worker rejected the settings it was given.
    #[error("invalid settings: {error}")]
    InvalidSettings {
        /// The underlying error message.
        error: String,
    },

    /// A request to the worker failed.
    #[error("request failed: {error}")]
    Request {
        /// The underlying error message.
        error: String,
    },

    /// The worker process died unexpectedly.
    #[error("worker died: {error}")]
    Died {
        /// The underlying error message.
        error: String,
    },
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use poolvisor::WorkerError;
    ///
    /// let err = WorkerError::Died { error: "SIGKILL".into() };
    /// assert_eq!(err.as_label(), "worker_died");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Spawn { .. } => "worker_spawn_failed",
            WorkerError::Closed => "worker_closed",
            WorkerError::InvalidSettings { .. } => "worker_invalid_settings",
            WorkerError::Request { .. } => "worker_request_failed",
            WorkerError::Died { .. } => "worker_died",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WorkerError::Spawn { error } => format!("spawn: {error}"),
            WorkerError::Closed => "closed".to_string(),
            WorkerError::InvalidSettings { error } => format!("invalid settings: {error}"),
            WorkerError::Request { error } => format!("request: {error}"),
            WorkerError::Died { error } => format!("died: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let source = WorkerError::Request { error: "boom".into() };
        let err = PoolError::Worker {
            worker: "p#1".into(),
            source: source.clone(),
        };
        assert_eq!(err.as_label(), "pool_worker_failed");
        assert_eq!(err.worker_error(), Some(&source));
        assert_eq!(err.as_message(), "worker=p#1: request: boom");
        assert!(PoolError::Closed.worker_error().is_none());
    }

    #[test]
    fn display_includes_source() {
        let err = PoolError::Spawn {
            worker: "p#2".into(),
            source: WorkerError::Spawn { error: "ENOENT".into() },
        };
        assert_eq!(err.to_string(), "failed to spawn worker p#2: spawn failed: ENOENT");
    }
}
