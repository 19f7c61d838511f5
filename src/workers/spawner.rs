//! # Worker factory and closure-backed implementation (`SpawnFn`)
//!
//! The pool asks a [`WorkerSpawner`] for one handle per [`WorkerSpec`]. A spawner
//! typically starts an OS process with [`WorkerSpec::args`] as its command line.
//!
//! [`SpawnFn`] wraps a closure `F: Fn(WorkerSpec, CloseNotifier) -> Result<WorkerRef, WorkerError>`,
//! which is convenient for tests and in-process workers.
//!
//! ## Example
//! ```rust
//! use poolvisor::{CloseNotifier, SpawnFn, WorkerError, WorkerRef, WorkerSpec};
//!
//! let spawner = SpawnFn::arc(|spec: WorkerSpec, _on_close: CloseNotifier| -> Result<WorkerRef, WorkerError> {
//!     Err(WorkerError::Spawn { error: format!("no binary for {}", spec.id) })
//! });
//! # let _ = spawner;
//! ```

use std::sync::Arc;

use crate::error::WorkerError;
use crate::partition::PortRange;
use crate::workers::notifier::CloseNotifier;
use crate::workers::worker::{WorkerId, WorkerRef};

/// Everything one worker receives from the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSpec {
    /// Worker id, `"<pool id>#<ordinal>"`.
    pub id: WorkerId,
    /// 1-based position of the worker in the pool.
    pub ordinal: usize,
    /// Port slice owned by this worker.
    pub ports: PortRange,
    /// `--key=value` parameters: the pool's forwarded keys, then this worker's
    /// `--rtcMinPort`/`--rtcMaxPort`.
    pub args: Vec<String>,
}

impl WorkerSpec {
    /// Builds the spec from the shared parameters and this worker's slice.
    pub fn new(id: WorkerId, ordinal: usize, ports: PortRange, shared: &[String]) -> Self {
        let mut args = Vec::with_capacity(shared.len() + 2);
        args.extend_from_slice(shared);
        args.push(format!("--rtcMinPort={}", ports.min));
        args.push(format!("--rtcMaxPort={}", ports.max));
        Self {
            id,
            ordinal,
            ports,
            args,
        }
    }
}

/// Creates worker handles.
///
/// `spawn` is synchronous: a worker that cannot start must fail here. The returned
/// handle must fire `on_close` exactly once when it terminates; dropping the
/// notifier unfired counts as a clean close.
pub trait WorkerSpawner: Send + Sync + 'static {
    /// Starts one worker.
    fn spawn(&self, spec: WorkerSpec, on_close: CloseNotifier) -> Result<WorkerRef, WorkerError>;
}

/// Closure-backed spawner.
pub struct SpawnFn<F> {
    f: F,
}

impl<F> SpawnFn<F>
where
    F: Fn(WorkerSpec, CloseNotifier) -> Result<WorkerRef, WorkerError> + Send + Sync + 'static,
{
    /// Creates a new closure-backed spawner.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the spawner and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F> WorkerSpawner for SpawnFn<F>
where
    F: Fn(WorkerSpec, CloseNotifier) -> Result<WorkerRef, WorkerError> + Send + Sync + 'static,
{
    fn spawn(&self, spec: WorkerSpec, on_close: CloseNotifier) -> Result<WorkerRef, WorkerError> {
        (self.f)(spec, on_close)
    }
}
