//! # Worker abstractions consumed by the pool.
//!
//! The worker process itself lives outside this crate; the pool only talks to it
//! through these types:
//! - [`Worker`] - trait every worker handle implements (close, dump, settings, rooms)
//! - [`WorkerRef`] - shared reference to a worker handle (`Arc<dyn Worker>`)
//! - [`WorkerSpawner`] - factory creating one handle per [`WorkerSpec`]
//! - [`SpawnFn`] - closure-backed spawner
//! - [`CloseNotifier`] - one-shot "worker closed" notification handed to each worker
//! - [`WorkerSettings`], [`RoomOptions`], [`Room`] - request and response payloads

mod notifier;
mod options;
mod spawner;
mod worker;

pub use notifier::CloseNotifier;
pub use options::{Room, RoomOptions, WorkerSettings};
pub use spawner::{SpawnFn, WorkerSpawner, WorkerSpec};
pub use worker::{Worker, WorkerId, WorkerRef};
