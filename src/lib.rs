//! # poolvisor
//!
//! **Poolvisor** is the control plane for a pool of media worker processes.
//!
//! It splits a configured RTC port range across a fixed number of workers,
//! supervises their lifecycle, and serves pool-wide operations (state dump,
//! settings propagation, room placement) by fanning out to the workers and
//! combining their answers. The worker process itself is supplied by the caller
//! through the [`Worker`] and [`WorkerSpawner`] traits.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                        ┌──────────────┐
//!                        │  PoolConfig  │
//!                        └──────┬───────┘
//!                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ServerBuilder::build(spawner)                                    │
//! │  - normalize config (port bounds, absolute DTLS paths)            │
//! │  - partition ports: one even..odd slice per worker                │
//! │  - WorkerSpawner::spawn(WorkerSpec, CloseNotifier) × N            │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Server (one pool)                                                │
//! │  - live set of WorkerRef                                          │
//! │  - dump / update_settings ──► every live worker (all-or-nothing)  │
//! │  - create_room ──► one uniformly random live worker               │
//! │  - Bus (pool events) ──► SubscriberSet ──► LogWriter, custom...   │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ worker#1 │       │ worker#2 │       │ worker#N │
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        └─── CloseNotifier::notify(err) ──────┘
//!                           ▼
//!            removed from live set; last one closes the pool
//!                           ▼
//!                PoolClosed ──► Registry deregisters
//! ```
//!
//! ### Lifecycle
//! ```text
//! build ──► open ──┬── Server::close(err)            ──► closed (once)
//!                  └── last worker notifies close(err) ──► closed (once)
//!
//! closed: dump / update_settings / create_room ──► Err(PoolError::Closed)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Pool**          | Build, close, fan-out and placement.                          | [`Server`], [`ServerBuilder`]              |
//! | **Workers**       | Contract the worker process implementation must provide.      | [`Worker`], [`WorkerSpawner`], [`SpawnFn`] |
//! | **Partitioning**  | Deterministic per-worker port slices.                         | [`PortRange`], [`partition::partition`]    |
//! | **Registry**      | Close every pool on process termination.                      | [`Registry`]                               |
//! | **Subscriber API**| Observe pool events (logging, metrics, alerts).               | [`Subscribe`], [`Event`]                   |
//! | **Errors**        | Typed errors for pool operations and workers.                 | [`PoolError`], [`WorkerError`]             |
//! | **Configuration** | Serde-loadable pool settings.                                 | [`PoolConfig`]                             |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber (events to `tracing`).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use poolvisor::{
//!     CloseNotifier, PoolConfig, Room, RoomOptions, Server, SpawnFn, Worker, WorkerError,
//!     WorkerId, WorkerRef, WorkerSettings, WorkerSpec,
//! };
//!
//! struct InProcess {
//!     id: WorkerId,
//!     _on_close: CloseNotifier,
//! }
//!
//! #[async_trait]
//! impl Worker for InProcess {
//!     fn id(&self) -> &WorkerId { &self.id }
//!     fn close(&self) {}
//!     async fn dump(&self) -> Result<serde_json::Value, WorkerError> {
//!         Ok(serde_json::json!({ "id": self.id }))
//!     }
//!     async fn update_settings(&self, _s: WorkerSettings) -> Result<(), WorkerError> { Ok(()) }
//!     async fn create_room(&self, _o: RoomOptions) -> Result<Room, WorkerError> {
//!         Ok(Room::new(self.id.clone()))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spawner = SpawnFn::arc(|spec: WorkerSpec, on_close: CloseNotifier| -> Result<WorkerRef, WorkerError> {
//!         Ok(Arc::new(InProcess { id: spec.id, _on_close: on_close }))
//!     });
//!
//!     let cfg = PoolConfig { num_workers: 2, ..PoolConfig::default() };
//!     let server = Server::builder(cfg).build(spawner.as_ref())?;
//!
//!     let room = server.create_room(&RoomOptions::default()).await?;
//!     assert!(server.worker_ids().contains(&room.worker));
//!
//!     let dump = server.dump().await?;
//!     assert_eq!(dump.workers.len(), 2);
//!
//!     server.close(None);
//!     assert!(server.dump().await.is_err());
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
pub mod partition;
mod subscribers;
mod workers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use config::{FORWARDED_KEYS, LogLevel, PoolConfig};
pub use core::{PoolDump, Registry, Server, ServerBuilder, wait_for_shutdown_signal};
pub use error::{PoolError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use partition::PortRange;
pub use subscribers::{Subscribe, SubscriberSet};
pub use workers::{
    CloseNotifier, Room, RoomOptions, SpawnFn, Worker, WorkerId, WorkerRef, WorkerSettings,
    WorkerSpawner, WorkerSpec,
};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
