//! Pool core: orchestration and lifecycle.
//!
//! This module contains the pool supervisor and the process-wide registry.
//! The public API from this module is [`Server`] (one pool), [`ServerBuilder`]
//! (pool construction) and [`Registry`] (all live pools of a process).
//!
//! Internal modules:
//! - [`server`]: live set, cascading close, fan-out and placement;
//! - [`builder`]: partitioning, worker spawning, subscriber wiring;
//! - [`registry`]: tracks pools and closes them on termination;
//! - [`shutdown`]: cross-platform shutdown signal handling.
//!
//! ## Wiring
//! ```text
//! PoolConfig ──► ServerBuilder::build(spawner)
//!                   ├─► normalize config, partition ports
//!                   ├─► WorkerSpawner::spawn(WorkerSpec, CloseNotifier)  × N
//!                   └─► Arc<Server>
//!
//! CloseNotifier ──► Server::on_worker_closed ──► (last worker) ──► Server::close
//! Server::close ──► Worker::close × live ──► PoolClosed ──► Registry deregisters
//! OS signal ──► Registry::close_on_signal ──► Server::close × registered
//! ```

mod builder;
mod registry;
mod server;
mod shutdown;

pub use builder::ServerBuilder;
pub use registry::Registry;
pub use server::{PoolDump, Server};
pub use shutdown::wait_for_shutdown_signal;
