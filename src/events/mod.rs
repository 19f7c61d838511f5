//! Pool events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by a pool [`Server`](crate::Server).
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Server` (spawn, worker close, pool close, settings, placement),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener spawned by `ServerBuilder` (fans out to
//!   `SubscriberSet`) and any receiver obtained from [`Server::subscribe`](crate::Server::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
