//! # Server: one pool of supervised workers.
//!
//! The [`Server`] owns the live set of worker handles, reacts to their close
//! notifications, and serves the pool-wide operations.
//!
//! ## Key responsibilities
//! - track live workers (added at build, removed once on close notification)
//! - **cascade**: close the pool when its last worker closes (held back until build ends)
//! - **close**: exactly once, fire-and-forget towards workers, then `PoolClosed`
//! - **fan-out**: `dump` / `update_settings` go to every live worker concurrently
//! - **placement**: `create_room` goes to one uniformly random live worker
//!
//! ## Fan-out semantics
//! ```text
//! snapshot(live) ──► [w1.op()] [w2.op()] ... [wN.op()]     (FuturesUnordered)
//!                        │        │              │
//!                        └────────┴──── drain ───┘
//!                                   │
//!                   all Ok  ──► merged result
//!                   any Err ──► first completed error (others still run to completion)
//! ```
//!
//! ## Rules
//! - Every operation on a closed pool fails with [`PoolError::Closed`] before touching a worker.
//! - The live-set lock is never held across `.await` or while calling into a worker.
//! - A worker closing mid-fan-out fails that operation through its own error; it is
//!   never silently skipped.
//! - No timeouts and no retries at this layer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::core::builder::ServerBuilder;
use crate::error::{PoolError, WorkerError};
use crate::events::{Bus, Event, EventKind};
use crate::partition::PortRange;
use crate::workers::{Room, RoomOptions, WorkerId, WorkerRef, WorkerSettings};

/// Aggregated result of [`Server::dump`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PoolDump {
    /// Per-worker snapshots keyed by worker id.
    pub workers: BTreeMap<WorkerId, serde_json::Value>,
}

/// Worker membership, guarded by one lock.
///
/// A worker is `pending` from just before its spawn until it is attached. A close
/// notification for a pending worker is parked in `closed_early` and applied at
/// attach time.
#[derive(Default)]
struct Members {
    live: BTreeMap<WorkerId, WorkerRef>,
    pending: HashSet<WorkerId>,
    closed_early: HashMap<WorkerId, Option<WorkerError>>,
    building: bool,
    /// Last worker that closed while building, with its error.
    last_closed: Option<(WorkerId, Option<WorkerError>)>,
}

impl Members {
    /// Records a worker that just left; returns true if the pool must cascade.
    fn note_closed(&mut self, id: &WorkerId, error: &Option<WorkerError>) -> bool {
        if self.building {
            self.last_closed = Some((id.clone(), error.clone()));
            false
        } else {
            self.live.is_empty()
        }
    }
}

/// A pool of workers sharing one configuration.
pub struct Server {
    id: Arc<str>,
    cfg: PoolConfig,
    slices: Vec<PortRange>,
    bus: Bus,
    members: Mutex<Members>,
    closed: AtomicBool,
    close_reason: Mutex<Option<WorkerError>>,
    closed_token: CancellationToken,
}

impl Server {
    /// Returns a builder for a pool with the given configuration.
    pub fn builder(cfg: PoolConfig) -> ServerBuilder {
        ServerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        id: Arc<str>,
        cfg: PoolConfig,
        slices: Vec<PortRange>,
        bus: Bus,
    ) -> Self {
        Self {
            id,
            cfg,
            slices,
            bus,
            members: Mutex::new(Members {
                building: true,
                ..Members::default()
            }),
            closed: AtomicBool::new(false),
            close_reason: Mutex::new(None),
            closed_token: CancellationToken::new(),
        }
    }

    /// Pool id (namespace of its worker ids).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Normalized configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    /// Port slices computed at build time, in ordinal order.
    pub fn slices(&self) -> &[PortRange] {
        &self.slices
    }

    /// True once the pool has closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Error the pool was closed with, if any.
    pub fn close_reason(&self) -> Option<WorkerError> {
        self.close_reason.lock().clone()
    }

    /// Resolves once the pool has closed.
    pub async fn closed(&self) {
        self.closed_token.cancelled().await;
    }

    /// Token cancelled when the pool closes.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed_token.clone()
    }

    /// Sorted snapshot of the live worker ids.
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.members.lock().live.keys().cloned().collect()
    }

    /// Number of live workers.
    pub fn len(&self) -> usize {
        self.members.lock().live.len()
    }

    /// True if no worker is live.
    pub fn is_empty(&self) -> bool {
        self.members.lock().live.is_empty()
    }

    /// Creates a receiver for this pool's events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Closes the pool.
    ///
    /// The first call marks the pool closed, asks every live worker to close
    /// (without waiting for them), then publishes a single [`EventKind::PoolClosed`].
    /// Later calls do nothing.
    pub fn close(&self, error: Option<WorkerError>) {
        {
            // The reason is written under its lock before it is released, so a
            // reader that sees the pool closed also sees the reason.
            let mut reason = self.close_reason.lock();
            if self
                .closed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            *reason = error.clone();
        }

        let workers: Vec<WorkerRef> = {
            let mut members = self.members.lock();
            members.pending.clear();
            members.closed_early.clear();
            members.live.values().cloned().collect()
        };
        tracing::debug!(pool = %self.id, workers = workers.len(), reason = ?error, "closing pool");
        for worker in &workers {
            worker.close();
        }
        drop(workers);

        let mut ev = Event::new(EventKind::PoolClosed).with_pool(Arc::clone(&self.id));
        if let Some(err) = &error {
            ev = ev.with_reason(err.to_string());
        }
        self.bus.publish(ev);
        self.closed_token.cancel();
    }

    /// Collects a snapshot from every live worker.
    ///
    /// Fails as a whole if any worker fails.
    pub async fn dump(&self) -> Result<PoolDump, PoolError> {
        self.ensure_open()?;
        let results = self
            .fan_out("dump", |worker| async move { worker.dump().await })
            .await?;
        Ok(PoolDump {
            workers: results.into_iter().collect(),
        })
    }

    /// Applies `settings` to every live worker.
    ///
    /// Fails with the first worker error; workers that already applied the
    /// settings keep them.
    pub async fn update_settings(&self, settings: &WorkerSettings) -> Result<(), PoolError> {
        self.ensure_open()?;
        let settings = settings.clone();
        self.fan_out("update_settings", |worker| {
            let settings = settings.clone();
            async move { worker.update_settings(settings).await }
        })
        .await?;

        self.bus
            .publish(Event::new(EventKind::SettingsUpdated).with_pool(Arc::clone(&self.id)));
        Ok(())
    }

    /// Creates a room on one live worker chosen uniformly at random.
    ///
    /// A failing worker is not replaced by another one.
    pub async fn create_room(&self, options: &RoomOptions) -> Result<Room, PoolError> {
        self.ensure_open()?;
        let options = options.clone();
        let (id, worker) = self.pick().ok_or(PoolError::NoWorkers)?;

        match worker.create_room(options).await {
            Ok(room) => {
                self.bus.publish(
                    Event::new(EventKind::RoomPlaced)
                        .with_pool(Arc::clone(&self.id))
                        .with_worker(&id)
                        .with_reason(room.id.as_str()),
                );
                Ok(room)
            }
            Err(source) => {
                tracing::warn!(pool = %self.id, worker = %id, error = %source, "room creation failed");
                Err(PoolError::Worker {
                    worker: id.to_string(),
                    source,
                })
            }
        }
    }

    /// Marks `id` as being spawned, so an early close notification is kept.
    pub(crate) fn begin_spawn(&self, id: &WorkerId) {
        self.members.lock().pending.insert(id.clone());
    }

    /// Forgets a worker whose spawn failed.
    pub(crate) fn abandon_spawn(&self, id: &WorkerId) {
        let mut members = self.members.lock();
        members.pending.remove(id);
        members.closed_early.remove(id);
    }

    /// Adds a freshly spawned worker to the live set.
    ///
    /// A worker that already reported its close is not added; one attached to a
    /// closed pool is asked to close right away.
    pub(crate) fn attach(&self, id: WorkerId, worker: WorkerRef, ports: PortRange) {
        let (early, attached, cascade) = {
            let mut members = self.members.lock();
            members.pending.remove(&id);
            let early = members.closed_early.remove(&id);
            let attached = early.is_none() && !self.is_closed();
            if attached {
                members.live.insert(id.clone(), Arc::clone(&worker));
            }
            let cascade = match &early {
                Some(error) => members.note_closed(&id, error),
                None => false,
            };
            (early, attached, cascade)
        };

        if attached {
            tracing::debug!(pool = %self.id, worker = %id, %ports, "worker spawned");
            self.bus.publish(
                Event::new(EventKind::WorkerSpawned)
                    .with_pool(Arc::clone(&self.id))
                    .with_worker(&id)
                    .with_ports(ports),
            );
            return;
        }

        match early {
            Some(error) => {
                tracing::warn!(pool = %self.id, worker = %id, %ports, reason = ?error, "worker closed before it was attached");
                self.bus.publish(
                    Event::new(EventKind::WorkerSpawned)
                        .with_pool(Arc::clone(&self.id))
                        .with_worker(&id)
                        .with_ports(ports),
                );
                drop(worker);
                self.worker_gone(&id, error, cascade);
            }
            None => {
                tracing::debug!(pool = %self.id, worker = %id, "closing worker spawned into a closed pool");
                worker.close();
            }
        }
    }

    /// Ends construction and applies a cascade held back while building.
    ///
    /// If no worker survived construction the pool is closed and the last
    /// worker to close is reported.
    pub(crate) fn finish_build(&self) -> Result<(), PoolError> {
        let last = {
            let mut members = self.members.lock();
            members.building = false;
            let last = members.last_closed.take();
            if !members.live.is_empty() {
                return Ok(());
            }
            last
        };

        match last {
            Some((id, error)) => {
                self.close(error.clone());
                Err(PoolError::Spawn {
                    worker: id.to_string(),
                    source: error.unwrap_or(WorkerError::Closed),
                })
            }
            None => {
                self.close(None);
                Err(PoolError::Closed)
            }
        }
    }

    /// Handles a worker close notification.
    ///
    /// Unknown or already removed workers are ignored, so each worker is
    /// removed at most once.
    pub(crate) fn on_worker_closed(&self, id: &WorkerId, error: Option<WorkerError>) {
        let (removed, cascade) = {
            let mut members = self.members.lock();
            match members.live.remove(id) {
                Some(worker) => {
                    let cascade = members.note_closed(id, &error);
                    (worker, cascade)
                }
                None => {
                    if members.pending.contains(id) {
                        members.closed_early.insert(id.clone(), error);
                    }
                    return;
                }
            }
        };
        drop(removed);
        self.worker_gone(id, error, cascade);
    }

    /// Publishes a worker close and, if `cascade`, closes the pool with its error.
    fn worker_gone(&self, id: &WorkerId, error: Option<WorkerError>, cascade: bool) {
        tracing::debug!(pool = %self.id, worker = %id, reason = ?error, "worker closed");
        let mut ev = Event::new(EventKind::WorkerClosed)
            .with_pool(Arc::clone(&self.id))
            .with_worker(id);
        if let Some(err) = &error {
            ev = ev.with_reason(err.to_string());
        }
        self.bus.publish(ev);

        if cascade && !self.is_closed() {
            self.close(error);
        }
    }

    fn ensure_open(&self) -> Result<(), PoolError> {
        if self.is_closed() {
            Err(PoolError::Closed)
        } else {
            Ok(())
        }
    }

    fn snapshot(&self) -> Vec<(WorkerId, WorkerRef)> {
        self.members
            .lock()
            .live
            .iter()
            .map(|(id, w)| (id.clone(), Arc::clone(w)))
            .collect()
    }

    fn pick(&self) -> Option<(WorkerId, WorkerRef)> {
        let members = self.members.lock();
        let live = &members.live;
        if live.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..live.len());
        live.iter()
            .nth(idx)
            .map(|(id, w)| (id.clone(), Arc::clone(w)))
    }

    /// Issues `op` to every live worker and waits for all of them.
    ///
    /// Returns every result, or the first error in completion order.
    async fn fan_out<T, F, Fut>(&self, op: &'static str, f: F) -> Result<Vec<(WorkerId, T)>, PoolError>
    where
        F: Fn(WorkerRef) -> Fut,
        Fut: Future<Output = Result<T, WorkerError>>,
    {
        let mut pending: FuturesUnordered<_> = self
            .snapshot()
            .into_iter()
            .map(|(id, worker)| {
                let fut = f(worker);
                async move { (id, fut.await) }
            })
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        let mut first_err = None;
        while let Some((id, res)) = pending.next().await {
            match res {
                Ok(value) => results.push((id, value)),
                Err(source) => {
                    tracing::warn!(pool = %self.id, worker = %id, op, error = %source, "worker request failed");
                    if first_err.is_none() {
                        first_err = Some(PoolError::Worker {
                            worker: id.to_string(),
                            source,
                        });
                    }
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}
