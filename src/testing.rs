//! Scriptable in-memory workers for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::WorkerError;
use crate::workers::{
    CloseNotifier, Room, RoomOptions, Worker, WorkerId, WorkerRef, WorkerSettings, WorkerSpawner,
    WorkerSpec,
};

/// Pool of `workers` over ports 10000-10099.
pub(crate) fn test_config(workers: usize) -> PoolConfig {
    PoolConfig {
        num_workers: workers,
        rtc_min_port: 10000,
        rtc_max_port: 10099,
        ..PoolConfig::default()
    }
}

/// How a mock worker answers requests.
#[derive(Clone, Debug, Default)]
pub(crate) struct Behavior {
    pub fail_dump: bool,
    pub fail_settings: bool,
    pub fail_room: bool,
    /// Fires the close notification from inside `spawn`, before returning the handle.
    pub die_on_spawn: bool,
    /// Delay applied before answering any request.
    pub delay: Option<Duration>,
}

pub(crate) struct MockWorker {
    pub spec: WorkerSpec,
    behavior: Behavior,
    notifier: Mutex<Option<CloseNotifier>>,
    closed: AtomicBool,
    pub close_calls: AtomicUsize,
    pub dumps: AtomicUsize,
    pub rooms: AtomicUsize,
    pub settings: Mutex<Vec<WorkerSettings>>,
}

impl MockWorker {
    /// Simulates the worker process going away on its own.
    pub fn kill(&self, error: Option<WorkerError>) {
        self.closed.store(true, Ordering::SeqCst);
        let notifier = self.notifier.lock().take();
        if let Some(notifier) = notifier {
            notifier.notify(error);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of requests (dump, settings, room) the worker received.
    pub fn requests(&self) -> usize {
        self.dumps.load(Ordering::SeqCst)
            + self.rooms.load(Ordering::SeqCst)
            + self.settings.lock().len()
    }

    async fn answer(&self) -> Result<(), WorkerError> {
        if let Some(delay) = self.behavior.delay {
            tokio::time::sleep(delay).await;
        }
        if self.is_closed() {
            return Err(WorkerError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for MockWorker {
    fn id(&self) -> &WorkerId {
        &self.spec.id
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.kill(None);
    }

    async fn dump(&self) -> Result<serde_json::Value, WorkerError> {
        self.dumps.fetch_add(1, Ordering::SeqCst);
        self.answer().await?;
        if self.behavior.fail_dump {
            return Err(WorkerError::Request {
                error: "dump failed".into(),
            });
        }
        Ok(serde_json::json!({
            "id": self.spec.id.as_str(),
            "ports": self.spec.ports,
        }))
    }

    async fn update_settings(&self, settings: WorkerSettings) -> Result<(), WorkerError> {
        self.answer().await?;
        if self.behavior.fail_settings {
            return Err(WorkerError::InvalidSettings {
                error: "rejected".into(),
            });
        }
        self.settings.lock().push(settings);
        Ok(())
    }

    async fn create_room(&self, _options: RoomOptions) -> Result<Room, WorkerError> {
        self.rooms.fetch_add(1, Ordering::SeqCst);
        self.answer().await?;
        if self.behavior.fail_room {
            return Err(WorkerError::Request {
                error: "no capacity".into(),
            });
        }
        Ok(Room::new(self.spec.id.clone()))
    }
}

/// Spawner creating [`MockWorker`]s, optionally failing at one ordinal.
#[derive(Default)]
pub(crate) struct MockSpawner {
    workers: Mutex<Vec<Arc<MockWorker>>>,
    behaviors: HashMap<usize, Behavior>,
    fail_at: Option<usize>,
    kill_previous_at: Option<usize>,
}

impl MockSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Applies `behavior` to the worker with 1-based `ordinal`.
    pub fn with_behavior(self: Arc<Self>, ordinal: usize, behavior: Behavior) -> Arc<Self> {
        let mut me = Arc::try_unwrap(self).unwrap_or_default();
        me.behaviors.insert(ordinal, behavior);
        Arc::new(me)
    }

    /// Makes the spawn of the worker with 1-based `ordinal` fail.
    pub fn failing_at(ordinal: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_at: Some(ordinal),
            ..Self::default()
        })
    }

    /// Kills the previously spawned worker when the one with 1-based `ordinal`
    /// is being spawned.
    pub fn killing_previous_at(ordinal: usize) -> Arc<Self> {
        Arc::new(Self {
            kill_previous_at: Some(ordinal),
            ..Self::default()
        })
    }

    /// Workers spawned so far, in ordinal order.
    pub fn workers(&self) -> Vec<Arc<MockWorker>> {
        self.workers.lock().clone()
    }
}

impl WorkerSpawner for MockSpawner {
    fn spawn(&self, spec: WorkerSpec, on_close: CloseNotifier) -> Result<WorkerRef, WorkerError> {
        if self.fail_at == Some(spec.ordinal) {
            return Err(WorkerError::Spawn {
                error: "exec failed".into(),
            });
        }
        if self.kill_previous_at == Some(spec.ordinal) {
            let previous = self.workers.lock().last().cloned();
            if let Some(previous) = previous {
                previous.kill(Some(WorkerError::Died {
                    error: "crashed during startup".into(),
                }));
            }
        }
        let behavior = self
            .behaviors
            .get(&spec.ordinal)
            .cloned()
            .unwrap_or_default();
        let worker = Arc::new(MockWorker {
            spec,
            behavior,
            notifier: Mutex::new(Some(on_close)),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            dumps: AtomicUsize::new(0),
            rooms: AtomicUsize::new(0),
            settings: Mutex::new(Vec::new()),
        });
        self.workers.lock().push(Arc::clone(&worker));
        if worker.behavior.die_on_spawn {
            worker.kill(Some(WorkerError::Died {
                error: "certificate rejected".into(),
            }));
        }
        Ok(worker)
    }
}
