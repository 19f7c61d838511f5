use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::server::Server;
use crate::{
    config::PoolConfig,
    error::PoolError,
    events::{Bus, Event},
    partition::partition,
    subscribers::{Subscribe, SubscriberSet},
    workers::{CloseNotifier, WorkerId, WorkerSpawner, WorkerSpec},
};

/// Builder for constructing a pool [`Server`].
pub struct ServerBuilder {
    cfg: PoolConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ServerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive pool events through dedicated workers with bounded
    /// queues, until the pool closes. Requires a Tokio runtime at [`build`](Self::build).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the pool and spawns all of its workers.
    ///
    /// - Normalizes the configuration and splits the port range.
    /// - Spawns workers `1..=num_workers` in order, each with its own slice.
    /// - If a spawn fails, the pool is closed (every worker created so far is
    ///   asked to close) and [`PoolError::Spawn`] is returned.
    /// - Workers closing during construction do not close the pool early; if none
    ///   is left once every spawn has returned, the pool is closed and the last
    ///   one to close is reported as [`PoolError::Spawn`].
    pub fn build(self, spawner: &dyn WorkerSpawner) -> Result<Arc<Server>, PoolError> {
        let cfg = self.cfg.normalized();
        if cfg.num_workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let id: Arc<str> = Arc::from(uuid::Uuid::new_v4().to_string());
        let slices = partition(cfg.port_range(), cfg.num_workers);
        let shared = cfg.worker_args();
        let bus = Bus::new(cfg.bus_capacity_clamped());

        let server = Arc::new(Server::new_internal(
            Arc::clone(&id),
            cfg,
            slices.clone(),
            bus.clone(),
        ));
        if !self.subscribers.is_empty() {
            subscriber_listener(self.subscribers, bus, server.closed_token());
        }

        for (idx, ports) in slices.into_iter().enumerate() {
            let ordinal = idx + 1;
            let worker_id = WorkerId::new(&id, ordinal);
            if ports.is_empty() {
                tracing::warn!(pool = %id, worker = %worker_id, %ports, "worker got an empty port range");
            }

            let spec = WorkerSpec::new(worker_id.clone(), ordinal, ports, &shared);
            let on_close = CloseNotifier::new(Arc::downgrade(&server), worker_id.clone());
            server.begin_spawn(&worker_id);
            match spawner.spawn(spec, on_close) {
                Ok(worker) => server.attach(worker_id, worker, ports),
                Err(source) => {
                    tracing::warn!(pool = %id, worker = %worker_id, error = %source, "worker spawn failed");
                    server.abandon_spawn(&worker_id);
                    server.close(Some(source.clone()));
                    return Err(PoolError::Spawn {
                        worker: worker_id.to_string(),
                        source,
                    });
                }
            }
        }

        server.finish_build()?;
        Ok(server)
    }
}

/// Forwards bus events to the subscriber set until the pool closes.
///
/// Events already queued when the pool closes (including `PoolClosed`) are still
/// delivered; the set is then shut down.
fn subscriber_listener(subs: Vec<Arc<dyn Subscribe>>, bus: Bus, closed: CancellationToken) {
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subs, bus);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                _ = closed.cancelled() => {
                    drain(&mut rx, &set);
                    break;
                }
            }
        }
        set.shutdown().await;
    });
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>, set: &SubscriberSet) {
    use tokio::sync::broadcast::error::TryRecvError;
    loop {
        match rx.try_recv() {
            Ok(ev) => set.emit(&ev),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::WorkerError;
    use crate::events::EventKind;
    use crate::partition::PortRange;
    use crate::testing::{Behavior, MockSpawner, test_config};

    #[test]
    fn spawns_one_worker_per_slice() {
        let spawner = MockSpawner::new();
        let server = Server::builder(test_config(2))
            .build(spawner.as_ref())
            .unwrap();

        let workers = spawner.workers();
        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].spec.ports, PortRange::new(10000, 10049));
        assert_eq!(workers[1].spec.ports, PortRange::new(10050, 10097));
        assert_eq!(workers[1].spec.id.as_str(), format!("{}#2", server.id()));
        assert_eq!(
            &workers[1].spec.args[workers[1].spec.args.len() - 2..],
            ["--rtcMinPort=10050", "--rtcMaxPort=10097"]
        );
        assert!(workers[0].spec.args.contains(&"--logLevel=debug".to_string()));
        assert_eq!(server.worker_ids().len(), 2);
        assert_eq!(server.slices(), &[workers[0].spec.ports, workers[1].spec.ports]);
    }

    #[test]
    fn pools_get_distinct_ids() {
        let spawner = MockSpawner::new();
        let a = Server::builder(test_config(1)).build(spawner.as_ref()).unwrap();
        let b = Server::builder(test_config(1)).build(spawner.as_ref()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let spawner = MockSpawner::new();
        let res = Server::builder(test_config(0)).build(spawner.as_ref());
        assert!(matches!(res, Err(PoolError::NoWorkers)));
        assert!(spawner.workers().is_empty());
    }

    #[test]
    fn spawn_failure_closes_created_workers() {
        let spawner = MockSpawner::failing_at(3);
        let res = Server::builder(test_config(4)).build(spawner.as_ref());

        match res {
            Err(PoolError::Spawn { worker, source }) => {
                assert!(worker.ends_with("#3"), "{worker}");
                assert!(matches!(source, WorkerError::Spawn { .. }));
            }
            Err(other) => panic!("expected spawn failure, got {other:?}"),
            Ok(_) => panic!("expected spawn failure"),
        }
        let workers = spawner.workers();
        assert_eq!(workers.len(), 2);
        for worker in workers {
            assert!(worker.is_closed());
            assert_eq!(worker.close_calls.load(Ordering::SeqCst), 1);
        }
    }

    fn dying_on_spawn() -> Behavior {
        Behavior {
            die_on_spawn: true,
            ..Behavior::default()
        }
    }

    #[test]
    fn workers_dead_before_attach_close_the_pool() {
        let spawner = MockSpawner::new()
            .with_behavior(1, dying_on_spawn())
            .with_behavior(2, dying_on_spawn());
        let res = Server::builder(test_config(2)).build(spawner.as_ref());

        match res {
            Err(PoolError::Spawn { worker, source }) => {
                assert!(worker.ends_with("#2"), "{worker}");
                assert!(matches!(source, WorkerError::Died { .. }));
            }
            Err(other) => panic!("expected spawn failure, got {other:?}"),
            Ok(server) => panic!(
                "pool of dead workers built: closed={} live={}",
                server.is_closed(),
                server.len()
            ),
        }
        assert!(spawner.workers().iter().all(|w| w.requests() == 0));
    }

    #[tokio::test]
    async fn worker_dead_before_attach_is_never_live() {
        let spawner = MockSpawner::new().with_behavior(1, dying_on_spawn());
        let server = Server::builder(test_config(3))
            .build(spawner.as_ref())
            .unwrap();
        let workers = spawner.workers();

        assert_eq!(server.len(), 2);
        assert!(!server.worker_ids().contains(&workers[0].spec.id));
        assert_eq!(server.dump().await.unwrap().workers.len(), 2);
        assert_eq!(workers[0].dumps.load(Ordering::SeqCst), 0);

        workers[1].kill(None);
        workers[2].kill(None);
        assert!(server.is_closed());
    }

    #[test]
    fn worker_closing_mid_build_does_not_close_the_pool() {
        let spawner = MockSpawner::killing_previous_at(2);
        let server = Server::builder(test_config(3))
            .build(spawner.as_ref())
            .unwrap();
        let workers = spawner.workers();

        assert!(!server.is_closed());
        assert_eq!(server.len(), 2);
        assert!(workers[0].is_closed());
        assert!(!workers[1].is_closed() && !workers[2].is_closed());

        workers[1].kill(None);
        workers[2].kill(None);
        assert!(server.is_closed());
    }

    #[test]
    fn no_survivor_after_build_is_an_error() {
        let spawner = MockSpawner::killing_previous_at(2).with_behavior(2, dying_on_spawn());
        let res = Server::builder(test_config(2)).build(spawner.as_ref());

        assert!(matches!(res, Err(PoolError::Spawn { .. })));
        assert!(spawner.workers().iter().all(|w| w.is_closed()));
    }

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().push(event.kind);
        }
    }

    #[tokio::test]
    async fn subscribers_see_events_up_to_pool_close() {
        let spawner = MockSpawner::new();
        let recorder = Arc::new(Recorder::default());
        let server = Server::builder(test_config(2))
            .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
            .build(spawner.as_ref())
            .unwrap();

        server.close(None);

        tokio::time::timeout(Duration::from_secs(1), async {
            while !recorder.kinds.lock().contains(&EventKind::PoolClosed) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let kinds = recorder.kinds.lock().clone();
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::WorkerSpawned).count(),
            2
        );
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::WorkerClosed).count(),
            2
        );
        assert_eq!(kinds.last(), Some(&EventKind::PoolClosed));
    }
}
