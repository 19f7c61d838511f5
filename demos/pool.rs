//! Runs a pool of in-process workers, places rooms on it and closes it on Ctrl-C
//! (or after a few seconds).
//!
//! ```text
//! RUST_LOG=debug cargo run --example pool --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use poolvisor::{
    CloseNotifier, LogLevel, LogWriter, PoolConfig, Registry, Room, RoomOptions, Server, SpawnFn,
    Subscribe, Worker, WorkerError, WorkerId, WorkerRef, WorkerSettings, WorkerSpec,
};

/// Worker living inside this process; stands in for a real media worker.
struct LocalWorker {
    spec: WorkerSpec,
    rooms: AtomicUsize,
    level: Mutex<Option<LogLevel>>,
    stop: CancellationToken,
}

impl LocalWorker {
    fn start(spec: WorkerSpec, on_close: CloseNotifier) -> Arc<Self> {
        let worker = Arc::new(Self {
            spec,
            rooms: AtomicUsize::new(0),
            level: Mutex::new(None),
            stop: CancellationToken::new(),
        });

        // Worker #3 "crashes" after two seconds; the others run until closed.
        let crash_after = (worker.spec.ordinal == 3).then_some(Duration::from_secs(2));
        let stop = worker.stop.clone();
        tokio::spawn(async move {
            let error = match crash_after {
                Some(after) => tokio::select! {
                    _ = stop.cancelled() => None,
                    _ = tokio::time::sleep(after) => Some(WorkerError::Died { error: "simulated crash".into() }),
                },
                None => {
                    stop.cancelled().await;
                    None
                }
            };
            stop.cancel();
            on_close.notify(error);
        });
        worker
    }

    fn check_alive(&self) -> Result<(), WorkerError> {
        if self.stop.is_cancelled() {
            Err(WorkerError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Worker for LocalWorker {
    fn id(&self) -> &WorkerId {
        &self.spec.id
    }

    fn close(&self) {
        self.stop.cancel();
    }

    async fn dump(&self) -> Result<serde_json::Value, WorkerError> {
        self.check_alive()?;
        Ok(serde_json::json!({
            "ports": self.spec.ports,
            "args": self.spec.args,
            "rooms": self.rooms.load(Ordering::Relaxed),
            "logLevel": *self.level.lock(),
        }))
    }

    async fn update_settings(&self, settings: WorkerSettings) -> Result<(), WorkerError> {
        self.check_alive()?;
        if let Some(level) = settings.log_level {
            *self.level.lock() = Some(level);
        }
        Ok(())
    }

    async fn create_room(&self, _options: RoomOptions) -> Result<Room, WorkerError> {
        self.check_alive()?;
        self.rooms.fetch_add(1, Ordering::Relaxed);
        Ok(Room::new(self.spec.id.clone()))
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = PoolConfig {
        num_workers: 4,
        rtc_min_port: 40000,
        rtc_max_port: 40999,
        ..PoolConfig::default()
    };

    let spawner = SpawnFn::arc(
        |spec: WorkerSpec, on_close: CloseNotifier| -> Result<WorkerRef, WorkerError> {
            Ok(LocalWorker::start(spec, on_close))
        },
    );
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let server = Server::builder(cfg)
        .with_subscribers(subs)
        .build(spawner.as_ref())?;

    let registry = Registry::new();
    registry.register(Arc::clone(&server)).await;

    for _ in 0..8 {
        let room = server.create_room(&RoomOptions::default()).await?;
        println!("room {} -> {}", room.id, room.worker);
    }

    server
        .update_settings(&WorkerSettings {
            log_level: Some(LogLevel::Warn),
            ..WorkerSettings::default()
        })
        .await?;

    tokio::time::sleep(Duration::from_secs(3)).await;
    let dump = server.dump().await?;
    println!("{}", serde_json::to_string_pretty(&dump)?);

    tokio::select! {
        res = registry.close_on_signal() => println!("closed {} pool(s) on signal", res?),
        _ = tokio::time::sleep(Duration::from_secs(5)) => {
            println!("closed {} pool(s) on timeout", registry.close_all().await);
        }
    }
    server.closed().await;

    match server.dump().await {
        Err(e) => println!("after close: {e}"),
        Ok(_) => println!("after close: unexpected dump"),
    }
    Ok(())
}
