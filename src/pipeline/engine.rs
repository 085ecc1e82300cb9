//! Engine handle — the contract the core exposes to its embedder.
//!
//! `CorrelationEngine` is cheap to share behind an `Arc`; every method
//! takes `&self`. Ingest methods enqueue and return immediately; all
//! processing happens on the driver task spawned by [`start`].
//!
//! [`start`]: CorrelationEngine::start

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::driver::{Control, PipelineDriver};
use super::state::SituationSnapshot;
use crate::config::defaults::{CONTROL_QUEUE_CAPACITY, INGRESS_QUEUE_CAPACITY};
use crate::config::{ConfigError, ConfigUpdate, PipelineConfig};
use crate::types::{Alert, GraphHints, RawEvent, Situation, TickMetrics};

/// Ingest failures. Both are back-pressure signals, not pipeline faults;
/// the caller may drop or retry.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("ingress queue full")]
    QueueFull,
    #[error("engine not running")]
    Stopped,
}

/// Consumer callback invoked at most once per tick.
pub type SubscriberFn = Box<dyn Fn(&[Situation], &TickMetrics) + Send + 'static>;

/// State shared between the engine handle and the driver task.
pub(crate) struct EngineShared {
    snapshot: ArcSwap<SituationSnapshot>,
    graph: ArcSwap<GraphHints>,
    subscribers: Mutex<Vec<SubscriberFn>>,
}

impl EngineShared {
    pub(crate) fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(SituationSnapshot::default()),
            graph: ArcSwap::from_pointee(GraphHints::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Graph hints as of this tick boundary.
    pub(crate) fn graph_hints(&self) -> Arc<GraphHints> {
        self.graph.load_full()
    }

    /// The most recent publication.
    pub(crate) fn latest(&self) -> Arc<SituationSnapshot> {
        self.snapshot.load_full()
    }

    /// Swap in a fresh snapshot and notify subscribers.
    pub(crate) fn publish(&self, situations: Vec<Situation>, metrics: TickMetrics) {
        let snapshot = Arc::new(SituationSnapshot {
            situations: Arc::new(situations),
            metrics,
        });
        self.snapshot.store(Arc::clone(&snapshot));
        self.notify(&snapshot);
    }

    /// Re-deliver the previous snapshot after a failed tick; consumers
    /// always receive a valid (possibly stale) situation set.
    pub(crate) fn republish(&self) {
        let snapshot = self.snapshot.load_full();
        self.notify(&snapshot);
    }

    fn notify(&self, snapshot: &SituationSnapshot) {
        let subscribers = lock(&self.subscribers);
        for callback in subscribers.iter() {
            callback(&snapshot.situations, &snapshot.metrics);
        }
    }
}

/// Lock a mutex, recovering the data from a poisoned lock. Subscriber
/// callbacks run on the driver task, so a panicking consumer must not
/// wedge the engine handle.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live channel ends of a started pipeline.
struct RunningPipeline {
    alert_tx: mpsc::Sender<Alert>,
    event_tx: mpsc::Sender<RawEvent>,
    control_tx: mpsc::Sender<Control>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The streaming alert-correlation engine.
///
/// ```ignore
/// let engine = CorrelationEngine::new(PipelineConfig::load())?;
/// engine.start();
/// engine.ingest(alert)?;
/// let situations = engine.current_situations();
/// engine.stop().await;
/// ```
pub struct CorrelationEngine {
    config: Mutex<PipelineConfig>,
    shared: Arc<EngineShared>,
    running: Mutex<Option<RunningPipeline>>,
}

impl CorrelationEngine {
    /// Create an engine with a validated configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Mutex::new(config),
            shared: Arc::new(EngineShared::new()),
            running: Mutex::new(None),
        })
    }

    /// Start the tick loop on a fresh driver task. Idempotent: calling
    /// `start` while running is a no-op; calling it after `stop` spawns a
    /// new driver with fresh stage state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut running = lock(&self.running);
        if running.is_some() {
            warn!("start() called while already running — ignoring");
            return;
        }

        let (alert_tx, alert_rx) = mpsc::channel(INGRESS_QUEUE_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(INGRESS_QUEUE_CAPACITY);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();

        // Fresh run, fresh publication.
        self.shared.publish(Vec::new(), TickMetrics::default());

        let driver = PipelineDriver::new(
            lock(&self.config).clone(),
            Arc::clone(&self.shared),
            alert_rx,
            event_rx,
            control_rx,
            cancel.clone(),
        );
        let handle = tokio::spawn(driver.run());

        *running = Some(RunningPipeline {
            alert_tx,
            event_tx,
            control_tx,
            cancel,
            handle,
        });
        info!("Correlation engine started");
    }

    /// Stop the tick loop: the in-flight tick completes, queued ingress is
    /// discarded, and all stage state is released.
    pub async fn stop(&self) {
        let running = lock(&self.running).take();
        let Some(running) = running else {
            return;
        };
        running.cancel.cancel();
        if running.handle.await.is_err() {
            warn!("Driver task ended abnormally during shutdown");
        }
        info!("Correlation engine stopped");
    }

    /// Enqueue one alert. Returns immediately; thread-safe with respect to
    /// the driver.
    pub fn ingest(&self, alert: Alert) -> Result<(), IngestError> {
        let running = lock(&self.running);
        let Some(running) = running.as_ref() else {
            return Err(IngestError::Stopped);
        };
        running.alert_tx.try_send(alert).map_err(into_ingest_error)
    }

    /// Enqueue one raw cluster event for the threshold engine.
    pub fn ingest_raw_event(&self, event: RawEvent) -> Result<(), IngestError> {
        let running = lock(&self.running);
        let Some(running) = running.as_ref() else {
            return Err(IngestError::Stopped);
        };
        running.event_tx.try_send(event).map_err(into_ingest_error)
    }

    /// Atomically replace the graph used by the scorer at the next tick
    /// boundary.
    pub fn update_graph_hints(&self, hints: GraphHints) {
        self.shared.graph.store(Arc::new(hints));
    }

    /// Merge recognised options into the running config at the next tick
    /// boundary. An invalid update is rejected whole; the running config
    /// is retained.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<(), ConfigError> {
        lock(&self.config).apply_update(&update)?;
        if let Some(running) = lock(&self.running).as_ref() {
            if running.control_tx.try_send(Control::Config(update)).is_err() {
                warn!("Control queue full — config update deferred to restart");
            }
        }
        Ok(())
    }

    /// Register a consumer invoked at most once per tick with the
    /// published situations and metrics.
    pub fn subscribe(&self, callback: impl Fn(&[Situation], &TickMetrics) + Send + 'static) {
        lock(&self.shared.subscribers).push(Box::new(callback));
    }

    /// Synchronous snapshot of the latest published situation set.
    pub fn current_situations(&self) -> Vec<Situation> {
        self.shared.latest().situations.as_ref().clone()
    }

    /// Metrics from the latest published tick.
    pub fn latest_metrics(&self) -> TickMetrics {
        self.shared.latest().metrics.clone()
    }

    /// Whether the driver task is live.
    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }
}

fn into_ingest_error<T>(err: TrySendError<T>) -> IngestError {
    match err {
        TrySendError::Full(_) => IngestError::QueueFull,
        TrySendError::Closed(_) => IngestError::Stopped,
    }
}
