//! Pipeline driver — the single-owner tick loop.
//!
//! All four stage states live here and are mutated only on this task.
//! Each tick: apply queued control updates, drain the ingress queues,
//! run Threshold Engine → Deduplicator → Episode Clusterer → Situation
//! Builder → Scorer, fold the result into the published store, and hand
//! a snapshot to the subscribers.
//!
//! A panic inside the stages unwinds the tick only: the previous snapshot
//! is republished and the loop continues.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::EngineShared;
use super::state::SituationStore;
use crate::config::defaults::TICK_OVERRUN_FACTOR;
use crate::config::{ConfigUpdate, PipelineConfig};
use crate::dedup::{DedupOutcome, Deduplicator};
use crate::episodes::EpisodeClusterer;
use crate::scoring::{score_situation, UndirectedGraph};
use crate::situations::build_situations;
use crate::threshold::ThresholdEngine;
use crate::types::{Alert, RawEvent, Situation, TickMetrics};

/// Rough per-entry heap costs for the memory hint metric.
const EPISODE_COST_BYTES: usize = 1_536;
const DEDUP_ENTRY_COST_BYTES: usize = 96;
const RULE_STATE_COST_BYTES: usize = 160;

/// Control updates applied at tick boundaries only.
#[derive(Debug)]
pub(crate) enum Control {
    Config(ConfigUpdate),
}

/// Owns every stage's state and runs the tick loop until cancellation.
pub(crate) struct PipelineDriver {
    config: PipelineConfig,
    threshold: ThresholdEngine,
    dedup: Deduplicator,
    clusterer: EpisodeClusterer,
    store: SituationStore,
    shared: Arc<EngineShared>,
    alert_rx: mpsc::Receiver<Alert>,
    event_rx: mpsc::Receiver<RawEvent>,
    control_rx: mpsc::Receiver<Control>,
    cancel: CancellationToken,
    tick_index: u64,
    tick_overruns: u64,
    failed_ticks: u64,
    dropped_malformed: u64,
}

impl PipelineDriver {
    pub(crate) fn new(
        config: PipelineConfig,
        shared: Arc<EngineShared>,
        alert_rx: mpsc::Receiver<Alert>,
        event_rx: mpsc::Receiver<RawEvent>,
        control_rx: mpsc::Receiver<Control>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            threshold: ThresholdEngine::new(),
            dedup: Deduplicator::new(),
            clusterer: EpisodeClusterer::new(),
            store: SituationStore::new(),
            shared,
            alert_rx,
            event_rx,
            control_rx,
            cancel,
            tick_index: 0,
            tick_overruns: 0,
            failed_ticks: 0,
            dropped_malformed: 0,
        }
    }

    /// Run until cancellation. The in-flight tick always completes;
    /// alerts still queued at shutdown are discarded.
    pub(crate) async fn run(mut self) {
        let mut hop_ms = self.config.hop_ms;
        let mut ticker = Self::make_ticker(hop_ms);
        info!(hop_ms, window_ms = self.config.window_ms, "Pipeline driver started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(
                        ticks = self.tick_index,
                        overruns = self.tick_overruns,
                        failed = self.failed_ticks,
                        "Shutdown signal received — pipeline driver stopping"
                    );
                    break;
                }
                _ = ticker.tick() => {
                    self.tick();
                    if self.config.hop_ms != hop_ms {
                        hop_ms = self.config.hop_ms;
                        ticker = Self::make_ticker(hop_ms);
                        info!(hop_ms, "Tick cadence updated");
                    }
                }
            }
        }
    }

    fn make_ticker(hop_ms: i64) -> tokio::time::Interval {
        let mut ticker = interval(Duration::from_millis(hop_ms.max(1) as u64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// One full pipeline pass. Public within the crate so tests can drive
    /// ticks without the timer.
    pub(crate) fn tick(&mut self) {
        let started = Instant::now();
        self.tick_index += 1;
        self.apply_controls();

        let events = self.drain_events();
        let batch = self.drain_alerts();
        let input_len = batch.len() + events.len();
        let now_ms = Utc::now().timestamp_millis();

        let result = catch_unwind(AssertUnwindSafe(|| {
            self.process_batch(batch, events, now_ms)
        }));

        match result {
            Ok((situations, outcome)) => {
                let published = self.store.merge(situations, &self.config, now_ms);
                let metrics =
                    self.build_metrics(&published, &outcome, input_len, started, now_ms);
                self.shared.publish(published, metrics);
            }
            Err(_) => {
                self.failed_ticks += 1;
                warn!(
                    tick = self.tick_index,
                    "Tick aborted by stage failure — republishing previous snapshot"
                );
                self.shared.republish();
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as i64;
        if elapsed_ms > TICK_OVERRUN_FACTOR * self.config.hop_ms {
            self.tick_overruns += 1;
            warn!(
                elapsed_ms,
                budget_ms = TICK_OVERRUN_FACTOR * self.config.hop_ms,
                "Tick overran its budget"
            );
        }
    }

    /// The four stages in leaf order. Panics here abort the tick, not the
    /// process.
    fn process_batch(
        &mut self,
        mut batch: Vec<Alert>,
        events: Vec<RawEvent>,
        now_ms: i64,
    ) -> (Vec<Situation>, DedupOutcome) {
        // Stage 1: threshold engine folds raw events into synthesized alerts.
        let synthesized = self
            .threshold
            .process(&events, &self.config.threshold_rules);
        self.threshold.evict(now_ms, &self.config.threshold_rules);
        if !synthesized.is_empty() {
            debug!(count = synthesized.len(), "Threshold engine synthesized alerts");
        }
        batch.extend(synthesized);

        // Stage 2: dedup, flap suppression, rate ceiling.
        let (survivors, outcome) = self.dedup.process(batch, &self.config, now_ms);
        self.dedup.gc(&self.config, now_ms);

        // Stage 3: episode assignment and window eviction.
        self.clusterer.assign(&survivors, &self.config);
        self.clusterer.evict(&self.config, now_ms);
        let live = self.clusterer.live(&self.config, now_ms);

        // Stage 4: situation construction and scoring.
        let mut situations = build_situations(live, &survivors);
        let hints = self.shared.graph_hints();
        let graph = UndirectedGraph::new(&hints);
        for situation in &mut situations {
            score_situation(situation, &graph, &self.config);
        }

        (situations, outcome)
    }

    fn apply_controls(&mut self) {
        while let Ok(control) = self.control_rx.try_recv() {
            match control {
                Control::Config(update) => match self.config.apply_update(&update) {
                    Ok(()) => info!(?update, "Config update applied at tick boundary"),
                    Err(e) => warn!(error = %e, "Config update rejected"),
                },
            }
        }
    }

    fn drain_alerts(&mut self) -> Vec<Alert> {
        let mut batch = Vec::new();
        while let Ok(alert) = self.alert_rx.try_recv() {
            if alert.timestamp <= 0 {
                self.dropped_malformed += 1;
                warn!(id = %alert.id, "Dropping alert with missing timestamp");
                continue;
            }
            batch.push(alert);
        }
        batch
    }

    fn drain_events(&mut self) -> Vec<RawEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn build_metrics(
        &self,
        published: &[Situation],
        outcome: &DedupOutcome,
        input_len: usize,
        started: Instant,
        _now_ms: i64,
    ) -> TickMetrics {
        let episode_count = self.clusterer.episode_count();

        let related_total: usize = published.iter().map(|s| s.related_alerts.len()).sum();
        let state_bytes = episode_count * EPISODE_COST_BYTES
            + self.dedup.entry_len() * DEDUP_ENTRY_COST_BYTES
            + self.threshold.state_len() * RULE_STATE_COST_BYTES
            + related_total * EPISODE_COST_BYTES / 4;

        let accuracy = if published.is_empty() {
            0.0
        } else {
            published
                .iter()
                .map(|s| s.primary_cause.confidence)
                .sum::<f64>()
                / published.len() as f64
                * 100.0
        };

        TickMetrics {
            tick_index: self.tick_index,
            processing_time_ms: started.elapsed().as_millis() as u64,
            memory_hint_mb: state_bytes as f64 / (1024.0 * 1024.0),
            throughput_alerts_per_sec: input_len as f64 * 1_000.0 / self.config.hop_ms as f64,
            dedup_rate_pct: outcome.drop_rate_pct(),
            correlation_accuracy_pct: accuracy,
            situation_count: published.len(),
            episode_count,
            dropped_malformed: self.dropped_malformed + self.threshold.dropped_malformed(),
            tick_overruns: self.tick_overruns,
        }
    }
}
