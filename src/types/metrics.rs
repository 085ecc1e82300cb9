//! Per-tick pipeline metrics published alongside the situation snapshot.

use serde::{Deserialize, Serialize};

/// Metrics handed to subscribers once per tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickMetrics {
    /// Monotonic tick counter since `start()`.
    pub tick_index: u64,
    /// Wall time spent inside the tick.
    pub processing_time_ms: u64,
    /// Rough in-memory footprint of retained pipeline state.
    pub memory_hint_mb: f64,
    pub throughput_alerts_per_sec: f64,
    /// Share of this tick's input removed by dedup, flap, and rate control.
    pub dedup_rate_pct: f64,
    /// Mean primary-cause confidence across published situations, as a
    /// percentage. Zero when nothing is published.
    pub correlation_accuracy_pct: f64,
    pub situation_count: usize,
    pub episode_count: usize,
    /// Malformed records dropped since `start()`.
    pub dropped_malformed: u64,
    /// Ticks that exceeded the overrun budget since `start()`.
    pub tick_overruns: u64,
}
