//! Deduplicator — TTL-based repeat collapsing, flap tracking, and the
//! per-entity rate ceiling.
//!
//! Keyed by `fingerprint | entity`. Within the dedup TTL a repeat with an
//! unchanged status is collapsed; a repeat whose status toggled passes
//! through (the transition is signal) while the toggle count accumulates,
//! until the flap threshold is reached and the key is suppressed.
//!
//! After the per-alert pass, a sliding one-minute ceiling bounds each
//! entity's alert rate against the tick time; the newest excess is
//! discarded and survivors keep their original batch order.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::config::defaults::RATE_WINDOW_MS;
use crate::config::PipelineConfig;
use crate::types::{Alert, AlertStatus};

/// Per-key dedup state.
#[derive(Debug)]
struct DedupEntry {
    last_seen: i64,
    count: u64,
    flap_count: u32,
    last_status: AlertStatus,
}

/// Per-tick drop accounting, folded into the published metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupOutcome {
    pub input: usize,
    pub duplicates_dropped: usize,
    pub flap_dropped: usize,
    pub rate_dropped: usize,
}

impl DedupOutcome {
    /// Share of the input removed by this stage, in percent.
    pub fn drop_rate_pct(&self) -> f64 {
        if self.input == 0 {
            return 0.0;
        }
        let dropped = self.duplicates_dropped + self.flap_dropped + self.rate_dropped;
        dropped as f64 / self.input as f64 * 100.0
    }
}

/// Stage two of the pipeline. Owned exclusively by the pipeline driver.
#[derive(Debug, Default)]
pub struct Deduplicator {
    entries: HashMap<String, DedupEntry>,
    /// Accepted alert timestamps per entity inside the rate window.
    rate_window: HashMap<String, VecDeque<i64>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live dedup keys, for memory accounting.
    pub fn entry_len(&self) -> usize {
        self.entries.len()
    }

    /// Observed repeat count for a key, if tracked. Test/introspection hook.
    pub fn repeat_count(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.count)
    }

    /// Observed flap count for a key, if tracked.
    pub fn flap_count(&self, key: &str) -> Option<u32> {
        self.entries.get(key).map(|e| e.flap_count)
    }

    /// Run the dedup + flap pass followed by the per-entity rate ceiling.
    ///
    /// `now_ms` is the tick time; the rate window slides against it, never
    /// against the wall clock, so replays behave identically.
    pub fn process(
        &mut self,
        batch: Vec<Alert>,
        config: &PipelineConfig,
        now_ms: i64,
    ) -> (Vec<Alert>, DedupOutcome) {
        let mut outcome = DedupOutcome {
            input: batch.len(),
            ..DedupOutcome::default()
        };

        let mut survivors: Vec<Alert> = Vec::with_capacity(batch.len());
        for alert in batch {
            let t = alert.timestamp;

            match self.entries.entry(alert.dedup_key()) {
                Entry::Occupied(mut slot) => {
                    let entry = slot.get_mut();
                    if t - entry.last_seen < config.dedup_ttl_ms {
                        entry.count += 1;
                        let toggled = entry.last_status != alert.status;
                        if toggled {
                            entry.flap_count += 1;
                        }
                        entry.last_status = alert.status;

                        if !toggled {
                            outcome.duplicates_dropped += 1;
                            continue;
                        }
                        if entry.flap_count >= config.flap_drop_threshold {
                            outcome.flap_dropped += 1;
                            debug!(
                                fingerprint = %alert.fingerprint,
                                entity = %alert.entity(),
                                flaps = entry.flap_count,
                                "Suppressing flapping alert"
                            );
                            continue;
                        }
                    } else {
                        // TTL elapsed: a fresh epoch at the same key.
                        entry.last_seen = t;
                        entry.count = 1;
                        entry.last_status = alert.status;
                    }
                    survivors.push(alert);
                }
                Entry::Vacant(slot) => {
                    slot.insert(DedupEntry {
                        last_seen: t,
                        count: 1,
                        flap_count: 0,
                        last_status: alert.status,
                    });
                    survivors.push(alert);
                }
            }
        }

        let survivors = self.rate_limit(survivors, config, now_ms, &mut outcome);
        (survivors, outcome)
    }

    /// Per-entity sliding-minute ceiling. Alerts are judged per entity in
    /// timestamp order; survivors come back in original batch order.
    fn rate_limit(
        &mut self,
        batch: Vec<Alert>,
        config: &PipelineConfig,
        now_ms: i64,
        outcome: &mut DedupOutcome,
    ) -> Vec<Alert> {
        let horizon = now_ms - RATE_WINDOW_MS;

        // Entity -> (timestamp, batch index), explicitly sorted by time.
        let mut per_entity: HashMap<String, Vec<(i64, usize)>> = HashMap::new();
        for (idx, alert) in batch.iter().enumerate() {
            per_entity
                .entry(alert.entity().to_string())
                .or_default()
                .push((alert.timestamp, idx));
        }

        let mut dropped = vec![false; batch.len()];
        for (entity, mut members) in per_entity {
            members.sort_unstable();
            let window = self.rate_window.entry(entity).or_default();
            while window.front().is_some_and(|&ts| ts < horizon) {
                window.pop_front();
            }
            for (ts, idx) in members {
                if window.len() < config.max_alerts_per_minute {
                    window.push_back(ts);
                } else {
                    dropped[idx] = true;
                    outcome.rate_dropped += 1;
                }
            }
        }

        batch
            .into_iter()
            .enumerate()
            .filter_map(|(idx, alert)| (!dropped[idx]).then_some(alert))
            .collect()
    }

    /// Evict idle dedup entries and drained rate windows. Runs every tick.
    pub fn gc(&mut self, config: &PipelineConfig, now_ms: i64) {
        let horizon = now_ms - config.dedup_max_age_ms;
        self.entries.retain(|_, entry| entry.last_seen >= horizon);

        let rate_horizon = now_ms - RATE_WINDOW_MS;
        self.rate_window.retain(|_, window| {
            while window.front().is_some_and(|&ts| ts < rate_horizon) {
                window.pop_front();
            }
            !window.is_empty()
        });
    }
}
