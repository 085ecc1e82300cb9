//! Sliding-window burst folding for raw cluster events.
//!
//! For every `(rule, key)` pair the engine keeps the sequence of matching
//! event timestamps pruned to the rule window, and a cooldown deadline.
//! When the sequence reaches the rule threshold outside a cooldown epoch,
//! one synthesized alert is emitted and the cooldown re-armed.
//!
//! Event timestamps, not wall clock, drive pruning and cooldown checks, so
//! a fixed rule and event sequence always synthesizes the same alerts.

use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use super::rules::ThresholdRule;
use crate::types::{Alert, AlertStatus, RawEvent};

/// Per `(rule, key)` sliding state.
#[derive(Debug, Default)]
struct RuleState {
    /// Matching event timestamps inside the rule window, ascending.
    timestamps: VecDeque<i64>,
    /// No emission for this key before this instant.
    cooldown_until: i64,
}

/// Converts raw cluster events into synthesized alerts using a declarative
/// rule set. Owned exclusively by the pipeline driver.
#[derive(Debug, Default)]
pub struct ThresholdEngine {
    /// Keyed by `rule.name | composite-key`.
    states: HashMap<String, RuleState>,
    dropped_malformed: u64,
}

impl ThresholdEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Malformed events dropped since construction.
    pub fn dropped_malformed(&self) -> u64 {
        self.dropped_malformed
    }

    /// Number of live `(rule, key)` entries, for memory accounting.
    pub fn state_len(&self) -> usize {
        self.states.len()
    }

    /// Fold one tick's raw events into synthesized alerts.
    ///
    /// Malformed events are dropped with a counter increment and never
    /// abort the tick.
    pub fn process(&mut self, events: &[RawEvent], rules: &[ThresholdRule]) -> Vec<Alert> {
        let mut synthesized = Vec::new();

        for event in events {
            if !event.is_well_formed() {
                self.dropped_malformed += 1;
                warn!(reason = %event.reason, "Dropping malformed raw event");
                continue;
            }

            for rule in rules {
                if !rule.matches(event) {
                    continue;
                }
                let key = rule.key_for(event);
                let state = self
                    .states
                    .entry(format!("{}|{key}", rule.name))
                    .or_default();

                state.timestamps.push_back(event.timestamp);
                let horizon = event.timestamp - rule.window_ms;
                while state.timestamps.front().is_some_and(|&ts| ts < horizon) {
                    state.timestamps.pop_front();
                }

                if state.timestamps.len() >= rule.threshold
                    && event.timestamp >= state.cooldown_until
                {
                    synthesized.push(Self::synthesize(rule, &key, state));
                    state.cooldown_until = event.timestamp + rule.cooldown_ms;
                    debug!(
                        rule = %rule.name,
                        key = %key,
                        count = state.timestamps.len(),
                        "Threshold rule fired"
                    );
                }
            }
        }

        synthesized
    }

    /// Reclaim `(rule, key)` entries whose sequence has emptied and whose
    /// cooldown has elapsed. Called once per tick.
    pub fn evict(&mut self, now_ms: i64, rules: &[ThresholdRule]) {
        let windows: HashMap<&str, i64> = rules
            .iter()
            .map(|r| (r.name.as_str(), r.window_ms))
            .collect();

        self.states.retain(|key, state| {
            let window = key
                .split('|')
                .next()
                .and_then(|rule| windows.get(rule).copied())
                .unwrap_or(0);
            let horizon = now_ms - window;
            while state.timestamps.front().is_some_and(|&ts| ts < horizon) {
                state.timestamps.pop_front();
            }
            !(state.timestamps.is_empty() && state.cooldown_until <= now_ms)
        });
    }

    fn synthesize(rule: &ThresholdRule, key: &str, state: &RuleState) -> Alert {
        let first_ts = state.timestamps.front().copied();
        let last_ts = state.timestamps.back().copied();
        let timestamp = last_ts.unwrap_or(0);
        Alert {
            id: format!("{}:{key}:{timestamp}", rule.name),
            timestamp,
            source: "k8s".to_string(),
            fingerprint: format!("{}|{key}", rule.name),
            title: format!("{} threshold exceeded for {key}", rule.name),
            status: AlertStatus::Firing,
            severity: rule.severity,
            kind: rule.name.clone(),
            entity_key: Some(key.to_string()),
            count: state.timestamps.len() as u32,
            first_ts,
            last_ts,
            ..Alert::default()
        }
    }
}
