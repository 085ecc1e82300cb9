//! Episode Clusterer — burst grouping per `(entity, fingerprint)` key with
//! sliding-window maintenance.
//!
//! Each surviving alert lands in the current open episode at its key; a
//! gap larger than G closes the episode and opens a fresh one. Closed
//! episodes stay visible to the situation builder until their end ages
//! past the window W.
//!
//! The tick batch is walked in timestamp order, so bursts accumulate
//! exactly as a separate pre-clustering pass would produce them.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::types::{Alert, Episode};

/// Stage three of the pipeline. Owned exclusively by the pipeline driver.
#[derive(Debug, Default)]
pub struct EpisodeClusterer {
    /// Open episode per `entity | fingerprint` key. At most one per key.
    open: HashMap<String, Episode>,
    /// Finalised episodes awaiting window eviction.
    closed: Vec<Episode>,
    /// Secondary index: entity -> open episode keys.
    entity_index: HashMap<String, Vec<String>>,
}

impl EpisodeClusterer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total episodes currently tracked (open + closed).
    pub fn episode_count(&self) -> usize {
        self.open.len() + self.closed.len()
    }

    /// Distinct entities with at least one open episode.
    pub fn entity_count(&self) -> usize {
        self.entity_index.len()
    }

    /// Assign one tick's surviving alerts to episodes.
    ///
    /// Alerts are processed in timestamp order regardless of batch
    /// arrival order; ties keep arrival order.
    pub fn assign(&mut self, batch: &[Alert], config: &PipelineConfig) {
        let mut ordered: Vec<&Alert> = batch.iter().collect();
        ordered.sort_by_key(|a| a.timestamp);

        for alert in ordered {
            match self.open.entry(alert.episode_key()) {
                Entry::Occupied(mut slot) => {
                    let episode = slot.get_mut();
                    // Lifetime bound keeps end - start within the situation
                    // lifetime even under continuous extension.
                    if alert.timestamp - episode.end > config.episode_gap_ms
                        || alert.timestamp - episode.start > config.max_situation_lifetime_ms
                    {
                        // Gap break: finalise and start over at this key.
                        let finished = std::mem::replace(episode, Episode::open(alert));
                        debug!(
                            entity = %finished.entity,
                            fingerprint = %finished.fingerprint,
                            count = finished.count,
                            "Episode closed by gap break"
                        );
                        self.closed.push(finished);
                    } else {
                        episode.extend(alert);
                    }
                }
                Entry::Vacant(slot) => {
                    let episode = Episode::open(alert);
                    self.entity_index
                        .entry(episode.entity.clone())
                        .or_default()
                        .push(slot.key().clone());
                    slot.insert(episode);
                }
            }
        }
    }

    /// Evict every episode whose end has aged past the window W, open or
    /// closed, and prune the entity index. Runs at the end of every tick.
    pub fn evict(&mut self, config: &PipelineConfig, now_ms: i64) {
        let horizon = now_ms - config.window_ms;
        self.closed.retain(|e| e.end >= horizon);

        let stale: Vec<String> = self
            .open
            .iter()
            .filter(|(_, e)| e.end < horizon)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            if let Some(episode) = self.open.remove(key) {
                if let Some(keys) = self.entity_index.get_mut(&episode.entity) {
                    keys.retain(|k| k != key);
                    if keys.is_empty() {
                        self.entity_index.remove(&episode.entity);
                    }
                }
            }
        }
        if !stale.is_empty() {
            debug!(evicted = stale.len(), "Evicted open episodes past window");
        }
    }

    /// Episodes feeding situation construction this tick: everything with
    /// `end >= now - W`, sorted ascending by start.
    pub fn live(&self, config: &PipelineConfig, now_ms: i64) -> Vec<Episode> {
        let horizon = now_ms - config.window_ms;
        let mut live: Vec<Episode> = self
            .open
            .values()
            .chain(self.closed.iter())
            .filter(|e| e.end >= horizon)
            .cloned()
            .collect();
        live.sort_by_key(|e| e.start);
        live
    }
}
