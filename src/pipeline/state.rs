//! Published situation state.
//!
//! The driver rebuilds situations every tick; this module keeps the
//! published set across ticks, retiring entries that age out or go quiet,
//! and holds the immutable snapshot handed to consumers.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::types::{Situation, TickMetrics};

/// The immutable per-tick publication: situations ordered by descending
/// score plus the tick metrics. Never mutated after publication.
#[derive(Debug, Clone, Default)]
pub struct SituationSnapshot {
    pub situations: Arc<Vec<Situation>>,
    pub metrics: TickMetrics,
}

/// Per-id entry with its regeneration clock.
#[derive(Debug)]
struct PublishedEntry {
    situation: Situation,
    last_regenerated: i64,
}

/// Keeps published situations alive between ticks.
///
/// A situation survives until its window-end ages past the maximum
/// lifetime, or until it stops being regenerated for the quiet threshold.
#[derive(Debug, Default)]
pub struct SituationStore {
    published: HashMap<String, PublishedEntry>,
}

impl SituationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.published.len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.is_empty()
    }

    /// Fold this tick's rebuilt situations into the published set and
    /// return the publication order: descending score, id as tiebreak.
    pub fn merge(
        &mut self,
        fresh: Vec<Situation>,
        config: &PipelineConfig,
        now_ms: i64,
    ) -> Vec<Situation> {
        for situation in fresh {
            self.published.insert(
                situation.id.clone(),
                PublishedEntry {
                    situation,
                    last_regenerated: now_ms,
                },
            );
        }

        self.published.retain(|_, entry| {
            let quiet = now_ms - entry.last_regenerated >= config.quiet_threshold_ms;
            let expired =
                now_ms - entry.situation.window.end >= config.max_situation_lifetime_ms;
            !quiet && !expired
        });

        let mut ordered: Vec<Situation> = self
            .published
            .values()
            .map(|entry| entry.situation.clone())
            .collect();
        ordered.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        ordered
    }
}
