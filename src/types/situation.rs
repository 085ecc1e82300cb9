//! Situation — a scored group of time-overlapping episodes believed to be
//! part of the same incident.

use serde::{Deserialize, Serialize};

use super::alert::Alert;
use super::episode::Episode;

/// Inclusive time window covered by a situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

/// Breadth of a situation in distinct entities and services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlastRadius {
    pub entities: usize,
    pub services: usize,
}

/// The episode most likely to have started the incident, with the
/// lead-lag estimate of how far the effects trail it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryCause {
    pub entity: String,
    /// Index of the causal episode within [`Situation::episodes`].
    pub episode_idx: usize,
    /// Clamped to [0, 1].
    pub confidence: f64,
    /// Estimated lag of the strongest effect behind the cause.
    pub lag_ms: i64,
}

/// A group of time-overlapping episodes joined into one incident candidate.
///
/// Rebuilt from live episodes on every tick; the published set is a
/// snapshot and never mutated after publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Situation {
    /// Deterministic id derived from window start, end, and group size.
    pub id: String,
    pub window: TimeWindow,
    /// Member episodes, ordered ascending by start.
    pub episodes: Vec<Episode>,
    /// Time-window alert sample, earliest first, capped at 200.
    pub related_alerts: Vec<Alert>,
    pub blast_radius: BlastRadius,
    /// Composite causal-plausibility score, non-negative.
    pub score: f64,
    pub primary_cause: PrimaryCause,
    /// Suggested next actions, at most 5, deterministic order.
    pub next_actions: Vec<String>,
}

impl Situation {
    /// Derive the deterministic situation id from its window and size.
    pub fn derive_id(start: i64, end: i64, group_size: usize) -> String {
        format!("sit-{start}-{end}-{group_size}")
    }
}
