//! Episode — a contiguous burst of alerts sharing an entity and fingerprint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::alert::{Alert, Severity};
use crate::config::defaults::MAX_EPISODE_ALERTS;

/// A contiguous burst of alerts at one `(entity, fingerprint)` key,
/// separated from other bursts by a gap larger than the episode gap G.
///
/// Created on the first alert at a new key, extended by subsequent alerts
/// within G, finalised once the gap breaks, and evicted when `end` ages
/// past the window W.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Derived entity key shared by every member alert.
    pub entity: String,
    pub fingerprint: String,
    /// Distinct sources that contributed alerts. Ordered set so
    /// serialization is deterministic.
    pub sources: BTreeSet<String>,
    /// Epoch ms of the first member alert.
    pub start: i64,
    /// Epoch ms of the latest member alert.
    pub end: i64,
    /// Total member alerts, including ones not retained in the sample.
    pub count: u64,
    /// Sampled member alert ids, capped at [`MAX_EPISODE_ALERTS`].
    pub alert_ids: Vec<String>,
    /// Retained member alerts, capped at [`MAX_EPISODE_ALERTS`].
    pub alerts: Vec<Alert>,
    /// Highest severity seen across members.
    pub severity: Severity,
}

impl Episode {
    /// Open a new episode seeded from its first alert.
    pub fn open(alert: &Alert) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(alert.source.clone());
        Self {
            entity: alert.entity().to_string(),
            fingerprint: alert.fingerprint.clone(),
            sources,
            start: alert.timestamp,
            end: alert.timestamp,
            count: 1,
            alert_ids: vec![alert.id.clone()],
            alerts: vec![alert.clone()],
            severity: alert.severity,
        }
    }

    /// Extend this episode with a subsequent alert (gap already checked by
    /// the clusterer).
    pub fn extend(&mut self, alert: &Alert) {
        self.end = self.end.max(alert.timestamp);
        self.count += 1;
        self.sources.insert(alert.source.clone());
        if alert.severity.weight() > self.severity.weight() {
            self.severity = alert.severity;
        }
        if self.alert_ids.len() < MAX_EPISODE_ALERTS
            && !self.alert_ids.iter().any(|id| id == &alert.id)
        {
            self.alert_ids.push(alert.id.clone());
        }
        if self.alerts.len() < MAX_EPISODE_ALERTS {
            self.alerts.push(alert.clone());
        }
    }

    /// Jaccard similarity of two episodes' source mixes.
    pub fn source_jaccard(&self, other: &Self) -> f64 {
        let intersection = self.sources.intersection(&other.sources).count();
        let union = self.sources.union(&other.sources).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    /// Whether the `[start, end]` spans of two episodes overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        !(self.end < other.start || other.end < self.start)
    }
}
