//! Alert record — the unit of work flowing through the correlation pipeline.
//!
//! Alerts arrive from heterogeneous monitoring sources (cluster events,
//! metric monitors, network/infra probes). They are created at ingress and
//! read-only thereafter; each surviving alert is referenced by exactly one
//! episode and dropped when that episode is evicted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entity key used when an alert carries no service/component/resource hint.
pub const ENTITY_KEY_UNKNOWN: &str = "na";

/// Alert status as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
    Info,
}

impl Default for AlertStatus {
    fn default() -> Self {
        Self::Firing
    }
}

/// Alert severity with a strict total order used throughout scoring.
///
/// Weights: critical=4 > high=3 > medium=2 > low=1. Unknown severity tokens
/// parse as `Low` (weight 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Numeric weight for severity comparisons and score normalisation.
    pub fn weight(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    /// Parse a severity token; unknown tokens map to `Low`.
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "critical" | "crit" => Self::Critical,
            "high" | "error" => Self::High,
            "medium" | "warning" | "warn" => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Low
    }
}

/// A single alert record.
///
/// Timestamps are epoch milliseconds. Optional topology fields narrow the
/// blast-radius attribution; the tag bag carries everything else verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique id assigned by the source (or ingress).
    pub id: String,
    /// Epoch-ms timestamp, monotone per source.
    pub timestamp: i64,
    /// Source tag, e.g. "k8s", "datadog", "logicmonitor".
    pub source: String,
    /// Vendor-side event id, when the source exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_event_id: Option<String>,
    /// Stable semantic identity; collapses repeats of the same condition.
    pub fingerprint: String,
    /// Human-readable title the fingerprint was derived from.
    #[serde(default)]
    pub title: String,
    pub status: AlertStatus,
    pub severity: Severity,
    /// Source-specific kind, e.g. "pod_crash", "latency_monitor".
    #[serde(default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    /// Deployment marker; drives change-proximity scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s_key: Option<String>,

    /// Free-form tag bag, preserved verbatim.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,

    /// Fold count for synthesized alerts (threshold engine output).
    #[serde(default = "default_count")]
    pub count: u32,
    /// First timestamp of the folded burst, when synthesized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_ts: Option<i64>,
    /// Last timestamp of the folded burst, when synthesized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ts: Option<i64>,
}

fn default_count() -> u32 {
    1
}

impl Default for Alert {
    fn default() -> Self {
        Self {
            id: String::new(),
            timestamp: 0,
            source: String::new(),
            vendor_event_id: None,
            fingerprint: String::new(),
            title: String::new(),
            status: AlertStatus::Firing,
            severity: Severity::Low,
            kind: String::new(),
            entity_key: None,
            service: None,
            component: None,
            resource: None,
            namespace: None,
            pod: None,
            host: None,
            region: None,
            cluster: None,
            deploy_key: None,
            net_key: None,
            k8s_key: None,
            tags: HashMap::new(),
            count: 1,
            first_ts: None,
            last_ts: None,
        }
    }
}

impl Alert {
    /// Derived entity key: first non-empty of
    /// {entity_key, service, component, resource, "na"}.
    pub fn entity(&self) -> &str {
        for candidate in [
            self.entity_key.as_deref(),
            self.service.as_deref(),
            self.component.as_deref(),
            self.resource.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if !candidate.is_empty() {
                return candidate;
            }
        }
        ENTITY_KEY_UNKNOWN
    }

    /// Composite key used by the deduplicator: `fingerprint | entity`.
    pub fn dedup_key(&self) -> String {
        format!("{}|{}", self.fingerprint, self.entity())
    }

    /// Composite key used by the episode clusterer: `entity | fingerprint`.
    pub fn episode_key(&self) -> String {
        format!("{}|{}", self.entity(), self.fingerprint)
    }

    /// Stable fingerprint of a title plus label bag.
    ///
    /// Labels are folded in sorted key order so insertion order never
    /// changes the digest.
    pub fn fingerprint_of(title: &str, labels: &HashMap<String, String>) -> String {
        let mut parts: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
        parts.sort();
        let digest = md5::compute(format!("{title}\n{}", parts.join(",")));
        format!("{digest:x}")
    }
}
