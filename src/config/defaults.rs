//! System-wide default constants.
//!
//! Every tunable in [`crate::config::PipelineConfig`] defaults to a named
//! constant here so the zero-config behaviour is auditable in one place.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Tick cadence and retention
// ============================================================================

/// Episode retention window W (ms) feeding situation construction.
pub const WINDOW_MS: i64 = 900_000;

/// Hop period H (ms) — the tick cadence.
pub const HOP_MS: i64 = 1_000;

/// A tick slower than `TICK_OVERRUN_FACTOR * hop` is logged as an overrun.
pub const TICK_OVERRUN_FACTOR: i64 = 10;

// ============================================================================
// Deduplication
// ============================================================================

/// Repeats of one `fingerprint|entity` key within this TTL are duplicates.
pub const DEDUP_TTL_MS: i64 = 120_000;

/// Dedup map entries idle longer than this are garbage collected.
pub const DEDUP_MAX_AGE_MS: i64 = 600_000;

/// Status toggles beyond this count drop the alert as a flap.
pub const FLAP_DROP_THRESHOLD: u32 = 3;

/// Per-entity alert ceiling within the sliding rate window.
pub const MAX_ALERTS_PER_MINUTE: usize = 100;

/// Sliding window for the per-entity rate ceiling (ms).
pub const RATE_WINDOW_MS: i64 = 60_000;

// ============================================================================
// Episode clustering
// ============================================================================

/// Gap G (ms) separating bursts into distinct episodes.
pub const EPISODE_GAP_MS: i64 = 120_000;

/// Retained alert sample per episode.
pub const MAX_EPISODE_ALERTS: usize = 50;

// ============================================================================
// Situations
// ============================================================================

/// Related-alert sample per situation, earliest kept.
pub const MAX_RELATED_ALERTS: usize = 200;

/// Suggested next actions per situation.
pub const MAX_NEXT_ACTIONS: usize = 5;

/// Source-mix Jaccard above this joins two overlapping episodes.
pub const JACCARD_JOIN_THRESHOLD: f64 = 0.3;

/// Published situations expire once window-end ages past this (ms).
pub const MAX_SITUATION_LIFETIME_MS: i64 = 5_400_000;

/// Published situations not regenerated for this long are retired (ms).
pub const QUIET_THRESHOLD_MS: i64 = 900_000;

// ============================================================================
// Scoring
// ============================================================================

/// Maximum lead-lag search horizon L (ms), non-negative lags only.
pub const MAX_LEAD_MS: i64 = 90_000;

/// Lead-lag histogram bin width (ms).
pub const LEAD_LAG_BIN_MS: i64 = 1_000;

/// BFS depth bound for graph proximity.
pub const GRAPH_MAX_DEPTH: usize = 4;

/// A deploy-key alert within this distance of window start counts as a
/// change event (ms).
pub const DEPLOY_PROXIMITY_MS: i64 = 600_000;

/// Composite score weights.
pub mod score_weights {
    pub const CHANGE: f64 = 0.35;
    pub const LEAD_LAG: f64 = 0.20;
    pub const PATH: f64 = 0.20;
    pub const CARDINALITY: f64 = 0.15;
    pub const SEVERITY: f64 = 0.15;
    pub const FLAP_PENALTY: f64 = 0.10;
    pub const ECHO_PENALTY: f64 = 0.05;
    /// Echo contribution per source beyond one per episode.
    pub const ECHO_PER_EXTRA_SOURCE: f64 = 0.05;
    /// Change-proximity floor when no deploy is near the window start.
    pub const CHANGE_FLOOR: f64 = 0.2;
}

/// Next-action rule thresholds.
pub mod action_thresholds {
    /// Entities beyond this page the oncall team.
    pub const ENTITY_FANOUT: usize = 5;
    /// Services beyond this point at shared infrastructure.
    pub const SERVICE_FANOUT: usize = 3;
    /// Normalised severity at or above this demands escalation.
    pub const ESCALATION_SEVERITY: f64 = 0.75;
}

// ============================================================================
// Queues
// ============================================================================

/// Bounded ingress queue capacity (alerts and raw events each).
pub const INGRESS_QUEUE_CAPACITY: usize = 8_192;

/// Bounded control queue capacity (config and graph updates).
pub const CONTROL_QUEUE_CAPACITY: usize = 32;
