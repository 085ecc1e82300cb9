//! Sitrep: Streaming Alert Correlation
//!
//! Tick-driven pipeline that collapses raw monitoring noise into a small,
//! ranked set of incident-level situations.
//!
//! ## Architecture
//!
//! - **Threshold Engine**: folds raw cluster-event bursts into alerts
//! - **Deduplicator**: TTL repeat collapsing, flap suppression, rate ceiling
//! - **Episode Clusterer**: gap-separated bursts per `(entity, fingerprint)`
//! - **Situation Builder**: union-find joining of overlapping episodes
//! - **Scorer**: lead-lag + graph-path + blast-radius composite ranking

pub mod config;
pub mod types;
pub mod threshold;
pub mod dedup;
pub mod episodes;
pub mod situations;
pub mod scoring;
pub mod pipeline;
pub mod telemetry;

// Re-export the embedding surface
pub use config::{ConfigError, ConfigUpdate, PipelineConfig, SeverityWeights};
pub use pipeline::{CorrelationEngine, IngestError, SituationSnapshot};

// Re-export commonly used types
pub use types::{
    Alert, AlertStatus, BlastRadius, Episode, GraphHints, PrimaryCause, RawEvent,
    Severity, Situation, TickMetrics, TimeWindow,
};

// Re-export the threshold rule model for embedders shipping custom rules
pub use threshold::{FieldMatcher, ThresholdRule};
