//! Scorer — composite causal-plausibility ranking of situations.
//!
//! Three signals feed the composite: lead-lag cross-correlation of binned
//! alert timestamps, bounded-depth graph proximity over embedder hints,
//! and blast-radius cardinality; severity, change proximity, and the echo
//! penalty round it out.

mod composite;
mod graph;
mod lead_lag;

pub use composite::score_situation;
pub use graph::UndirectedGraph;
pub use lead_lag::{best_lead_lag, LeadLag};
