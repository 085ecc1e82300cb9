//! Processing Pipeline Module
//!
//! ## Tick-Driven Stage Architecture
//!
//! ```text
//! STAGE 1: Threshold Engine   (raw cluster events -> synthesized alerts)
//! STAGE 2: Deduplicator       (TTL collapse, flap suppression, rate ceiling)
//! STAGE 3: Episode Clusterer  (gap-break bursts per entity|fingerprint)
//! STAGE 4: Situation Builder  (union-find joining) + Scorer (composite rank)
//! ```
//!
//! The driver drains the bounded ingress queues once per hop and owns all
//! stage state; the engine handle is the only surface embedders touch.
//!
//! # Usage
//!
//! ```ignore
//! use sitrep::{CorrelationEngine, PipelineConfig};
//!
//! let engine = CorrelationEngine::new(PipelineConfig::load())?;
//! engine.start();
//! ```

mod driver;
mod engine;
mod state;

pub use engine::{CorrelationEngine, IngestError, SubscriberFn};
pub use state::{SituationSnapshot, SituationStore};
