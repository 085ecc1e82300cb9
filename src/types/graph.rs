//! Topology hints supplied by the embedder.
//!
//! The pipeline treats the graph as read-only; the embedder may replace it
//! atomically between ticks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entity adjacency plus optional per-entity metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphHints {
    /// entity -> neighbour entities. Interpreted as undirected by the
    /// scorer regardless of which side declares the edge.
    #[serde(default)]
    pub adjacency: HashMap<String, Vec<String>>,
    /// Optional free-form metadata per entity.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, HashMap<String, String>>,
}

impl GraphHints {
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}
