//! Raw cluster event — transient input to the threshold engine.
//!
//! Raw events exist only inside a single tick; the threshold engine folds
//! matching bursts into synthesized alerts and the events themselves are
//! never retained.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The object a cluster event refers to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvolvedObject {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

/// A raw cluster event as delivered by the ingest transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Epoch-ms timestamp. Zero or negative means malformed.
    #[serde(default)]
    pub timestamp: i64,
    /// Event reason, e.g. "CrashLoopBackOff", "OOMKilled".
    #[serde(default)]
    pub reason: String,
    /// Event type, e.g. "Warning", "Normal".
    #[serde(default, rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub involved_object: InvolvedObject,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

impl RawEvent {
    /// Resolve a field selector against this event.
    ///
    /// Supported selectors: `reason`, `type`, `message`, `namespace`,
    /// `involved_object.kind`, `involved_object.name`, and `labels.<key>`.
    /// Unknown selectors resolve to `None`.
    pub fn field(&self, selector: &str) -> Option<&str> {
        match selector {
            "reason" => Some(self.reason.as_str()),
            "type" => Some(self.event_type.as_str()),
            "message" => Some(self.message.as_str()),
            "namespace" => Some(self.namespace.as_str()),
            "involved_object.kind" => Some(self.involved_object.kind.as_str()),
            "involved_object.name" => Some(self.involved_object.name.as_str()),
            other => other
                .strip_prefix("labels.")
                .and_then(|key| self.labels.get(key))
                .map(String::as_str),
        }
    }

    /// An event is usable when it carries a positive timestamp and a reason.
    pub fn is_well_formed(&self) -> bool {
        self.timestamp > 0 && !self.reason.is_empty()
    }
}
