//! Declarative threshold rules.
//!
//! Rules are plain data: a match predicate over raw-event fields, an
//! ordered key specifier producing the grouping key, and the
//! threshold/window/cooldown triple governing when a burst folds into a
//! synthesized alert. Embedders can replace the built-in set via the
//! `[[rules]]` tables of the config file.

use serde::{Deserialize, Serialize};

use crate::types::{RawEvent, Severity};

/// One field predicate inside a rule's match specification.
///
/// Exactly one of `equals` / `contains` is normally set. `equals` performs
/// exact comparison; `contains` performs substring match (intended for
/// `message`). A matcher with neither set matches any event that has the
/// field at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMatcher {
    /// Field selector, e.g. `reason`, `involved_object.kind`, `message`.
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
}

impl FieldMatcher {
    /// Whether this predicate holds for the event.
    pub fn matches(&self, event: &RawEvent) -> bool {
        let Some(value) = event.field(&self.field) else {
            return false;
        };
        match (&self.equals, &self.contains) {
            (Some(expected), _) => value == expected,
            (None, Some(needle)) => value.contains(needle.as_str()),
            (None, None) => true,
        }
    }
}

/// A declarative burst-folding rule for raw cluster events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdRule {
    pub name: String,
    /// Ordered field selectors whose values form the composite grouping key.
    pub key: Vec<String>,
    /// All matchers must hold for an event to count toward the rule.
    #[serde(rename = "match")]
    pub matchers: Vec<FieldMatcher>,
    /// Matching events within the window needed before an alert fires.
    pub threshold: usize,
    pub severity: Severity,
    /// Sliding window the event sequence is pruned to (ms).
    pub window_ms: i64,
    /// Silent period after an emission for the same `(rule, key)` (ms).
    pub cooldown_ms: i64,
}

impl ThresholdRule {
    /// Whether every matcher holds for the event.
    pub fn matches(&self, event: &RawEvent) -> bool {
        self.matchers.iter().all(|m| m.matches(event))
    }

    /// Composite grouping key: the ordered selector values joined with `/`.
    /// Selectors the event cannot resolve contribute an empty segment.
    pub fn key_for(&self, event: &RawEvent) -> String {
        self.key
            .iter()
            .map(|selector| event.field(selector).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// The rule set a cluster-events deployment starts from.
pub fn default_rules() -> Vec<ThresholdRule> {
    let reason_rule = |name: &str,
                       reason: &str,
                       threshold: usize,
                       severity: Severity,
                       window_ms: i64,
                       cooldown_ms: i64| ThresholdRule {
        name: name.to_string(),
        key: vec![
            "namespace".to_string(),
            "involved_object.name".to_string(),
        ],
        matchers: vec![FieldMatcher {
            field: "reason".to_string(),
            equals: Some(reason.to_string()),
            contains: None,
        }],
        threshold,
        severity,
        window_ms,
        cooldown_ms,
    };

    vec![
        reason_rule("crash-loop", "CrashLoopBackOff", 3, Severity::High, 300_000, 600_000),
        reason_rule("oom-killed", "OOMKilled", 2, Severity::High, 300_000, 600_000),
        reason_rule("image-pull", "ImagePullBackOff", 3, Severity::Medium, 600_000, 900_000),
        reason_rule("failed-scheduling", "FailedScheduling", 5, Severity::Medium, 300_000, 600_000),
        // Node readiness flaps once per cooldown epoch.
        reason_rule("node-not-ready", "NodeNotReady", 1, Severity::Critical, 300_000, 300_000),
        ThresholdRule {
            name: "probe-failure".to_string(),
            key: vec![
                "namespace".to_string(),
                "involved_object.name".to_string(),
            ],
            matchers: vec![
                FieldMatcher {
                    field: "reason".to_string(),
                    equals: Some("Unhealthy".to_string()),
                    contains: None,
                },
                FieldMatcher {
                    field: "message".to_string(),
                    equals: None,
                    contains: Some("Liveness probe failed".to_string()),
                },
            ],
            threshold: 3,
            severity: Severity::High,
            window_ms: 180_000,
            cooldown_ms: 600_000,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InvolvedObject;
    use std::collections::HashMap;

    fn event(reason: &str, message: &str) -> RawEvent {
        RawEvent {
            timestamp: 1_000,
            reason: reason.into(),
            event_type: "Warning".into(),
            message: message.into(),
            involved_object: InvolvedObject {
                kind: "Pod".into(),
                name: "checkout-7d9f".into(),
            },
            namespace: "prod".into(),
            labels: HashMap::new(),
        }
    }

    #[test]
    fn equality_matcher() {
        let m = FieldMatcher {
            field: "reason".into(),
            equals: Some("OOMKilled".into()),
            contains: None,
        };
        assert!(m.matches(&event("OOMKilled", "")));
        assert!(!m.matches(&event("CrashLoopBackOff", "")));
    }

    #[test]
    fn nested_field_matcher() {
        let m = FieldMatcher {
            field: "involved_object.kind".into(),
            equals: Some("Pod".into()),
            contains: None,
        };
        assert!(m.matches(&event("X", "")));
    }

    #[test]
    fn substring_matcher_on_message() {
        let m = FieldMatcher {
            field: "message".into(),
            equals: None,
            contains: Some("probe failed".into()),
        };
        assert!(m.matches(&event("Unhealthy", "Liveness probe failed: timeout")));
        assert!(!m.matches(&event("Unhealthy", "Readiness check passed")));
    }

    #[test]
    fn composite_key_joins_selector_values() {
        let rule = &default_rules()[0];
        assert_eq!(rule.key_for(&event("CrashLoopBackOff", "")), "prod/checkout-7d9f");
    }

    #[test]
    fn all_matchers_must_hold() {
        let rules = default_rules();
        let probe = rules
            .iter()
            .find(|r| r.name == "probe-failure")
            .unwrap();
        assert!(probe.matches(&event("Unhealthy", "Liveness probe failed: timeout")));
        assert!(!probe.matches(&event("Unhealthy", "something else")));
        assert!(!probe.matches(&event("BackOff", "Liveness probe failed")));
    }
}
