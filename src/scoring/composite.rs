//! Composite causal-plausibility scoring.
//!
//! Combines lead-lag correlation, graph proximity, blast-radius
//! cardinality, severity, change proximity, and an echo penalty into one
//! score per situation, then attaches the primary cause and the suggested
//! next actions.

use tracing::debug;

use super::graph::UndirectedGraph;
use super::lead_lag::{best_lead_lag, LeadLag};
use crate::config::defaults::{
    action_thresholds, score_weights, DEPLOY_PROXIMITY_MS, GRAPH_MAX_DEPTH, MAX_NEXT_ACTIONS,
};
use crate::config::PipelineConfig;
use crate::types::{PrimaryCause, Situation};

/// Score one situation in place: composite score, primary cause, and
/// next actions.
pub fn score_situation(
    situation: &mut Situation,
    graph: &UndirectedGraph<'_>,
    config: &PipelineConfig,
) {
    // The earliest episode is the candidate cause; ties keep builder order.
    let cause_idx = situation
        .episodes
        .iter()
        .enumerate()
        .min_by_key(|(_, e)| e.start)
        .map_or(0, |(i, _)| i);
    let cause = &situation.episodes[cause_idx];

    // Lead-lag: strongest correlation of any effect trailing the cause.
    let mut best = LeadLag::default();
    for (i, effect) in situation.episodes.iter().enumerate() {
        if i == cause_idx {
            continue;
        }
        let candidate = best_lead_lag(&cause.alerts, &effect.alerts, config.max_lead_ms);
        if candidate.similarity > best.similarity {
            best = candidate;
        }
    }

    // Graph proximity: nearest effect entity by bounded undirected BFS.
    let min_distance = situation
        .episodes
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != cause_idx)
        .filter_map(|(_, e)| graph.distance(&cause.entity, &e.entity, GRAPH_MAX_DEPTH))
        .min();
    let path_score = min_distance.map_or(0.0, |d| 1.0 / (1.0 + d as f64));

    let cardinality = (1.0 + situation.blast_radius.entities as f64).ln();

    let severity = situation
        .episodes
        .iter()
        .map(|e| config.severity_weights.normalised(e.severity))
        .fold(0.0, f64::max);

    let change = if situation.related_alerts.iter().any(|a| {
        a.deploy_key.is_some() && (a.timestamp - situation.window.start).abs() <= DEPLOY_PROXIMITY_MS
    }) {
        1.0
    } else {
        score_weights::CHANGE_FLOOR
    };

    let total_sources: usize = situation.episodes.iter().map(|e| e.sources.len()).sum();
    let extra_sources = total_sources.saturating_sub(situation.episodes.len());
    let echo = extra_sources as f64 * score_weights::ECHO_PER_EXTRA_SOURCE;

    // Reserved: stays at zero until the host populates flap evidence.
    let flap = 0.0;

    let composite = score_weights::CHANGE * change
        + score_weights::LEAD_LAG * best.similarity
        + score_weights::PATH * path_score
        + score_weights::CARDINALITY * cardinality
        + score_weights::SEVERITY * severity
        - score_weights::FLAP_PENALTY * flap
        - score_weights::ECHO_PENALTY * echo;
    let score = composite.max(0.0);

    debug!(
        situation = %situation.id,
        score,
        lead_lag = best.similarity,
        lag_ms = best.lag_ms,
        path_score,
        change,
        echo,
        "Situation scored"
    );

    let cause_entity = cause.entity.clone();
    situation.score = score;
    situation.primary_cause = PrimaryCause {
        entity: cause_entity.clone(),
        episode_idx: cause_idx,
        confidence: score.min(1.0),
        lag_ms: best.lag_ms,
    };
    situation.next_actions = next_actions(situation, &cause_entity, severity);
}

/// Deterministic next-action rules, emitted in fixed order, capped at 5.
///
/// Entity-key substring matching is a provisional heuristic kept for
/// behavioural parity with the deployed ranker.
fn next_actions(situation: &Situation, cause_entity: &str, severity: f64) -> Vec<String> {
    let mut actions: Vec<String> = Vec::new();

    if situation.blast_radius.entities > action_thresholds::ENTITY_FANOUT {
        actions.push("Page oncall team - multiple services affected".to_string());
    }
    if situation.blast_radius.services > action_thresholds::SERVICE_FANOUT {
        actions.push("Check shared infrastructure components".to_string());
    }
    if cause_entity.contains("database") {
        actions.push("Check database connection pool and performance".to_string());
        actions.push("Verify database resource limits".to_string());
    }
    if cause_entity.contains("api") {
        actions.push("Check API rate limiting and quotas".to_string());
        actions.push("Verify upstream service health".to_string());
    }
    if cause_entity.contains("cache") {
        actions.push("Check cache hit rates and memory usage".to_string());
        actions.push("Verify cache cluster health".to_string());
    }
    if severity >= action_thresholds::ESCALATION_SEVERITY {
        actions.push("Immediate escalation required".to_string());
    }

    actions.truncate(MAX_NEXT_ACTIONS);
    actions
}
