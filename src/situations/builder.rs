//! Situation Builder — transitive joining of live episodes.
//!
//! Two overlapping episodes join when they share an entity, share a
//! fingerprint, or their source mixes are similar enough. Union-find over
//! the pairwise predicate yields the situation groups; the scorer attaches
//! scores afterwards.

use std::collections::{BTreeSet, HashMap};

use super::union_find::UnionFind;
use crate::config::defaults::{JACCARD_JOIN_THRESHOLD, MAX_RELATED_ALERTS};
use crate::types::{Alert, BlastRadius, Episode, PrimaryCause, Situation, TimeWindow};

/// Pairwise joinability: time overlap is required, then any of same
/// entity, same fingerprint, or source-mix Jaccard above the threshold.
fn joinable(a: &Episode, b: &Episode) -> bool {
    if !a.overlaps(b) {
        return false;
    }
    a.entity == b.entity
        || a.fingerprint == b.fingerprint
        || a.source_jaccard(b) > JACCARD_JOIN_THRESHOLD
}

/// Build the complete situation set for a tick from the live episodes and
/// the alerts that passed through this tick.
///
/// Scores, primary causes, and next actions are placeholders here; the
/// scorer owns those fields.
pub fn build_situations(episodes: Vec<Episode>, tick_alerts: &[Alert]) -> Vec<Situation> {
    if episodes.is_empty() {
        return Vec::new();
    }

    let n = episodes.len();
    let mut uf = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if joinable(&episodes[i], &episodes[j]) {
                uf.union(i, j);
            }
        }
    }

    // Root -> member indices, in input (start-ascending) order.
    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = uf.find(i);
        groups.entry(root).or_default().push(i);
    }

    let mut situations: Vec<Situation> = groups
        .into_values()
        .map(|members| assemble(&episodes, members, tick_alerts))
        .collect();
    // Deterministic order for the scorer; final publication re-sorts by score.
    situations.sort_by_key(|s| (s.window.start, s.window.end));
    situations
}

/// Assemble one situation from a union-find equivalence class.
fn assemble(episodes: &[Episode], members: Vec<usize>, tick_alerts: &[Alert]) -> Situation {
    let group: Vec<Episode> = members.iter().map(|&i| episodes[i].clone()).collect();

    let start = group.iter().map(|e| e.start).min().unwrap_or(0);
    let end = group.iter().map(|e| e.end).max().unwrap_or(0);
    let window = TimeWindow { start, end };

    let entities: BTreeSet<&str> = group.iter().map(|e| e.entity.as_str()).collect();
    let services: BTreeSet<&str> = group
        .iter()
        .flat_map(|e| e.alerts.iter())
        .filter_map(|a| a.service.as_deref())
        .filter(|s| !s.is_empty())
        .collect();
    let blast_radius = BlastRadius {
        entities: entities.len(),
        services: services.len(),
    };

    let related_alerts = collect_related(&group, tick_alerts, window);

    let cause_entity = group.first().map_or_else(String::new, |e| e.entity.clone());

    Situation {
        id: Situation::derive_id(start, end, group.len()),
        window,
        episodes: group,
        related_alerts,
        blast_radius,
        score: 0.0,
        primary_cause: PrimaryCause {
            entity: cause_entity,
            episode_idx: 0,
            confidence: 0.0,
            lag_ms: 0,
        },
        next_actions: Vec::new(),
    }
}

/// Sample of alerts inside the situation window: member episodes' retained
/// alerts plus this tick's batch, deduplicated by id, earliest first,
/// capped at [`MAX_RELATED_ALERTS`].
fn collect_related(group: &[Episode], tick_alerts: &[Alert], window: TimeWindow) -> Vec<Alert> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut related: Vec<Alert> = Vec::new();

    let in_window =
        |a: &Alert| a.timestamp >= window.start && a.timestamp <= window.end;

    for alert in group
        .iter()
        .flat_map(|e| e.alerts.iter())
        .chain(tick_alerts.iter().filter(|a| in_window(a)))
    {
        if seen.insert(alert.id.as_str()) {
            related.push(alert.clone());
        }
    }

    related.sort_by_key(|a| a.timestamp);
    related.truncate(MAX_RELATED_ALERTS);
    related
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn episode(entity: &str, fingerprint: &str, sources: &[&str], start: i64, end: i64) -> Episode {
        let mut alerts = Vec::new();
        for (i, source) in sources.iter().enumerate() {
            alerts.push(Alert {
                id: format!("{entity}-{fingerprint}-{i}"),
                timestamp: start + i as i64,
                source: (*source).to_string(),
                fingerprint: fingerprint.to_string(),
                severity: Severity::Medium,
                entity_key: Some(entity.to_string()),
                ..Alert::default()
            });
        }
        Episode {
            entity: entity.to_string(),
            fingerprint: fingerprint.to_string(),
            sources: sources.iter().map(|s| (*s).to_string()).collect(),
            start,
            end,
            count: sources.len() as u64,
            alert_ids: alerts.iter().map(|a| a.id.clone()).collect(),
            alerts,
            severity: Severity::Medium,
        }
    }

    #[test]
    fn overlapping_episodes_join_by_entity() {
        let eps = vec![
            episode("svc-a", "fp-1", &["k8s"], 0, 100),
            episode("svc-a", "fp-2", &["datadog"], 50, 150),
        ];
        let situations = build_situations(eps, &[]);
        assert_eq!(situations.len(), 1);
        assert_eq!(situations[0].episodes.len(), 2);
        assert_eq!(situations[0].window, TimeWindow { start: 0, end: 150 });
    }

    #[test]
    fn join_by_source_mix_jaccard() {
        // {k8s, datadog} vs {datadog, logicmonitor}: Jaccard 1/3 > 0.3.
        let eps = vec![
            episode("svc-a|api", "fp-1", &["k8s", "datadog"], 0, 100),
            episode("svc-b|api", "fp-2", &["datadog", "logicmonitor"], 50, 150),
        ];
        let situations = build_situations(eps, &[]);
        assert_eq!(situations.len(), 1);
        assert_eq!(situations[0].blast_radius.entities, 2);
    }

    #[test]
    fn disjoint_in_time_never_join() {
        let eps = vec![
            episode("svc-a", "fp-1", &["k8s"], 0, 100),
            episode("svc-a", "fp-1", &["k8s"], 200, 300),
        ];
        let situations = build_situations(eps, &[]);
        assert_eq!(situations.len(), 2, "Same key but no time overlap");
    }

    #[test]
    fn weak_source_overlap_does_not_join() {
        // Jaccard 1/3 is required to EXCEED 0.3; exactly equal mixes of
        // unrelated entities join, but a 1-of-4 overlap (0.25) must not.
        let eps = vec![
            episode("svc-a", "fp-1", &["k8s", "datadog", "grafana"], 0, 100),
            episode("svc-b", "fp-2", &["datadog", "pingdom"], 50, 150),
        ];
        let situations = build_situations(eps, &[]);
        assert_eq!(situations.len(), 2);
    }

    #[test]
    fn transitive_joins_collapse_into_one_group() {
        // a joins b (entity), b joins c (fingerprint) -> one situation.
        let eps = vec![
            episode("svc-a", "fp-1", &["k8s"], 0, 100),
            episode("svc-a", "fp-2", &["datadog"], 50, 150),
            episode("svc-c", "fp-2", &["pingdom"], 100, 200),
        ];
        let situations = build_situations(eps, &[]);
        assert_eq!(situations.len(), 1);
        assert_eq!(situations[0].episodes.len(), 3);
    }

    #[test]
    fn every_episode_lands_in_exactly_one_situation() {
        let eps = vec![
            episode("svc-a", "fp-1", &["k8s"], 0, 100),
            episode("svc-b", "fp-2", &["datadog"], 10, 90),
            episode("svc-c", "fp-3", &["pingdom"], 500, 600),
        ];
        let total_eps = eps.len();
        let situations = build_situations(eps, &[]);
        let placed: usize = situations.iter().map(|s| s.episodes.len()).sum();
        assert_eq!(placed, total_eps);
    }

    #[test]
    fn window_contains_all_member_episodes() {
        let eps = vec![
            episode("svc-a", "fp-1", &["k8s"], 10, 100),
            episode("svc-a", "fp-2", &["datadog"], 40, 250),
        ];
        let situations = build_situations(eps, &[]);
        let s = &situations[0];
        for e in &s.episodes {
            assert!(s.window.start <= e.start && e.end <= s.window.end);
        }
    }

    #[test]
    fn related_alerts_deduped_sorted_and_capped() {
        let eps = vec![episode("svc-a", "fp-1", &["k8s", "datadog"], 0, 100)];
        // Tick batch repeats a retained alert and adds one out-of-window.
        let mut repeat = eps[0].alerts[0].clone();
        repeat.timestamp = 1;
        let mut outside = eps[0].alerts[0].clone();
        outside.id = "elsewhere".into();
        outside.timestamp = 10_000;

        let situations = build_situations(eps, &[repeat, outside]);
        let related = &situations[0].related_alerts;
        assert_eq!(related.len(), 2, "Duplicate id collapsed, outsider excluded");
        assert!(related.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
