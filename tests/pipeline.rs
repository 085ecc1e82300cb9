//! End-to-end pipeline tests through the public engine surface.
//!
//! Each test runs a real driver task on a fast hop and anchors alert
//! timestamps near the wall clock so window eviction behaves as in
//! production.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{sleep, Duration};

use sitrep::{
    Alert, AlertStatus, ConfigUpdate, CorrelationEngine, GraphHints, IngestError,
    PipelineConfig, RawEvent, Severity,
};

fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.hop_ms = 50;
    // Retire superseded intermediate situations quickly so the asserted
    // end state is exactly the steady-state publication.
    config.quiet_threshold_ms = 200;
    config
}

fn alert(id: &str, ts: i64, fingerprint: &str, entity: &str, source: &str) -> Alert {
    Alert {
        id: id.into(),
        timestamp: ts,
        source: source.into(),
        fingerprint: fingerprint.into(),
        status: AlertStatus::Firing,
        severity: Severity::Medium,
        entity_key: Some(entity.into()),
        ..Alert::default()
    }
}

/// Poll until the condition holds or a few seconds elapse.
async fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for: {what}");
}

/// Let in-flight drains finish and superseded situations retire, so the
/// publication under assertion is the steady state.
async fn settle() {
    sleep(Duration::from_millis(600)).await;
}

#[tokio::test]
async fn single_duplicate_collapses_to_one_member() {
    let engine = CorrelationEngine::new(fast_config()).unwrap();
    engine.start();

    let t = Utc::now().timestamp_millis() - 60_000;
    engine.ingest(alert("a1", t, "fp-1", "svc-a", "datadog")).unwrap();
    engine
        .ingest(alert("a2", t + 30_000, "fp-1", "svc-a", "datadog"))
        .unwrap();

    wait_for("one situation", || !engine.current_situations().is_empty()).await;
    settle().await;
    let situations = engine.current_situations();
    assert_eq!(situations.len(), 1);
    assert_eq!(situations[0].episodes.len(), 1);
    assert_eq!(
        situations[0].episodes[0].count, 1,
        "Duplicate within TTL never reaches the clusterer"
    );

    engine.stop().await;
}

#[tokio::test]
async fn flap_drop_suppresses_fourth_toggle() {
    let engine = CorrelationEngine::new(fast_config()).unwrap();
    engine.start();

    let t = Utc::now().timestamp_millis() - 60_000;
    let statuses = [
        AlertStatus::Firing,
        AlertStatus::Resolved,
        AlertStatus::Firing,
        AlertStatus::Resolved,
    ];
    for (i, status) in statuses.into_iter().enumerate() {
        let mut a = alert(&format!("a{i}"), t + i as i64 * 1_000, "fp-1", "svc-a", "datadog");
        a.status = status;
        engine.ingest(a).unwrap();
    }

    wait_for("one situation", || !engine.current_situations().is_empty()).await;
    settle().await;
    let situations = engine.current_situations();
    assert_eq!(situations[0].episodes[0].count, 3, "Fourth toggle dropped as flap");

    engine.stop().await;
}

#[tokio::test]
async fn episode_gap_break_splits_bursts() {
    let mut config = fast_config();
    config.dedup_ttl_ms = 500;
    config.episode_gap_ms = 120_000;
    let engine = CorrelationEngine::new(config).unwrap();
    engine.start();

    let t = Utc::now().timestamp_millis() - 400_000;
    for (id, ts) in [("a1", t), ("a2", t + 60_000), ("a3", t + 300_000)] {
        engine.ingest(alert(id, ts, "fp-1", "svc-a", "datadog")).unwrap();
    }

    wait_for("two situations", || engine.current_situations().len() == 2).await;
    let situations = engine.current_situations();
    let mut episodes: Vec<_> = situations.iter().flat_map(|s| s.episodes.iter()).collect();
    episodes.sort_by_key(|e| e.start);

    assert_eq!(episodes.len(), 2);
    assert_eq!((episodes[0].start, episodes[0].end), (t, t + 60_000));
    assert_eq!(episodes[0].count, 2);
    assert_eq!((episodes[1].start, episodes[1].end), (t + 300_000, t + 300_000));
    assert_eq!(episodes[1].count, 1);

    engine.stop().await;
}

#[tokio::test]
async fn situations_join_on_source_mix_jaccard() {
    let mut config = fast_config();
    config.dedup_ttl_ms = 500;
    let engine = CorrelationEngine::new(config).unwrap();
    engine.start();

    let t = Utc::now().timestamp_millis() - 60_000;
    // Episode one at svc-a|api: sources {k8s, datadog}.
    engine.ingest(alert("a1", t, "fp-a", "svc-a|api", "k8s")).unwrap();
    engine.ingest(alert("a2", t + 2_000, "fp-a", "svc-a|api", "datadog")).unwrap();
    // Episode two at svc-b|api: sources {datadog, logicmonitor}, overlapping.
    engine.ingest(alert("b1", t + 1_000, "fp-b", "svc-b|api", "datadog")).unwrap();
    engine.ingest(alert("b2", t + 3_000, "fp-b", "svc-b|api", "logicmonitor")).unwrap();

    wait_for("joined situation", || {
        let s = engine.current_situations();
        s.len() == 1 && s[0].episodes.len() == 2
    })
    .await;

    let situations = engine.current_situations();
    assert_eq!(situations[0].blast_radius.entities, 2);

    engine.stop().await;
}

#[tokio::test]
async fn lead_lag_estimates_effect_offset() {
    let mut config = fast_config();
    config.dedup_ttl_ms = 100;
    let engine = CorrelationEngine::new(config).unwrap();
    engine.start();

    let t = Utc::now().timestamp_millis() - 120_000;
    // Cause at entity a: alerts each second from 0 to 5.
    for i in 0..=5 {
        engine
            .ingest(alert(&format!("a{i}"), t + i * 1_000, "fp-a", "a", "k8s"))
            .unwrap();
    }
    // Effect at entity c: the same shape five seconds later, touching the
    // cause window so the episodes join.
    for i in 5..=10 {
        engine
            .ingest(alert(&format!("c{i}"), t + i * 1_000, "fp-c", "c", "k8s"))
            .unwrap();
    }

    wait_for("joined situation", || {
        let s = engine.current_situations();
        s.len() == 1 && s[0].episodes.len() == 2
    })
    .await;

    let situations = engine.current_situations();
    let cause = &situations[0].primary_cause;
    assert_eq!(cause.entity, "a");
    assert_eq!(cause.lag_ms, 5_000);

    engine.stop().await;
}

#[tokio::test]
async fn graph_proximity_shapes_composite_score() {
    let mut config = fast_config();
    config.dedup_ttl_ms = 500;
    // The cause's two alerts are 200 s apart; keep them in one episode.
    config.episode_gap_ms = 300_000;
    let engine = CorrelationEngine::new(config).unwrap();
    engine.update_graph_hints(GraphHints {
        adjacency: [
            ("a".to_string(), vec!["b".to_string()]),
            ("b".to_string(), vec!["c".to_string()]),
        ]
        .into_iter()
        .collect(),
        ..GraphHints::default()
    });
    engine.start();

    let t = Utc::now().timestamp_millis() - 400_000;
    // Cause entity a spans the window; effect entity c sits 100 s in —
    // beyond the lead-lag horizon, so that term is zero.
    engine.ingest(alert("a1", t, "fp-a", "a", "k8s")).unwrap();
    engine.ingest(alert("a2", t + 200_000, "fp-a", "a", "k8s")).unwrap();
    engine.ingest(alert("c1", t + 100_000, "fp-c", "c", "k8s")).unwrap();

    wait_for("joined situation", || {
        let s = engine.current_situations();
        s.len() == 1 && s[0].episodes.len() == 2
    })
    .await;

    let situations = engine.current_situations();
    let expected = 0.35 * 0.2 + 0.2 * (1.0 / 3.0) + 0.15 * 3.0_f64.ln() + 0.15 * 0.5;
    assert!(
        (situations[0].score - expected).abs() < 0.01,
        "score {} vs expected {expected}",
        situations[0].score
    );
    assert!(situations[0].next_actions.is_empty());

    engine.stop().await;
}

#[tokio::test]
async fn threshold_engine_feeds_the_pipeline() {
    let engine = CorrelationEngine::new(fast_config()).unwrap();
    engine.start();

    let t = Utc::now().timestamp_millis() - 30_000;
    for i in 0..3 {
        engine
            .ingest_raw_event(RawEvent {
                timestamp: t + i * 1_000,
                reason: "CrashLoopBackOff".into(),
                event_type: "Warning".into(),
                message: "Back-off restarting failed container".into(),
                involved_object: sitrep::types::InvolvedObject {
                    kind: "Pod".into(),
                    name: "checkout-7d9f".into(),
                },
                namespace: "prod".into(),
                labels: Default::default(),
            })
            .unwrap();
    }

    wait_for("synthesized situation", || !engine.current_situations().is_empty()).await;
    let situations = engine.current_situations();
    let episode = &situations[0].episodes[0];
    assert_eq!(episode.fingerprint, "crash-loop|prod/checkout-7d9f");
    assert_eq!(episode.severity, Severity::High);
    assert!(episode.sources.contains("k8s"));

    engine.stop().await;
}

#[tokio::test]
async fn published_set_honours_invariants_under_load() {
    let mut config = fast_config();
    config.dedup_ttl_ms = 100;
    let engine = CorrelationEngine::new(config).unwrap();
    engine.start();

    let t = Utc::now().timestamp_millis() - 300_000;
    // A spread of entities, fingerprints, and sources over five minutes.
    let sources = ["k8s", "datadog", "logicmonitor", "pingdom"];
    for i in 0..400_i64 {
        let mut a = alert(
            &format!("load-{i}"),
            t + i * 700,
            &format!("fp-{}", i % 7),
            &format!("svc-{}", i % 5),
            sources[(i % 4) as usize],
        );
        a.severity = match i % 4 {
            0 => Severity::Low,
            1 => Severity::Medium,
            2 => Severity::High,
            _ => Severity::Critical,
        };
        a.service = Some(format!("service-{}", i % 3));
        engine.ingest(a).unwrap();
    }

    wait_for("situations published", || !engine.current_situations().is_empty()).await;
    settle().await;
    let situations = engine.current_situations();

    // Score bounds and ordering.
    for pair in situations.windows(2) {
        assert!(pair[0].score >= pair[1].score, "Non-increasing score order");
    }
    let mut seen_episode_keys: HashSet<String> = HashSet::new();
    for s in &situations {
        assert!(s.score >= 0.0);
        assert!((0.0..=1.0).contains(&s.primary_cause.confidence));
        assert!(!s.episodes.is_empty());
        assert!(s.related_alerts.len() <= 200);
        assert!(s.next_actions.len() <= 5);
        for e in &s.episodes {
            assert!(e.start <= e.end);
            assert!(e.count >= 1);
            assert!(e.alerts.len() <= 50);
            assert!(s.window.start <= e.start && e.end <= s.window.end);
            // No episode appears in two situations.
            assert!(
                seen_episode_keys.insert(format!("{}|{}|{}", e.entity, e.fingerprint, e.start)),
                "Episode appears in exactly one situation"
            );
        }
        // Consecutive retained alerts inside an episode respect the gap rule.
        for e in &s.episodes {
            let mut ts: Vec<i64> = e.alerts.iter().map(|a| a.timestamp).collect();
            ts.sort_unstable();
            for w in ts.windows(2) {
                assert!(w[1] - w[0] <= PipelineConfig::default().episode_gap_ms);
            }
        }
    }

    let metrics = engine.latest_metrics();
    assert_eq!(metrics.situation_count, situations.len());
    assert!(metrics.episode_count >= situations.iter().map(|s| s.episodes.len()).sum::<usize>());
    assert!(metrics.throughput_alerts_per_sec >= 0.0);

    engine.stop().await;
}

#[tokio::test]
async fn subscribers_receive_each_tick() {
    let engine = CorrelationEngine::new(fast_config()).unwrap();
    let ticks = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&ticks);
    engine.subscribe(move |_situations, metrics| {
        seen.store(metrics.tick_index, Ordering::SeqCst);
    });
    engine.start();

    wait_for("three ticks", || ticks.load(Ordering::SeqCst) >= 3).await;
    engine.stop().await;
}

#[tokio::test]
async fn lifecycle_start_stop_restart() {
    sitrep::telemetry::init();
    let engine = CorrelationEngine::new(fast_config()).unwrap();
    engine.start();
    let t = Utc::now().timestamp_millis() - 10_000;
    engine.ingest(alert("a1", t, "fp-1", "svc-a", "datadog")).unwrap();
    engine.stop().await;

    // Stopped engines reject ingest.
    let err = engine.ingest(alert("a2", t, "fp-1", "svc-a", "datadog")).unwrap_err();
    assert!(matches!(err, IngestError::Stopped));

    // Restart runs with fresh state and an empty publication.
    engine.start();
    assert!(engine.current_situations().is_empty());
    engine.ingest(alert("a3", t, "fp-1", "svc-a", "datadog")).unwrap();
    wait_for("situation after restart", || !engine.current_situations().is_empty()).await;
    engine.stop().await;
}

#[tokio::test]
async fn config_updates_apply_at_tick_boundaries() {
    let engine = CorrelationEngine::new(fast_config()).unwrap();
    engine.start();

    // Narrow the gap so a 60 s spacing splits episodes.
    engine
        .update_config(ConfigUpdate {
            episode_gap_ms: Some(30_000),
            dedup_ttl_ms: Some(500),
            ..ConfigUpdate::default()
        })
        .unwrap();
    // Give the driver a tick boundary to absorb the update.
    sleep(Duration::from_millis(200)).await;

    let t = Utc::now().timestamp_millis() - 120_000;
    engine.ingest(alert("a1", t, "fp-1", "svc-a", "datadog")).unwrap();
    engine.ingest(alert("a2", t + 60_000, "fp-1", "svc-a", "datadog")).unwrap();

    wait_for("gap break under new config", || {
        engine
            .current_situations()
            .iter()
            .flat_map(|s| s.episodes.iter())
            .count()
            == 2
    })
    .await;

    engine.stop().await;
}

#[tokio::test]
async fn malformed_alerts_counted_not_fatal() {
    let engine = CorrelationEngine::new(fast_config()).unwrap();
    engine.start();

    engine.ingest(Alert::default()).unwrap(); // timestamp 0: malformed
    let t = Utc::now().timestamp_millis() - 10_000;
    engine.ingest(alert("ok", t, "fp-1", "svc-a", "datadog")).unwrap();

    wait_for("valid alert still processed", || !engine.current_situations().is_empty()).await;
    assert!(engine.latest_metrics().dropped_malformed >= 1);

    engine.stop().await;
}
