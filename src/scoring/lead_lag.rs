//! Lead-lag cross-correlation over binned alert timestamps.
//!
//! The cause's and effect's alert timestamps are folded into 1-second
//! bins; for every non-negative lag up to the search horizon the cosine
//! similarity between the cause histogram and the lag-shifted effect
//! histogram is computed. The best lag answers: "how far does the effect
//! trail the cause?"
//!
//! Only non-negative lags are searched, so an effect that precedes its
//! presumed cause scores zero unless binning coincidentally aligns them.

use std::collections::HashMap;

use crate::config::defaults::LEAD_LAG_BIN_MS;
use crate::types::Alert;

/// Best lag and similarity found for one cause/effect pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LeadLag {
    pub lag_ms: i64,
    pub similarity: f64,
}

/// Histogram of alert timestamps in 1-second bins.
fn bin(alerts: &[Alert]) -> HashMap<i64, f64> {
    let mut bins: HashMap<i64, f64> = HashMap::new();
    for alert in alerts {
        *bins.entry(alert.timestamp.div_euclid(LEAD_LAG_BIN_MS)).or_default() += 1.0;
    }
    bins
}

/// Find the non-negative lag in `[0, max_lead_ms]` maximising the cosine
/// similarity between the cause histogram and the shifted effect
/// histogram. Empty inputs yield `(0, 0.0)`. Ties keep the smallest lag.
pub fn best_lead_lag(cause: &[Alert], effect: &[Alert], max_lead_ms: i64) -> LeadLag {
    if cause.is_empty() || effect.is_empty() {
        return LeadLag::default();
    }

    let a = bin(cause);
    let b = bin(effect);

    let norm_a: f64 = a.values().map(|v| v * v).sum();
    let norm_b: f64 = b.values().map(|v| v * v).sum();
    let denom = (norm_a * norm_b).sqrt();
    if denom < 1e-12 {
        return LeadLag::default();
    }

    let max_lag = (max_lead_ms / LEAD_LAG_BIN_MS).max(0);
    let mut best = LeadLag::default();
    for lag in 0..=max_lag {
        // Shifted dot product: effect bin (s + lag) against cause bin s.
        let dot: f64 = a
            .iter()
            .filter_map(|(s, va)| b.get(&(s + lag)).map(|vb| va * vb))
            .sum();
        let similarity = dot / denom;
        if similarity > best.similarity {
            best = LeadLag {
                lag_ms: lag * LEAD_LAG_BIN_MS,
                similarity,
            };
        }
    }
    best
}
