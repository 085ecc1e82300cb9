//! Pipeline configuration — every operational knob as a tunable TOML value.
//!
//! Each field defaults to a named constant in [`super::defaults`], ensuring
//! zero-change behaviour when no config file is present. Updates at runtime
//! go through [`ConfigUpdate`] and are merged at tick boundaries only.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::threshold::{default_rules, ThresholdRule};
use crate::types::Severity;

/// Configuration loading / validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-severity weights used for episode severity upgrades and score
/// normalisation. The critical weight is the normalisation ceiling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeverityWeights {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            low: 1.0,
            medium: 2.0,
            high: 3.0,
            critical: 4.0,
        }
    }
}

impl SeverityWeights {
    pub fn weight_of(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }

    /// Severity normalised to `(0, 1]` against the critical weight.
    pub fn normalised(&self, severity: Severity) -> f64 {
        if self.critical <= 0.0 {
            return 0.0;
        }
        self.weight_of(severity) / self.critical
    }
}

/// Root configuration for the correlation pipeline.
///
/// Load with [`PipelineConfig::load`] which searches:
/// 1. `$SITREP_CONFIG` env var
/// 2. `./sitrep.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Episode retention window W (ms).
    pub window_ms: i64,
    /// Hop period H (ms) — the tick cadence.
    pub hop_ms: i64,
    /// Dedup TTL (ms).
    pub dedup_ttl_ms: i64,
    /// Dedup map GC horizon (ms).
    pub dedup_max_age_ms: i64,
    /// Episode gap G (ms).
    pub episode_gap_ms: i64,
    /// Lead-lag search horizon L (ms).
    pub max_lead_ms: i64,
    /// Published-situation hard lifetime (ms).
    pub max_situation_lifetime_ms: i64,
    /// Published-situation quiet retirement threshold (ms).
    pub quiet_threshold_ms: i64,
    /// Per-entity rate ceiling within the sliding minute.
    pub max_alerts_per_minute: usize,
    /// Status toggles beyond this drop the alert as a flap.
    pub flap_drop_threshold: u32,
    pub severity_weights: SeverityWeights,
    /// Threshold rules for raw cluster events.
    #[serde(rename = "rules")]
    pub threshold_rules: Vec<ThresholdRule>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_ms: defaults::WINDOW_MS,
            hop_ms: defaults::HOP_MS,
            dedup_ttl_ms: defaults::DEDUP_TTL_MS,
            dedup_max_age_ms: defaults::DEDUP_MAX_AGE_MS,
            episode_gap_ms: defaults::EPISODE_GAP_MS,
            max_lead_ms: defaults::MAX_LEAD_MS,
            max_situation_lifetime_ms: defaults::MAX_SITUATION_LIFETIME_MS,
            quiet_threshold_ms: defaults::QUIET_THRESHOLD_MS,
            max_alerts_per_minute: defaults::MAX_ALERTS_PER_MINUTE,
            flap_drop_threshold: defaults::FLAP_DROP_THRESHOLD,
            severity_weights: SeverityWeights::default(),
            threshold_rules: default_rules(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SITREP_CONFIG` environment variable
    /// 2. `./sitrep.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("SITREP_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded pipeline config from SITREP_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SITREP_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SITREP_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("sitrep.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded pipeline config from ./sitrep.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./sitrep.toml, using defaults");
                }
            }
        }

        info!("No sitrep.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&str, i64); 6] = [
            ("windowMs", self.window_ms),
            ("hopMs", self.hop_ms),
            ("episodeGapMs", self.episode_gap_ms),
            ("dedupTtlMs", self.dedup_ttl_ms),
            ("maxSituationLifetime", self.max_situation_lifetime_ms),
            ("quietThreshold", self.quiet_threshold_ms),
        ];
        for (name, value) in positive {
            if value <= 0 {
                return Err(ConfigError::Invalid(format!("{name} must be > 0, got {value}")));
            }
        }
        if self.max_lead_ms < 0 {
            return Err(ConfigError::Invalid(format!(
                "maxLeadMs must be >= 0, got {}",
                self.max_lead_ms
            )));
        }
        if self.max_alerts_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "maxAlertsPerMinute must be >= 1".to_string(),
            ));
        }
        if self.window_ms < self.hop_ms {
            return Err(ConfigError::Invalid(format!(
                "windowMs ({}) must be >= hopMs ({})",
                self.window_ms, self.hop_ms
            )));
        }
        for rule in &self.threshold_rules {
            if rule.threshold == 0 || rule.window_ms <= 0 || rule.cooldown_ms < 0 {
                return Err(ConfigError::Invalid(format!(
                    "rule '{}' has a non-positive threshold or window",
                    rule.name
                )));
            }
        }
        Ok(())
    }

    /// Merge a partial update, validating the result. On error the current
    /// config is left untouched.
    pub fn apply_update(&mut self, update: &ConfigUpdate) -> Result<(), ConfigError> {
        let mut candidate = self.clone();
        if let Some(v) = update.window_ms {
            candidate.window_ms = v;
        }
        if let Some(v) = update.hop_ms {
            candidate.hop_ms = v;
        }
        if let Some(v) = update.dedup_ttl_ms {
            candidate.dedup_ttl_ms = v;
        }
        if let Some(v) = update.episode_gap_ms {
            candidate.episode_gap_ms = v;
        }
        if let Some(v) = update.max_lead_ms {
            candidate.max_lead_ms = v;
        }
        if let Some(v) = update.max_situation_lifetime_ms {
            candidate.max_situation_lifetime_ms = v;
        }
        if let Some(v) = update.quiet_threshold_ms {
            candidate.quiet_threshold_ms = v;
        }
        if let Some(v) = update.max_alerts_per_minute {
            candidate.max_alerts_per_minute = v;
        }
        if let Some(v) = update.flap_drop_threshold {
            candidate.flap_drop_threshold = v;
        }
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}

/// The recognised subset of options accepted by `update_config`.
/// Unrecognised options never reach this struct; serde ignores them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigUpdate {
    pub window_ms: Option<i64>,
    pub hop_ms: Option<i64>,
    pub dedup_ttl_ms: Option<i64>,
    pub episode_gap_ms: Option<i64>,
    pub max_lead_ms: Option<i64>,
    #[serde(alias = "maxSituationLifetime")]
    pub max_situation_lifetime_ms: Option<i64>,
    #[serde(alias = "quietThreshold")]
    pub quiet_threshold_ms: Option<i64>,
    pub max_alerts_per_minute: Option<usize>,
    pub flap_drop_threshold: Option<u32>,
}
