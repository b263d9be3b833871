// Configuration Storage Service
// Scoring configuration, oracle endpoints, and config file read/write with version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::services::detection::sensitivity::ThresholdPolicy;

const WEIGHT_TOLERANCE: f64 = 1e-6;
const BACKUPS_TO_KEEP: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("oracle '{name}' failed to initialize: {reason}")]
    OracleInit { name: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default = "default_classifiers")]
    pub classifiers: Vec<ClassifierOracleConfig>,
    #[serde(default)]
    pub perplexity: Option<PerplexityOracleConfig>,
    #[serde(default)]
    pub audit: Option<AuditConfig>,
    #[serde(default)]
    pub startup: StartupConfig,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            detection: DetectionConfig::default(),
            classifiers: default_classifiers(),
            perplexity: Some(PerplexityOracleConfig {
                url: "http://127.0.0.1:8081/perplexity".to_string(),
                model: Some("gpt2".to_string()),
            }),
            audit: None,
            startup: StartupConfig::default(),
            api_keys: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub positional: PositionalWeights,
    #[serde(default)]
    pub stylometry: StylometryConfig,
    #[serde(default)]
    pub thresholds: ThresholdPolicy,
    #[serde(default)]
    pub oracle_calls: OracleCallConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            overlap: default_overlap(),
        }
    }
}

/// Linear positional decay across the chunk sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionalWeights {
    #[serde(default = "default_first_weight")]
    pub first_weight: f64,
    #[serde(default = "default_last_weight")]
    pub last_weight: f64,
}

impl Default for PositionalWeights {
    fn default() -> Self {
        Self {
            first_weight: default_first_weight(),
            last_weight: default_last_weight(),
        }
    }
}

/// Which way stylometric evidence moves the blended probability.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylometricDirection {
    /// High perplexity and bursty sentences read as human: subtract the delta.
    #[default]
    Decrease,
    /// Add the delta instead.
    Increase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylometryConfig {
    #[serde(default)]
    pub direction: StylometricDirection,
    #[serde(default = "default_perplexity_weight")]
    pub perplexity_weight: f64,
    /// Perplexity at which the perplexity term is zero.
    #[serde(default = "default_perplexity_pivot")]
    pub perplexity_pivot: f64,
    #[serde(default = "default_burstiness_weight")]
    pub burstiness_weight: f64,
    #[serde(default = "default_burstiness_cap")]
    pub burstiness_cap: f64,
    #[serde(default = "default_max_adjustment")]
    pub max_adjustment: f64,
    /// Substituted when the perplexity oracle fails.
    #[serde(default = "default_fallback_perplexity")]
    pub fallback_perplexity: f64,
}

impl Default for StylometryConfig {
    fn default() -> Self {
        Self {
            direction: StylometricDirection::default(),
            perplexity_weight: default_perplexity_weight(),
            perplexity_pivot: default_perplexity_pivot(),
            burstiness_weight: default_burstiness_weight(),
            burstiness_cap: default_burstiness_cap(),
            max_adjustment: default_max_adjustment(),
            fallback_perplexity: default_fallback_perplexity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleCallConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Initial attempt plus retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for OracleCallConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierOracleConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Share of this classifier in the per-chunk blend.
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerplexityOracleConfig {
    pub url: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupConfig {
    /// Call every oracle once before serving; any failure aborts startup.
    #[serde(default)]
    pub probe_oracles: bool,
}

fn default_version() -> String { "1.0.0".to_string() }
fn default_window_size() -> usize { 300 }
fn default_overlap() -> usize { 60 }
fn default_first_weight() -> f64 { 1.0 }
fn default_last_weight() -> f64 { 0.7 }
fn default_perplexity_weight() -> f64 { 0.2 }
fn default_perplexity_pivot() -> f64 { 100.0 }
fn default_burstiness_weight() -> f64 { 0.1 }
fn default_burstiness_cap() -> f64 { 1.0 }
fn default_max_adjustment() -> f64 { 0.25 }
fn default_fallback_perplexity() -> f64 { 100.0 }
fn default_timeout_ms() -> u64 { 30_000 }
fn default_max_attempts() -> usize { 1 }
fn default_backoff_ms() -> u64 { 400 }
fn default_max_concurrency() -> usize { 4 }

fn default_classifiers() -> Vec<ClassifierOracleConfig> {
    vec![
        ClassifierOracleConfig {
            name: "primary".to_string(),
            url: "http://127.0.0.1:8081/classify/roberta-base-openai-detector".to_string(),
            model: Some("openai-community/roberta-base-openai-detector".to_string()),
            weight: 0.5,
        },
        ClassifierOracleConfig {
            name: "secondary".to_string(),
            url: "http://127.0.0.1:8081/classify/ai-text-detector".to_string(),
            model: Some("desklib/ai-text-detector-v1.01".to_string()),
            weight: 0.5,
        },
    ]
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{} must lie in [0, 1], got {}", name, value)));
    }
    Ok(())
}

/// Ensemble weights: at least one, each finite and non-negative, summing to 1.
pub fn validate_ensemble_weights(weights: &[f64]) -> Result<(), ConfigError> {
    if weights.is_empty() {
        return Err(invalid("at least one classifier oracle is required"));
    }
    for (i, w) in weights.iter().enumerate() {
        if !w.is_finite() || *w < 0.0 {
            return Err(invalid(format!("classifier #{} has invalid weight {}", i, w)));
        }
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(invalid(format!("classifier weights must sum to 1, got {}", total)));
    }
    Ok(())
}

impl AppConfig {
    /// Check every invariant the scoring pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;

        for c in &self.classifiers {
            if c.name.trim().is_empty() {
                return Err(invalid("classifier name must not be empty"));
            }
        }
        let weights: Vec<f64> = self.classifiers.iter().map(|c| c.weight).collect();
        validate_ensemble_weights(&weights)?;
        for (i, c) in self.classifiers.iter().enumerate() {
            if self.classifiers[i + 1..].iter().any(|o| o.name == c.name) {
                return Err(invalid(format!("duplicate classifier name '{}'", c.name)));
            }
        }

        Ok(())
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;
        if chunking.window_size == 0 {
            return Err(invalid("chunking.windowSize must be positive"));
        }
        if chunking.overlap >= chunking.window_size {
            return Err(invalid("chunking.overlap must be smaller than chunking.windowSize"));
        }

        let positional = &self.positional;
        for (name, w) in [("firstWeight", positional.first_weight), ("lastWeight", positional.last_weight)] {
            if !w.is_finite() || w <= 0.0 {
                return Err(invalid(format!("positional.{} must be positive", name)));
            }
        }

        let s = &self.stylometry;
        for (name, v) in [
            ("perplexityWeight", s.perplexity_weight),
            ("burstinessWeight", s.burstiness_weight),
            ("burstinessCap", s.burstiness_cap),
            ("maxAdjustment", s.max_adjustment),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(format!("stylometry.{} must be non-negative", name)));
            }
        }
        if !s.perplexity_pivot.is_finite() || s.perplexity_pivot <= 0.0 {
            return Err(invalid("stylometry.perplexityPivot must be positive"));
        }
        if !s.fallback_perplexity.is_finite() || s.fallback_perplexity <= 0.0 {
            return Err(invalid("stylometry.fallbackPerplexity must be positive"));
        }
        check_unit("stylometry.maxAdjustment", s.max_adjustment)?;

        match &self.thresholds {
            ThresholdPolicy::ThreeWay(p) => {
                check_unit("thresholds.aiThreshold", p.ai_threshold)?;
                check_unit("thresholds.humanThreshold", p.human_threshold)?;
                check_unit("thresholds.upperUncertainty", p.upper_uncertainty)?;
                if p.human_threshold > p.ai_threshold {
                    return Err(invalid("thresholds.humanThreshold must not exceed aiThreshold"));
                }
            }
            ThresholdPolicy::TwoWay(p) => {
                check_unit("thresholds.baseThreshold", p.base_threshold)?;
                check_unit("thresholds.uncertaintyLimit", p.uncertainty_limit)?;
                check_unit("thresholds.uncertaintyPenalty", p.uncertainty_penalty)?;
            }
        }

        let calls = &self.oracle_calls;
        if calls.timeout_ms == 0 {
            return Err(invalid("oracleCalls.timeoutMs must be positive"));
        }
        if calls.max_attempts == 0 {
            return Err(invalid("oracleCalls.maxAttempts must be at least 1"));
        }
        if calls.max_concurrency == 0 {
            return Err(invalid("oracleCalls.maxConcurrency must be at least 1"));
        }

        Ok(())
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Store rooted at the directory of an explicit config file path
    pub fn for_file(config_file: &Path) -> Self {
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_dir,
            config_file: config_file.to_path_buf(),
        }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("veritext"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir)?;
        Ok(())
    }

    /// Load configuration from file; a missing file yields defaults
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content)?;
        Ok(())
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));
        fs::copy(&self.config_file, &backup_file)?;

        self.cleanup_old_backups(&backup_dir, BACKUPS_TO_KEEP)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first; names embed the timestamp
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    pub fn get_api_key(&self, oracle: &str) -> Result<Option<String>, ConfigError> {
        let config = self.load()?;
        Ok(config.api_keys.get(oracle).cloned())
    }

    pub fn set_api_key(&self, oracle: &str, key: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.insert(oracle.to_string(), key.to_string());
        self.save(&config)
    }

    pub fn delete_api_key(&self, oracle: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.remove(oracle);
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detection::sensitivity::{ThreeWayPolicy, TwoWayPolicy};

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.chunking.window_size, 300);
        assert_eq!(config.detection.chunking.overlap, 60);
        assert_eq!(config.classifiers.len(), 2);
        assert!(matches!(config.detection.thresholds, ThresholdPolicy::ThreeWay(_)));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"windowSize\":300"));
        assert!(json.contains("\"policy\":\"threeWay\""));
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, "1.0.0");
        assert_eq!(parsed.classifiers[1].name, "secondary");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "classifiers": [{"name": "solo", "url": "http://localhost/c", "weight": 1.0}],
            "detection": {"thresholds": {"policy": "twoWay", "baseThreshold": 0.55}}
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.detection.stylometry.fallback_perplexity, 100.0);
        match config.detection.thresholds {
            ThresholdPolicy::TwoWay(p) => {
                assert_eq!(p.base_threshold, 0.55);
                assert_eq!(p.uncertainty_penalty, TwoWayPolicy::default().uncertainty_penalty);
            }
            other => panic!("unexpected policy {:?}", other),
        }
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = AppConfig::default();
        config.classifiers[0].weight = 0.8;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.classifiers[1].weight = 0.2;
        config.validate().unwrap();
    }

    #[test]
    fn test_ensemble_weight_rules() {
        assert!(validate_ensemble_weights(&[]).is_err());
        assert!(validate_ensemble_weights(&[0.3, 0.3]).is_err());
        assert!(validate_ensemble_weights(&[1.5, -0.5]).is_err());
        assert!(validate_ensemble_weights(&[f64::NAN, 1.0]).is_err());
        assert!(validate_ensemble_weights(&[1.0]).is_ok());
        assert!(validate_ensemble_weights(&[0.8, 0.2]).is_ok());
    }

    #[test]
    fn test_overlap_must_be_below_window() {
        let mut config = AppConfig::default();
        config.detection.chunking.overlap = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.detection.thresholds = ThresholdPolicy::ThreeWay(ThreeWayPolicy {
            ai_threshold: 0.3,
            human_threshold: 0.6,
            upper_uncertainty: 0.7,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_classifier_names_rejected() {
        let mut config = AppConfig::default();
        config.classifiers[1].name = "primary".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_round_trip_with_backups() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("veritext"));
        assert_eq!(store.load().unwrap().classifiers.len(), 2);

        let mut config = AppConfig::default();
        config.detection.chunking.window_size = 200;
        store.save(&config).unwrap();
        store.set_api_key("primary", "secret").unwrap();

        assert_eq!(store.load().unwrap().detection.chunking.window_size, 200);
        assert_eq!(store.get_api_key("primary").unwrap().as_deref(), Some("secret"));
        assert!(dir.path().join("veritext").join("backups").read_dir().unwrap().count() >= 1);

        store.delete_api_key("primary").unwrap();
        assert_eq!(store.get_api_key("primary").unwrap(), None);
    }
}
