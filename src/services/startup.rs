// Startup
// Builds a ready Assessor from the application config; oracle problems here are fatal

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::services::audit::JsonlAuditSink;
use crate::services::config_store::{AppConfig, ConfigError};
use crate::services::detection::oracle::{ClassifierOracle, PerplexityOracle};
use crate::services::detection::pipeline::{Assessor, WeightedClassifier};
use crate::services::providers::{resolve_api_key, HttpClassifierOracle, HttpPerplexityOracle};

const PROBE_TEXT: &str = "The quick brown fox jumps over the lazy dog.";

fn oracle_init(name: &str, reason: impl ToString) -> ConfigError {
    ConfigError::OracleInit {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate `config`, construct every oracle and, when configured, probe them.
pub async fn initialize(config: &AppConfig) -> Result<Assessor, ConfigError> {
    config.validate()?;
    let timeout = Duration::from_millis(config.detection.oracle_calls.timeout_ms);

    let mut classifiers = Vec::with_capacity(config.classifiers.len());
    for c in &config.classifiers {
        if c.url.trim().is_empty() {
            return Err(oracle_init(&c.name, "url is not configured"));
        }
        let api_key = resolve_api_key(&c.name, config);
        let oracle = HttpClassifierOracle::from_config(c, api_key, timeout)
            .map_err(|e| oracle_init(&c.name, e))?;
        classifiers.push(WeightedClassifier::new(Arc::new(oracle), c.weight));
    }

    let ppl_config = config
        .perplexity
        .as_ref()
        .ok_or_else(|| oracle_init("perplexity", "perplexity oracle is not configured"))?;
    if ppl_config.url.trim().is_empty() {
        return Err(oracle_init("perplexity", "url is not configured"));
    }
    let ppl_key = resolve_api_key("perplexity", config);
    let perplexity: Arc<dyn PerplexityOracle> = Arc::new(
        HttpPerplexityOracle::from_config(ppl_config, ppl_key, timeout)
            .map_err(|e| oracle_init("perplexity", e))?,
    );

    if config.startup.probe_oracles {
        probe_oracles(&classifiers, perplexity.as_ref()).await?;
    }

    let mut assessor = Assessor::new(classifiers, perplexity, config.detection.clone())?;
    if let Some(audit) = &config.audit {
        info!(path = %audit.path.display(), "audit.enabled");
        assessor = assessor.with_audit_sink(Arc::new(JsonlAuditSink::new(audit.path.clone())));
    }

    info!(
        classifiers = config.classifiers.len(),
        probed = config.startup.probe_oracles,
        "assessor.initialized"
    );
    Ok(assessor)
}

/// Call each oracle once; the first failure aborts startup.
pub async fn probe_oracles(
    classifiers: &[WeightedClassifier],
    perplexity: &dyn PerplexityOracle,
) -> Result<(), ConfigError> {
    for c in classifiers {
        probe_classifier(c.oracle.as_ref()).await?;
    }

    match perplexity.score(PROBE_TEXT).await {
        Ok(ppl) if ppl.is_finite() && ppl > 0.0 => {
            info!(oracle = perplexity.name(), perplexity = ppl, "oracle.probe_ok");
            Ok(())
        }
        Ok(ppl) => Err(oracle_init(perplexity.name(), format!("probe returned perplexity {}", ppl))),
        Err(e) => {
            warn!(oracle = perplexity.name(), error = %e, "oracle.probe_failed");
            Err(oracle_init(perplexity.name(), e))
        }
    }
}

async fn probe_classifier(oracle: &dyn ClassifierOracle) -> Result<(), ConfigError> {
    match oracle.classify(PROBE_TEXT).await {
        Ok(score) => {
            info!(oracle = oracle.name(), label = %score.label, "oracle.probe_ok");
            Ok(())
        }
        Err(e) => {
            warn!(oracle = oracle.name(), error = %e, "oracle.probe_failed");
            Err(oracle_init(oracle.name(), e))
        }
    }
}
