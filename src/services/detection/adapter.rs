// Oracle Adapter
// Calls one oracle with a bounded timeout and retries, then canonicalizes its answer.
// Failures never escape: they are replaced by a neutral value and logged.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::models::OracleScore;
use crate::services::config_store::OracleCallConfig;

use super::labels::{ai_probability, label_polarity};
use super::oracle::{ClassifierOracle, OracleError, PerplexityOracle};

/// Probability substituted for a failed classifier call (maximally uncertain).
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

/// Outcome of one adapted oracle call.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Scored {
    pub value: f64,
    /// True when `value` is the substitution rather than the oracle's answer.
    pub degraded: bool,
}

impl Scored {
    fn ok(value: f64) -> Self {
        Self { value, degraded: false }
    }

    fn substituted(value: f64) -> Self {
        Self { value, degraded: true }
    }
}

/// Run `call` under the per-attempt timeout, retrying with linear backoff.
///
/// A semaphore permit is held only for the duration of a single attempt.
pub async fn call_with_retry<T, F, Fut>(
    oracle: &str,
    context: &str,
    calls: &OracleCallConfig,
    semaphore: &Semaphore,
    mut call: F,
) -> Result<T, OracleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let timeout = Duration::from_millis(calls.timeout_ms);
    let attempts = calls.max_attempts.max(1);
    let mut last_err: Option<OracleError> = None;

    for attempt in 1..=attempts {
        let res = {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| OracleError::Unavailable("semaphore closed".to_string()))?;
            tokio::time::timeout(timeout, call()).await
        };

        match res {
            Ok(Ok(value)) => {
                if attempt > 1 {
                    debug!(oracle, context, attempt, "oracle.retry_succeeded");
                }
                return Ok(value);
            }
            Ok(Err(e)) => {
                warn!(oracle, context, attempt, error = %e, "oracle.call_failed");
                last_err = Some(e);
            }
            Err(_) => {
                warn!(oracle, context, attempt, timeout_ms = calls.timeout_ms, "oracle.call_timeout");
                last_err = Some(OracleError::Timeout(calls.timeout_ms));
            }
        }

        if attempt < attempts {
            let backoff_ms = calls.backoff_ms * attempt as u64;
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }
    }

    Err(last_err.unwrap_or_else(|| OracleError::Unavailable("no attempt made".to_string())))
}

/// Canonical AI probability from one classifier answer.
pub fn canonical_probability(score: &OracleScore) -> Result<f64, OracleError> {
    let confidence = score.confidence;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(OracleError::Malformed(format!(
            "confidence {} for label '{}' outside [0, 1]",
            confidence, score.label
        )));
    }
    Ok(ai_probability(label_polarity(&score.label), confidence))
}

/// Score one chunk with one classifier; falls back to [`NEUTRAL_PROBABILITY`].
pub async fn score_chunk(
    oracle: &dyn ClassifierOracle,
    chunk_index: usize,
    chunk_text: &str,
    calls: &OracleCallConfig,
    semaphore: &Semaphore,
) -> Scored {
    let context = format!("chunk {}", chunk_index);
    let res = call_with_retry(oracle.name(), &context, calls, semaphore, move || async move {
        let score = oracle.classify(chunk_text).await?;
        canonical_probability(&score)
    })
    .await;

    match res {
        Ok(p) => Scored::ok(p),
        Err(e) => {
            warn!(
                oracle = oracle.name(),
                chunk = chunk_index,
                error = %e,
                substitute = NEUTRAL_PROBABILITY,
                "classifier.substituted"
            );
            Scored::substituted(NEUTRAL_PROBABILITY)
        }
    }
}

/// Perplexity of the full document; falls back to `fallback` on any failure.
pub async fn score_perplexity(
    oracle: &dyn PerplexityOracle,
    text: &str,
    fallback: f64,
    calls: &OracleCallConfig,
    semaphore: &Semaphore,
) -> Scored {
    let res = call_with_retry(oracle.name(), "document", calls, semaphore, move || async move {
        let ppl = oracle.score(text).await?;
        if !ppl.is_finite() || ppl <= 0.0 {
            return Err(OracleError::Malformed(format!("perplexity {} is not positive", ppl)));
        }
        Ok(ppl)
    })
    .await;

    match res {
        Ok(ppl) => Scored::ok(ppl),
        Err(e) => {
            warn!(oracle = oracle.name(), error = %e, substitute = fallback, "perplexity.substituted");
            Scored::substituted(fallback)
        }
    }
}
