// Assessment Pipeline
// text -> chunks -> oracle scores -> blend -> stylometric adjustment -> uncertainty -> advisory
//
// Oracles are injected; nothing here reaches for global state. Chunk scoring fans out on a
// JoinSet bounded by a semaphore, and results are reassembled by index so positional
// weighting never depends on completion order.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::models::{AggregateResult, Assessment, AuditRecord, Advisory, Chunk, ScoringDiagnostics};
use crate::services::config_store::{validate_ensemble_weights, ConfigError, DetectionConfig};
use crate::services::text_processor::{chunk_words, ChunkError};

use super::adapter::{score_chunk, score_perplexity, NEUTRAL_PROBABILITY};
use super::ensemble::{aggregate_chunks, blend_chunks};
use super::oracle::{AuditSink, ClassifierOracle, PerplexityOracle};
use super::stylometry::{adjust, StylometricFeatures};
use super::uncertainty::mean_entropy;

#[derive(Error, Debug)]
pub enum AssessError {
    #[error("text is required")]
    EmptyInput,
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkError),
}

/// A classifier together with its share of the per-chunk blend.
#[derive(Clone)]
pub struct WeightedClassifier {
    pub oracle: Arc<dyn ClassifierOracle>,
    pub weight: f64,
}

impl WeightedClassifier {
    pub fn new(oracle: Arc<dyn ClassifierOracle>, weight: f64) -> Self {
        Self { oracle, weight }
    }
}

/// Pure document scoring from already collected oracle outputs.
///
/// `by_oracle[o][c]` is classifier `o`'s AI probability for chunk `c`. The
/// aggregate's probability is the adjusted one; the pre-adjustment value is kept
/// in the diagnostics.
pub fn score_document(
    by_oracle: &[Vec<f64>],
    weights: &[f64],
    perplexity: f64,
    text: &str,
    config: &DetectionConfig,
) -> (AggregateResult, ScoringDiagnostics) {
    let chunk_probabilities = blend_chunks(by_oracle, weights);
    let features = StylometricFeatures::from_document(text, perplexity);

    if chunk_probabilities.is_empty() {
        let diagnostics = ScoringDiagnostics {
            raw_probability: NEUTRAL_PROBABILITY,
            chunk_probabilities,
            perplexity: features.perplexity,
            burstiness: features.burstiness,
            adjustment: 0.0,
        };
        return (AggregateResult::empty(), diagnostics);
    }

    let raw_probability = aggregate_chunks(&chunk_probabilities, &config.positional);
    let (ai_probability, adjustment) = adjust(raw_probability, &features, &config.stylometry);
    let uncertainty = mean_entropy(&chunk_probabilities);

    let aggregate = AggregateResult {
        ai_probability,
        uncertainty,
        chunk_count: chunk_probabilities.len(),
    };
    let diagnostics = ScoringDiagnostics {
        raw_probability,
        chunk_probabilities,
        perplexity: features.perplexity,
        burstiness: features.burstiness,
        adjustment,
    };
    (aggregate, diagnostics)
}

pub struct Assessor {
    classifiers: Vec<WeightedClassifier>,
    perplexity: Arc<dyn PerplexityOracle>,
    audit: Option<Arc<dyn AuditSink>>,
    config: DetectionConfig,
    semaphore: Arc<Semaphore>,
}

impl Assessor {
    /// Fails when `config` is invalid or the classifier weights do not form a
    /// convex combination (empty, negative, non-finite, or not summing to 1).
    pub fn new(
        classifiers: Vec<WeightedClassifier>,
        perplexity: Arc<dyn PerplexityOracle>,
        config: DetectionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let weights: Vec<f64> = classifiers.iter().map(|c| c.weight).collect();
        validate_ensemble_weights(&weights)?;

        let semaphore = Arc::new(Semaphore::new(config.oracle_calls.max_concurrency.max(1)));
        Ok(Self {
            classifiers,
            perplexity,
            audit: None,
            config,
            semaphore,
        })
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn classifiers(&self) -> &[WeightedClassifier] {
        &self.classifiers
    }

    pub fn perplexity_oracle(&self) -> &Arc<dyn PerplexityOracle> {
        &self.perplexity
    }

    /// Assess one document.
    ///
    /// Empty or whitespace-only text is rejected before any oracle is called.
    /// Dropping the returned future aborts the in-flight oracle calls.
    pub async fn assess(&self, text: &str) -> Result<Assessment, AssessError> {
        let started = Instant::now();
        let text = text.trim();
        if text.is_empty() {
            return Err(AssessError::EmptyInput);
        }

        let chunking = &self.config.chunking;
        let chunks = chunk_words(text, chunking.window_size, chunking.overlap)?;
        info!(
            chunks = chunks.len(),
            classifiers = self.classifiers.len(),
            words = chunks.last().map_or(0, |c| c.end),
            "assess.started"
        );

        let perplexity_future = score_perplexity(
            self.perplexity.as_ref(),
            text,
            self.config.stylometry.fallback_perplexity,
            &self.config.oracle_calls,
            &self.semaphore,
        );
        let ((by_oracle, mut degraded_calls), perplexity) =
            tokio::join!(self.score_chunks(&chunks), perplexity_future);
        if perplexity.degraded {
            degraded_calls += 1;
        }

        let weights: Vec<f64> = self.classifiers.iter().map(|c| c.weight).collect();
        let (aggregate, diagnostics) =
            score_document(&by_oracle, &weights, perplexity.value, text, &self.config);
        let advisory = self
            .config
            .thresholds
            .classify(aggregate.ai_probability, aggregate.uncertainty);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            chunks = aggregate.chunk_count,
            raw_probability = diagnostics.raw_probability,
            ai_probability = aggregate.ai_probability,
            uncertainty = aggregate.uncertainty,
            advisory = %advisory,
            degraded_calls,
            elapsed_ms,
            "assess.completed"
        );

        if advisory == Advisory::Ai {
            self.record_audit(text, aggregate.ai_probability, advisory);
        }

        Ok(Assessment {
            advisory,
            aggregate,
            diagnostics,
            degraded_calls,
            elapsed_ms,
        })
    }

    /// Score every (chunk, classifier) pair concurrently.
    ///
    /// Returns probabilities indexed `[oracle][chunk]` and the number of
    /// substituted calls.
    async fn score_chunks(&self, chunks: &[Chunk]) -> (Vec<Vec<f64>>, usize) {
        let mut by_oracle = vec![vec![NEUTRAL_PROBABILITY; chunks.len()]; self.classifiers.len()];
        let mut degraded = 0usize;
        let mut join_set: JoinSet<(usize, usize, f64, bool)> = JoinSet::new();

        for chunk in chunks {
            for (oracle_idx, classifier) in self.classifiers.iter().enumerate() {
                let oracle = classifier.oracle.clone();
                let semaphore = self.semaphore.clone();
                let calls = self.config.oracle_calls.clone();
                let chunk_idx = chunk.index;
                let chunk_text = chunk.text.clone();

                join_set.spawn(async move {
                    let scored =
                        score_chunk(oracle.as_ref(), chunk_idx, &chunk_text, &calls, &semaphore).await;
                    (oracle_idx, chunk_idx, scored.value, scored.degraded)
                });
            }
        }

        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((oracle_idx, chunk_idx, probability, was_degraded)) => {
                    by_oracle[oracle_idx][chunk_idx] = probability;
                    if was_degraded {
                        degraded += 1;
                    }
                }
                Err(e) => {
                    // Slot keeps the neutral substitution
                    warn!(error = %e, "classifier.task_failed");
                    degraded += 1;
                }
            }
        }

        debug!(chunks = chunks.len(), degraded, "classifier.scoring_done");
        (by_oracle, degraded)
    }

    /// Fire-and-forget; sink failures are logged and never reach the caller.
    fn record_audit(&self, text: &str, ai_probability: f64, advisory: Advisory) {
        let Some(sink) = self.audit.clone() else {
            return;
        };
        let record = AuditRecord::new(text, ai_probability, advisory);
        tokio::spawn(async move {
            match sink.append(&record).await {
                Ok(()) => debug!(id = %record.id, "audit.appended"),
                Err(e) => warn!(id = %record.id, error = %e, "audit.append_failed"),
            }
        });
    }
}
