// Detection Module
// AI-likelihood scoring organized into specialized submodules:
// - oracle: capability traits for classifiers, the language model and the audit sink
// - labels: classifier label polarity table
// - adapter: bounded, retried oracle calls with neutral substitution
// - ensemble: per-chunk blending and positional aggregation
// - stylometry: perplexity/burstiness adjustment
// - uncertainty: binary-entropy uncertainty
// - sensitivity: threshold policies and presets
// - pipeline: the Assessor orchestrating all of the above

pub mod adapter;
pub mod ensemble;
pub mod labels;
pub mod oracle;
pub mod pipeline;
pub mod sensitivity;
pub mod stylometry;
pub mod uncertainty;

// Re-export commonly used items
pub use adapter::{canonical_probability, score_chunk, score_perplexity, Scored, NEUTRAL_PROBABILITY};
pub use ensemble::{aggregate_chunks, blend_chunk, blend_chunks, positional_weights};
pub use labels::{ai_probability, label_polarity};
pub use oracle::{AuditError, AuditSink, ClassifierOracle, OracleError, PerplexityOracle};
pub use pipeline::{score_document, AssessError, Assessor, WeightedClassifier};
pub use sensitivity::{DetectionSensitivity, ThreeWayPolicy, ThresholdPolicy, TwoWayPolicy};
pub use stylometry::{adjust, stylometric_delta, StylometricFeatures};
pub use uncertainty::{binary_entropy, mean_entropy};
