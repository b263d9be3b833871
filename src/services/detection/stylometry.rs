// Stylometric Adjustment
// Document-level perplexity and burstiness nudge the blended probability

use serde::{Deserialize, Serialize};

use crate::services::config_store::{StylometricDirection, StylometryConfig};
use crate::services::text_processor::compute_burstiness;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylometricFeatures {
    pub perplexity: f64,
    pub burstiness: f64,
}

impl StylometricFeatures {
    /// Features of the unchunked document, given its perplexity.
    pub fn from_document(text: &str, perplexity: f64) -> Self {
        Self {
            perplexity,
            burstiness: compute_burstiness(text),
        }
    }
}

/// Bounded evidence magnitude before the direction is applied.
///
/// Positive values mean "reads human" under the canonical direction.
pub fn stylometric_delta(features: &StylometricFeatures, config: &StylometryConfig) -> f64 {
    let perplexity_term =
        ((features.perplexity - config.perplexity_pivot) / config.perplexity_pivot).clamp(-1.0, 1.0);
    let burstiness_term = features.burstiness.clamp(0.0, config.burstiness_cap);

    let delta = config.perplexity_weight * perplexity_term + config.burstiness_weight * burstiness_term;
    delta.clamp(-config.max_adjustment, config.max_adjustment)
}

/// Apply the configured adjustment. Returns the clamped probability and the signed
/// change that was added to `probability`.
pub fn adjust(probability: f64, features: &StylometricFeatures, config: &StylometryConfig) -> (f64, f64) {
    let delta = stylometric_delta(features, config);
    let signed = match config.direction {
        StylometricDirection::Decrease => -delta,
        StylometricDirection::Increase => delta,
    };
    ((probability + signed).clamp(0.0, 1.0), signed)
}
