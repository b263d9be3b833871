// Ensemble Blending
// Combines oracle probabilities per chunk, then folds chunks into one document probability

use crate::services::config_store::PositionalWeights;

use super::adapter::NEUTRAL_PROBABILITY;

/// Convex combination of one chunk's oracle probabilities.
///
/// `weights` are the classifier weights in oracle order and sum to 1; with a
/// single oracle the blend is the identity.
pub fn blend_chunk(probabilities: &[f64], weights: &[f64]) -> f64 {
    debug_assert_eq!(probabilities.len(), weights.len());
    if probabilities.len() == 1 {
        return probabilities[0];
    }
    probabilities
        .iter()
        .zip(weights.iter())
        .map(|(p, w)| p * w)
        .sum::<f64>()
        .clamp(0.0, 1.0)
}

/// Blend every chunk. `by_oracle[o][c]` is oracle `o`'s probability for chunk `c`.
pub fn blend_chunks(by_oracle: &[Vec<f64>], weights: &[f64]) -> Vec<f64> {
    let chunk_count = by_oracle.first().map_or(0, Vec::len);
    (0..chunk_count)
        .map(|c| {
            let column: Vec<f64> = by_oracle.iter().map(|probs| probs[c]).collect();
            blend_chunk(&column, weights)
        })
        .collect()
}

/// Weights falling linearly from `first_weight` on the first chunk to
/// `last_weight` on the last one.
pub fn positional_weights(chunk_count: usize, positional: &PositionalWeights) -> Vec<f64> {
    match chunk_count {
        0 => Vec::new(),
        1 => vec![positional.first_weight],
        n => {
            let step = (positional.last_weight - positional.first_weight) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        positional.last_weight
                    } else {
                        positional.first_weight + step * i as f64
                    }
                })
                .collect()
        }
    }
}

/// Position-weighted mean of the blended chunk probabilities, in chunk order.
///
/// Without chunks the document probability is neutral.
pub fn aggregate_chunks(chunk_probabilities: &[f64], positional: &PositionalWeights) -> f64 {
    if chunk_probabilities.is_empty() {
        return NEUTRAL_PROBABILITY;
    }

    let weights = positional_weights(chunk_probabilities.len(), positional);
    let total: f64 = weights.iter().sum();
    let weighted: f64 = chunk_probabilities
        .iter()
        .zip(weights.iter())
        .map(|(p, w)| p * w)
        .sum();

    (weighted / total).clamp(0.0, 1.0)
}
