// Uncertainty Estimation
// Mean binary entropy of the blended chunk probabilities

const ENTROPY_CLAMP: f64 = 1e-6;

/// Binary entropy in bits, with `p` clamped away from 0 and 1.
pub fn binary_entropy(p: f64) -> f64 {
    let p = p.clamp(ENTROPY_CLAMP, 1.0 - ENTROPY_CLAMP);
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

/// Unweighted mean entropy across chunks; 0 for no chunks.
pub fn mean_entropy(chunk_probabilities: &[f64]) -> f64 {
    if chunk_probabilities.is_empty() {
        return 0.0;
    }
    let total: f64 = chunk_probabilities.iter().map(|&p| binary_entropy(p)).sum();
    (total / chunk_probabilities.len() as f64).clamp(0.0, 1.0)
}
