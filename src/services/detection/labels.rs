// Label Normalization
// Maps every classifier label vocabulary in use onto a binary polarity

use crate::models::Polarity;

/// Known labels of the deployed detectors.
///
/// roberta-base-openai-detector answers Fake/Real, desklib answers AI/Human or
/// LABEL_1/LABEL_0, chatgpt-detector-roberta answers ChatGPT/Human.
pub const LABEL_POLARITY: &[(&str, Polarity)] = &[
    ("AI", Polarity::Ai),
    ("Fake", Polarity::Ai),
    ("LABEL_1", Polarity::Ai),
    ("ChatGPT", Polarity::Ai),
    ("Machine", Polarity::Ai),
    ("machine", Polarity::Ai),
    ("Human", Polarity::Human),
    ("human", Polarity::Human),
    ("Real", Polarity::Human),
    ("LABEL_0", Polarity::Human),
];

/// Token that marks a label as AI when it is missing from [`LABEL_POLARITY`].
const AI_FALLBACK_TOKEN: &str = "ai";

/// Exact lookup in the label table.
pub fn lookup_polarity(label: &str) -> Option<Polarity> {
    LABEL_POLARITY
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, polarity)| *polarity)
}

/// Resolve a label to a polarity.
///
/// Unknown labels fall back to a case-insensitive substring match on "ai";
/// anything else counts as human.
pub fn label_polarity(label: &str) -> Polarity {
    let label = label.trim();
    if let Some(polarity) = lookup_polarity(label) {
        return polarity;
    }
    if label.to_lowercase().contains(AI_FALLBACK_TOKEN) {
        Polarity::Ai
    } else {
        Polarity::Human
    }
}

/// Probability that the chunk is AI-authored, given the oracle's answer.
pub fn ai_probability(polarity: Polarity, confidence: f64) -> f64 {
    match polarity {
        Polarity::Ai => confidence,
        Polarity::Human => 1.0 - confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_label_resolves() {
        for (label, expected) in LABEL_POLARITY {
            assert_eq!(label_polarity(label), *expected, "label {}", label);
        }
    }

    #[test]
    fn test_label_table_has_no_duplicates() {
        for (i, (a, _)) in LABEL_POLARITY.iter().enumerate() {
            assert!(LABEL_POLARITY[i + 1..].iter().all(|(b, _)| a != b), "duplicate {}", a);
        }
    }

    #[test]
    fn test_vocabularies_are_balanced() {
        assert_eq!(label_polarity("Fake"), Polarity::Ai);
        assert_eq!(label_polarity("Real"), Polarity::Human);
        assert_eq!(label_polarity("LABEL_1"), Polarity::Ai);
        assert_eq!(label_polarity("LABEL_0"), Polarity::Human);
        assert_eq!(label_polarity("ChatGPT"), Polarity::Ai);
    }

    #[test]
    fn test_fallback_substring_match() {
        assert_eq!(lookup_polarity("ai_generated"), None);
        assert_eq!(label_polarity("ai_generated"), Polarity::Ai);
        assert_eq!(label_polarity("Generated-By-AI"), Polarity::Ai);
        assert_eq!(label_polarity("written"), Polarity::Human);
        assert_eq!(label_polarity(""), Polarity::Human);
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(label_polarity("  Real "), Polarity::Human);
    }

    #[test]
    fn test_ai_probability_orientation() {
        assert_eq!(ai_probability(Polarity::Ai, 0.9), 0.9);
        assert!((ai_probability(Polarity::Human, 0.9) - 0.1).abs() < 1e-12);
    }
}
