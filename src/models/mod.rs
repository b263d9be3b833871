// Veritext Data Models
// Shared types passed between the chunker, the oracle adapters and the scoring pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============ Chunking ============

/// Contiguous word window of the assessed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// Word index (0-based) of the first word in the window.
    pub start: usize,
    /// Word index (0-based, end-exclusive) one past the last word in the window.
    pub end: usize,
}

impl Chunk {
    pub fn word_count(&self) -> usize {
        self.end - self.start
    }
}

// ============ Oracle Output ============

/// Raw answer of one classifier call on one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleScore {
    pub label: String,
    #[serde(alias = "score")]
    pub confidence: f64,
}

impl OracleScore {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Binary authorship polarity a classifier label resolves to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Ai,
    Human,
}

// ============ Aggregation ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub ai_probability: f64,
    pub uncertainty: f64,
    pub chunk_count: usize,
}

impl AggregateResult {
    /// Sentinel for documents that produced no chunks.
    pub fn empty() -> Self {
        Self {
            ai_probability: 0.0,
            uncertainty: 0.0,
            chunk_count: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advisory {
    #[serde(rename = "AI")]
    Ai,
    Human,
    Uncertain,
}

impl Advisory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "AI",
            Self::Human => "Human",
            Self::Uncertain => "Uncertain",
        }
    }
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document-level scoring signals kept next to the aggregate for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringDiagnostics {
    /// Positionally weighted probability before the stylometric adjustment.
    pub raw_probability: f64,
    /// Blended probability per chunk, in chunk order.
    pub chunk_probabilities: Vec<f64>,
    pub perplexity: f64,
    pub burstiness: f64,
    /// Signed change applied to `raw_probability` (before clamping).
    pub adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub advisory: Advisory,
    #[serde(flatten)]
    pub aggregate: AggregateResult,
    pub diagnostics: ScoringDiagnostics,
    /// Oracle calls answered by the neutral substitution instead of the oracle.
    pub degraded_calls: usize,
    pub elapsed_ms: u64,
}

// ============ Audit ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub ai_probability: f64,
    pub advisory: Advisory,
    pub text: String,
}

impl AuditRecord {
    pub fn new(text: &str, ai_probability: f64, advisory: Advisory) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            ai_probability,
            advisory,
            text: text.to_string(),
        }
    }
}
