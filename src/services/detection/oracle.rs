// Oracle Capabilities
// Abstract contracts for the external classifiers, the language model and the audit sink

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AuditRecord, OracleScore};

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Malformed oracle response: {0}")]
    Malformed(String),
    #[error("Oracle call timed out after {0} ms")]
    Timeout(u64),
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Text classifier answering with a label and a confidence for one chunk.
///
/// Implementations must tolerate concurrent invocation; the pipeline bounds
/// in-flight calls with its own semaphore.
#[async_trait]
pub trait ClassifierOracle: Send + Sync {
    /// Stable name used in logs and weight configuration.
    fn name(&self) -> &str;

    async fn classify(&self, text: &str) -> Result<OracleScore, OracleError>;
}

/// Language model returning a perplexity-like score (lower = more predictable).
#[async_trait]
pub trait PerplexityOracle: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, text: &str) -> Result<f64, OracleError>;
}

/// Optional sink for flagged detections.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;
}
