// Veritext Core Services

pub mod audit;
pub mod config_store;
pub mod detection;
pub mod document_loader;
pub mod providers;
pub mod startup;
pub mod text_processor;

pub use audit::JsonlAuditSink;
pub use config_store::*;
pub use document_loader::{load_document, DocumentError};
pub use providers::{resolve_api_key, HttpClassifierOracle, HttpPerplexityOracle};
pub use startup::initialize;
pub use text_processor::*;

pub use detection::{
    AssessError,
    Assessor,
    AuditSink,
    ClassifierOracle,
    DetectionSensitivity,
    OracleError,
    PerplexityOracle,
    ThresholdPolicy,
    WeightedClassifier,
};
