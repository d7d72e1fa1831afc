//! Unified error types for Genflow

use thiserror::Error;

/// Unified error type for all Genflow operations
#[derive(Error, Debug)]
pub enum GenflowError {
    // Routing errors
    #[error("no routing entry for phase {phase}, task '{task}', doc type '{doc_type}'")]
    RoutingNotFound {
        phase: u32,
        task: String,
        doc_type: String,
    },

    #[error("agent call failed: {0}")]
    AgentCallFailed(String),

    // Template errors
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template render error: {0}")]
    Render(String),

    // Pipeline errors
    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // Export errors
    #[error("export error: {0}")]
    Export(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using GenflowError
pub type Result<T> = std::result::Result<T, GenflowError>;
