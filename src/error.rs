//! Error types for PorkDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using PorkError
pub type Result<T> = std::result::Result<T, PorkError>;

/// Unified error type for PorkDB operations
#[derive(Debug, Error)]
pub enum PorkError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Container type mismatch: {0}")]
    ContainerType(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Container closed: {0}")]
    Closed(String),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),
}
