//! Error types for the insight engine

use thiserror::Error;

use crate::gateway::GatewayError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in the insight engine
///
/// Note that executor and fetcher components never return these from their
/// `execute`/`fetch` operations; per the execution-state contract those
/// surface failures through their state instead. This enum covers the
/// setup-time surface (store installation, typed command wrappers).
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Gateway invocation errors
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
