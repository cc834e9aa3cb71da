//! Error types for a3s-navguard

use thiserror::Error;

/// Errors that can occur around the navigation guard
///
/// The decision cascades themselves never fail. Errors only come from the
/// collaborator seams (browser, settings storage) and from settings writes.
#[derive(Debug, Error)]
pub enum GuardError {
    /// A browser command (navigate, close, lookup) failed
    #[error("Browser call '{op}' failed for tab {tab_id}: {reason}")]
    Browser {
        op: &'static str,
        tab_id: i64,
        reason: String,
    },

    /// The tab no longer exists
    #[error("Tab not found: {0}")]
    TabNotFound(i64),

    /// Settings could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),

    /// A host or domain input could not be normalized
    #[error("Invalid host: '{0}'")]
    InvalidHost(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;
