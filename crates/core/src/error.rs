//! Error types for the Wayfarer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Validation rejections are deliberately absent: they are data
//! ([`crate::ValidationVerdict`]), not errors.

use thiserror::Error;

/// The top-level error type for all Wayfarer operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Generator output errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Knowledge store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Malformed or incomplete generator output.
///
/// Recoverable: the orchestrator treats these as a failed attempt and retries.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Generator returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Expected {expected} items, got {actual}")]
    WrongCardinality { expected: usize, actual: usize },

    #[error("Item {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Item {index} has unknown bucket '{value}'")]
    UnknownBucket { index: usize, value: String },

    #[error("Generator output does not match schema: {0}")]
    SchemaMismatch(String),

    #[error("No parsable batch after {attempts} attempts: {last_error}")]
    Exhausted { attempts: usize, last_error: String },

    #[error("Generator call failed: {0}")]
    Upstream(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Corrupted state in {path}: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("Malformed stored document: {0}")]
    Malformed(String),

    #[error("Concurrent update conflict on {0}")]
    Conflict(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl ProviderError {
    /// Whether another endpoint could serve the same request: transport
    /// failures, throttling, server errors and per-endpoint credentials.
    /// A 4xx rejection of the request itself would fail everywhere.
    pub fn warrants_failover(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::AuthenticationFailed(_)
            | ProviderError::NotConfigured(_) => true,
            ProviderError::ApiError { status_code, .. } => {
                *status_code >= 500 || matches!(status_code, 408 | 429)
            }
        }
    }
}

impl StoreError {
    /// Whether this failure belongs to the soft-fail class: callers degrade
    /// instead of aborting.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Storage(_) | StoreError::QueryFailed(_)
        )
    }
}
