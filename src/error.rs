//! Application error types.

use thiserror::Error;

/// Application-level errors for ecomap.
#[derive(Error, Debug)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("{0} not configured")]
    MissingConfig(&'static str),

    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    // Upstream errors
    #[error("Rate limit exceeded after {attempts} attempts (url={url})")]
    RateLimited { url: String, attempts: u32 },

    #[error("Upstream returned HTTP {status} (url={url})")]
    UpstreamStatus { status: u16, url: String },

    #[error("Invalid response format (url={url}): {reason}")]
    MalformedDocument { url: String, reason: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Request errors
    #[error(
        "Invalid mode '{0}'. Must be \"stack_integration\", \"affiliation\", or \"funding_received\""
    )]
    InvalidMode(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),
}

impl AppError {
    /// Rate limiting is the only upstream condition worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::RateLimited { .. })
    }

    /// Errors caused by missing or invalid configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::MissingConfig(_) | AppError::InvalidEndpoint { .. }
        )
    }
}
