//! Error types for PagerDuty credential handling, remote calls and persistence.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type PagerDutyResult<T> = Result<T, PagerDutyError>;

/// Errors surfaced by the PagerDuty integration core.
///
/// Credential loading never propagates these to its caller (failures are
/// logged and the account is left degraded); every other remote call returns
/// them as-is.
#[derive(Debug, Error)]
pub enum PagerDutyError {
    /// Missing or invalid configuration (credential parameters, URLs).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network-level failure reaching the provider or the catalog.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The identity endpoint could not be reached while acquiring a token.
    #[error("failed to acquire OAuth token: {0}")]
    TokenAcquisition(String),

    /// The identity endpoint rejected the request parameters (HTTP 400).
    #[error("invalid OAuth arguments (status {status}): {message}")]
    InvalidArguments { status: u16, message: String },

    /// The identity endpoint rejected the client credentials (HTTP 401).
    #[error("invalid OAuth credentials (status {status}): {message}")]
    InvalidCredentials { status: u16, message: String },

    /// The remote API rejected the credential (HTTP 401/403).
    #[error("authentication failed (status {status}): {message}")]
    Auth { status: u16, message: String },

    /// The requested resource does not exist (HTTP 404).
    #[error("not found (status {status}): {message}")]
    NotFound { status: u16, message: String },

    /// The remote API is throttling us (HTTP 429).
    #[error("rate limited (status {status}), retry after {retry_after_secs:?}s")]
    RateLimited {
        status: u16,
        retry_after_secs: Option<u64>,
    },

    /// The response body could not be decoded.
    #[error("failed to parse response: {message}")]
    Parse { status: u16, message: String },

    /// Any other non-success status from a remote API.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// No usable credential could be resolved for the account.
    #[error("no credential available for account '{account}'")]
    MissingCredential { account: String },

    /// Database query failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl PagerDutyError {
    /// Build a transport error from a reqwest failure.
    pub fn transport(context: &str, source: reqwest::Error) -> Self {
        let message = if source.is_timeout() {
            format!("{context}: request timed out")
        } else {
            format!("{context}: {source}")
        };
        Self::Transport {
            message,
            source: Some(source),
        }
    }

    /// Build a token acquisition error from a failed identity request.
    pub fn token_acquisition(source: &reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::TokenAcquisition("token request failed: request timed out".to_string())
        } else {
            Self::TokenAcquisition(format!("token request failed: {source}"))
        }
    }

    /// Build a parse error. Parse failures are reported as status 500.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            status: 500,
            message: message.into(),
        }
    }

    /// HTTP-equivalent status attached to the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidArguments { status, .. }
            | Self::InvalidCredentials { status, .. }
            | Self::Auth { status, .. }
            | Self::NotFound { status, .. }
            | Self::RateLimited { status, .. }
            | Self::Parse { status, .. }
            | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error was caused by configuration rather than the remote side.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::MissingCredential { .. }
        )
    }
}
