//! CLI error types and exit codes

use pagerduty_catalog::PagerDutyError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Authentication or missing credential
/// - 3: Network error
/// - 4: Validation error
/// - 5: Server error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No usable PagerDuty credential for account '{0}'")]
    NoCredential(String),

    #[error("Authentication failed (status {status}): {message}")]
    AuthenticationFailed { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by PagerDuty{}", .retry_after.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Database(_) => 1,
            CliError::NoCredential(_) | CliError::AuthenticationFailed { .. } => 2,
            CliError::Network(_) => 3,
            CliError::Validation(_) | CliError::NotFound(_) => 4,
            CliError::RateLimited { .. } => 5,
            CliError::Api { status, .. } => {
                if *status >= 500 {
                    5
                } else {
                    4
                }
            }
        }
    }

    /// Suggested next step, if there is an obvious one.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => Some("Check PD_SYNC_CONFIG and the YAML file it points to."),
            CliError::NoCredential(_) => {
                Some("Set pagerDuty.apiToken or a complete pagerDuty.oauth block for the account.")
            }
            CliError::RateLimited { .. } => Some("Wait a moment and run the command again."),
            _ => None,
        }
    }

    /// Print the error and suggestion to stderr.
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {suggestion}");
            } else {
                eprintln!("\nSuggestion: {suggestion}");
            }
        }
    }
}

impl From<PagerDutyError> for CliError {
    fn from(e: PagerDutyError) -> Self {
        match e {
            PagerDutyError::Configuration(message) => CliError::Config(message),
            PagerDutyError::MissingCredential { account } => CliError::NoCredential(account),
            PagerDutyError::Transport { message, .. } | PagerDutyError::TokenAcquisition(message) => {
                CliError::Network(message)
            }
            PagerDutyError::InvalidArguments { message, .. } => CliError::Validation(message),
            PagerDutyError::InvalidCredentials { status, message }
            | PagerDutyError::Auth { status, message } => {
                CliError::AuthenticationFailed { status, message }
            }
            PagerDutyError::NotFound { message, .. } => CliError::NotFound(message),
            PagerDutyError::RateLimited {
                retry_after_secs, ..
            } => CliError::RateLimited {
                retry_after: retry_after_secs,
            },
            PagerDutyError::Parse { status, message } | PagerDutyError::Api { status, message } => {
                CliError::Api { status, message }
            }
            PagerDutyError::Database(e) => CliError::Database(e.to_string()),
            PagerDutyError::Migration(e) => CliError::Database(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Config(format!("JSON error: {e}"))
    }
}
