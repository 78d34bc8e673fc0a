use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Result with TriageError
pub type Result<T> = std::result::Result<T, TriageError>;

/// Error types for the triage tool
#[derive(Error, Debug)]
pub enum TriageError {
    /// No cached OAuth token; raised before any remote call
    #[error("No cached credential found at {}", path.display())]
    MissingCredential { path: PathBuf },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Gmail API returned an error not covered by a more specific variant
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Message payload did not have the expected shape
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Label resolution or creation failed
    #[error("Label error: {0}")]
    LabelError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TriageError {
    /// Errors that would likely succeed if the run were started again later.
    ///
    /// Nothing in the crate retries; this only shapes the operator hint.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TriageError::RateLimitExceeded { .. }
                | TriageError::ServerError { .. }
                | TriageError::NetworkError(_)
        )
    }

    /// Remediation text shown to the operator under the error message
    pub fn hint(&self) -> Option<String> {
        match self {
            TriageError::MissingCredential { .. } => {
                Some("Run `inbox-triage auth` first to create the token cache.".to_string())
            }
            TriageError::AuthError(_) => Some(
                "Check the OAuth client secret file, then run `inbox-triage auth --force`."
                    .to_string(),
            ),
            TriageError::RateLimitExceeded { retry_after } => Some(format!(
                "Gmail API quota hit. Wait {} seconds and start the run again; \
                 messages moved so far stay moved.",
                retry_after
            )),
            TriageError::ConfigError(_) => {
                Some("Check the config file, or regenerate it with `inbox-triage init-config --force`.".to_string())
            }
            e if e.is_transient() => Some(
                "This looks temporary. Start the run again; messages moved so far stay moved."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Parse the Retry-After header (delay-seconds form) from an HTTP response
///
/// Falls back to 5 seconds when the header is missing or not an integer.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl From<google_gmail1::Error> for TriageError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    429 => TriageError::RateLimitExceeded {
                        retry_after: parse_retry_after_header(response),
                    },
                    404 => TriageError::NotFound(message),
                    400 => TriageError::BadRequest(message),
                    403 => TriageError::Forbidden(message),
                    500..=599 => TriageError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => TriageError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => TriageError::BadRequest(err.to_string()),
            google_gmail1::Error::HttpError(ref err) => {
                TriageError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => TriageError::NetworkError(err.to_string()),
            google_gmail1::Error::MissingToken(err) => TriageError::AuthError(err.to_string()),
            _ => TriageError::ApiError(error.to_string()),
        }
    }
}
