//! Which HTTP failures are worth another attempt.

use reqwest::StatusCode;

/// Maximum number of attempts for a request.
pub const MAX_RETRIES: usize = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// HTTP failures that will not go away by retrying.
#[derive(Debug, PartialEq)]
pub enum NonRetryableError {
    /// HTTP 404. Usually an assets version that was never released.
    NotFound(String),
    /// HTTP 401 or 403.
    Forbidden(String),
    /// HTTP 429.
    TooManyRequests(String),
    /// Any other 4xx status.
    ClientError(u16, String),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::NotFound(url) => {
                write!(f, "Not found: {}. Check that the version exists.", url)
            }
            NonRetryableError::Forbidden(url) => write!(f, "Access forbidden: {}", url),
            NonRetryableError::TooManyRequests(url) => {
                write!(f, "Too many requests to {}. Try again later.", url)
            }
            NonRetryableError::ClientError(status, url) => {
                write!(f, "Request error: HTTP {} for {}", status, url)
            }
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Classify a failed request. `Ok(())` means the error is transient.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "<unknown url>".to_string());

    match error.status() {
        Some(StatusCode::NOT_FOUND) => Err(NonRetryableError::NotFound(url)),
        Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
            Err(NonRetryableError::Forbidden(url))
        }
        Some(StatusCode::TOO_MANY_REQUESTS) => Err(NonRetryableError::TooManyRequests(url)),
        Some(status) if status.is_client_error() => {
            Err(NonRetryableError::ClientError(status.as_u16(), url))
        }
        // Server errors, timeouts and connection failures.
        _ => Ok(()),
    }
}

/// Wrap a failed request so callers can tell permanent from transient failures.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}
