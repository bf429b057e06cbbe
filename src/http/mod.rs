//! HTTP access for fetching the assets bundle, with retry on transient failures.

mod client;
mod retry;

pub use client::{HttpClient, build_http_client};
pub use retry::{MAX_RETRIES, NonRetryableError, RETRY_DELAY_MS, check_retryable, classify_error};
