use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::io::Write;
use std::time::Duration;

use super::retry::{MAX_RETRIES, NonRetryableError, RETRY_DELAY_MS, check_retryable};
use crate::config::SHINYLIVE_PACKAGE_VERSION;

/// Build the client used for all downloads.
pub fn build_http_client() -> Result<HttpClient> {
    let client = Client::builder()
        .user_agent(format!("shinylive/{}", SHINYLIVE_PACKAGE_VERSION))
        .build()?;
    Ok(HttpClient::new(client))
}

/// HTTP client with built-in retry logic for network operations.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry_delay: Duration,
}

impl HttpClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// `true` if a HEAD request to `url` answers 200.
    #[tracing::instrument(skip(self))]
    pub async fn head_ok(&self, url: &str) -> Result<bool> {
        debug!("HEAD {}...", url);
        let response = self
            .client
            .head(url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        debug!("HEAD {} -> {}", url, response.status());
        Ok(response.status() == StatusCode::OK)
    }

    /// Stream `url` into the writer returned by `create_writer`.
    ///
    /// The writer is created anew for each attempt. Client errors (4xx) fail
    /// immediately, everything else is retried up to [`MAX_RETRIES`] times.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<u64>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        debug!("Downloading file from {}...", url);
        self.with_retry("Download", || self.download_file_once(url, &create_writer))
            .await
    }

    async fn download_file_once<W, F>(&self, url: &str, create_writer: &F) -> Result<u64>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download request")?;

        let mut response = response.error_for_status().map_err(check_retryable)?;

        let mut writer = create_writer()?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush downloaded file")?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }

    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.downcast_ref::<NonRetryableError>().is_some() => {
                    debug!("{}: non-retryable error: {}", operation_name, e);
                    return Err(e);
                }
                Err(e) if attempt >= MAX_RETRIES => {
                    return Err(e.context(format!(
                        "{} failed after {} attempts",
                        operation_name, MAX_RETRIES
                    )));
                }
                Err(e) => {
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}...",
                        operation_name, attempt, MAX_RETRIES, e, self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client() -> HttpClient {
        HttpClient::new(Client::new()).with_retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_download_file_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/shinylive-0.9.1.tar.gz")
            .with_status(200)
            .with_body("test content")
            .create_async()
            .await;

        let bytes = client()
            .download_file(&format!("{}/shinylive-0.9.1.tar.gz", server.url()), || {
                Ok(std::io::sink())
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, 12);
    }

    #[tokio::test]
    async fn test_download_file_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let result = client()
            .download_file(&format!("{}/missing.tar.gz", server.url()), || {
                Ok(std::io::sink())
            })
            .await;

        mock.assert_async().await;
        let err = result.unwrap_err();
        assert!(err.downcast_ref::<NonRetryableError>().is_some());
    }

    #[tokio::test]
    async fn test_download_file_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky.tar.gz")
            .with_status(503)
            .expect(MAX_RETRIES)
            .create_async()
            .await;

        let result = client()
            .download_file(&format!("{}/flaky.tar.gz", server.url()), || {
                Ok(std::io::sink())
            })
            .await;

        mock.assert_async().await;
        assert!(result.unwrap_err().to_string().contains("failed after"));
    }

    #[tokio::test]
    async fn test_head_ok() {
        let mut server = mockito::Server::new_async().await;
        let _found = server
            .mock("HEAD", "/found.tar.gz")
            .with_status(200)
            .create_async()
            .await;
        let _missing = server
            .mock("HEAD", "/missing.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let client = client();
        assert!(
            client
                .head_ok(&format!("{}/found.tar.gz", server.url()))
                .await
                .unwrap()
        );
        assert!(
            !client
                .head_ok(&format!("{}/missing.tar.gz", server.url()))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_with_retry_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = client()
            .with_retry("test", || {
                let count = counter.clone();
                async move {
                    if count.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err::<&str, _>(anyhow::anyhow!("connection reset"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_non_retryable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = client()
            .with_retry("test", || {
                let count = counter.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow::Error::from(NonRetryableError::NotFound(
                        "x".to_string(),
                    )))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
