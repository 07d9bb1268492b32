//! Chart archive fetching
//!
//! Downloads `<registry>/<name>-<version>.tgz` with a bounded number of
//! attempts. Every attempt has its own timeout and attempts are separated by a
//! fixed delay.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use convoy_core::archive_name;

use crate::error::{RepoError, Result};

/// Bounded retry settings for a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Timeout of a single attempt
    pub timeout: Duration,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            timeout: Duration::from_secs(1),
            delay: Duration::from_secs(1),
        }
    }
}

/// Source of packaged charts
#[async_trait]
pub trait ChartFetcher: Send + Sync {
    /// Make `<name>-<version>.tgz` available locally and return its path
    async fn fetch(&self, name: &str, version: &str) -> Result<PathBuf>;
}

/// Fetches charts from an HTTP(S) registry root
pub struct HttpChartFetcher {
    registry: String,
    dest: PathBuf,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpChartFetcher {
    /// Fetcher with the default retry policy and TLS verification on
    pub fn new(registry: &str, dest: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(registry, dest, false, RetryPolicy::default())
    }

    pub fn with_options(
        registry: &str,
        dest: impl Into<PathBuf>,
        insecure_skip_tls: bool,
        retry: RetryPolicy,
    ) -> Result<Self> {
        Url::parse(registry).map_err(|e| RepoError::InvalidRegistryUrl {
            url: registry.to_string(),
            reason: e.to_string(),
        })?;

        if insecure_skip_tls {
            tracing::warn!("TLS verification disabled for {}", registry);
        }

        let client = reqwest::Client::builder()
            .timeout(retry.timeout)
            .danger_accept_invalid_certs(insecure_skip_tls)
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            registry: registry.trim_end_matches('/').to_string(),
            dest: dest.into(),
            client,
            retry,
        })
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Directory archives are written to
    pub fn dest_dir(&self) -> &Path {
        &self.dest
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Download location of a chart archive
    pub fn archive_url(&self, name: &str, version: &str) -> String {
        format!("{}/{}", self.registry, archive_name(name, version))
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("Request to {} failed", url),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ChartFetcher for HttpChartFetcher {
    async fn fetch(&self, name: &str, version: &str) -> Result<PathBuf> {
        let url = self.archive_url(name, version);
        let attempts = self.retry.attempts.max(1);
        let mut last_error = None;
        let mut made = 0;

        for attempt in 1..=attempts {
            tracing::debug!("Fetching {} (attempt {}/{})", url, attempt, attempts);
            match self.fetch_once(&url).await {
                Ok(data) => {
                    tokio::fs::create_dir_all(&self.dest).await?;
                    let path = self.dest.join(archive_name(name, version));
                    tokio::fs::write(&path, &data).await?;
                    tracing::info!("Fetched {} to {}", url, path.display());
                    return Ok(path);
                }
                Err(e) => {
                    tracing::warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, url, e);
                    made = attempt;
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                    if attempt < attempts {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }

        Err(RepoError::FetchFailed {
            url,
            attempts: made,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            timeout: Duration::from_secs(5),
            delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.timeout, Duration::from_secs(1));
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_archive_url() {
        let fetcher = HttpChartFetcher::new("https://charts.example.com/stable/", "charts").unwrap();
        assert_eq!(
            fetcher.archive_url("web", "1.2.0"),
            "https://charts.example.com/stable/web-1.2.0.tgz"
        );
    }

    #[test]
    fn test_invalid_registry_url() {
        assert!(matches!(
            HttpChartFetcher::new("not a url", "charts"),
            Err(RepoError::InvalidRegistryUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_writes_archive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/web-1.2.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"chart-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dest = TempDir::new().unwrap();
        let charts = dest.path().join("charts");
        let fetcher =
            HttpChartFetcher::with_options(&server.uri(), &charts, false, quick_retry(5)).unwrap();

        let archive = fetcher.fetch("web", "1.2.0").await.unwrap();
        assert_eq!(archive, charts.join("web-1.2.0.tgz"));
        assert_eq!(std::fs::read(&archive).unwrap(), b"chart-bytes");
    }

    #[tokio::test]
    async fn test_fetch_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/web-1.2.0.tgz"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/web-1.2.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dest = TempDir::new().unwrap();
        let fetcher =
            HttpChartFetcher::with_options(&server.uri(), dest.path(), false, quick_retry(5))
                .unwrap();

        let archive = fetcher.fetch("web", "1.2.0").await.unwrap();
        assert_eq!(std::fs::read(archive).unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_bounded_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let dest = TempDir::new().unwrap();
        let fetcher =
            HttpChartFetcher::with_options(&server.uri(), dest.path(), false, quick_retry(3))
                .unwrap();

        let err = fetcher.fetch("flaky", "0.1.0").await.unwrap_err();
        match err {
            RepoError::FetchFailed { url, attempts, .. } => {
                assert!(url.ends_with("/flaky-0.1.0.tgz"));
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.path().join("flaky-0.1.0.tgz").exists());
    }

    #[tokio::test]
    async fn test_missing_chart_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dest = TempDir::new().unwrap();
        let fetcher =
            HttpChartFetcher::with_options(&server.uri(), dest.path(), false, quick_retry(5))
                .unwrap();

        let err = fetcher.fetch("missing", "0.1.0").await.unwrap_err();
        match err {
            RepoError::FetchFailed {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 1);
                assert!(last_error.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dest = TempDir::new().unwrap();
        let fetcher =
            HttpChartFetcher::with_options(&server.uri(), dest.path(), false, quick_retry(5))
                .unwrap();

        assert!(fetcher.fetch("web", "1.0.0").await.is_ok());
    }
}
