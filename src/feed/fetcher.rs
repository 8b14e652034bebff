use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::config::FetchSettings;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Identifying client header sent with every request.
pub const DEFAULT_USER_AGENT: &str =
    concat!("feedhub/", env!("CARGO_PKG_VERSION"), " (RSS aggregator)");

/// Accept hint sent with GET requests, favoring Atom then RSS.
pub const FEED_ACCEPT: &str =
    "application/atom+xml, application/rss+xml;q=0.9, application/xml;q=0.8, */*;q=0.5";

/// Errors that can occur while fetching a URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Every attempt failed; carries the last attempt's error
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

/// Timeout and retry bounds applied to one logical fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt timeout, covering connect, headers and body
    pub timeout: Duration,
    /// Total attempts including the first (0 is treated as 1)
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each further attempt.
    /// `Duration::ZERO` retries immediately.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay_before(&self, attempt: u32) -> Duration {
        // attempt is the 1-based number of the attempt about to start
        let exponent = attempt.saturating_sub(2).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }
}

/// HTTP client wrapper that retries failed GETs.
///
/// Cheap to clone: `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    /// Never follows redirects, so a probe judges the candidate URL itself
    probe_client: reqwest::Client,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Builds a fetcher from the `[fetch]` settings section.
    pub fn from_settings(settings: &FetchSettings) -> Result<Self, FetchError> {
        Self::new(&settings.user_agent, settings.retry_policy())
    }

    /// Builds a fetcher whose requests all carry `user_agent`.
    pub fn new(user_agent: &str, policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;
        let probe_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            probe_client,
            policy,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL using the fetcher's default policy.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_with(url, self.policy.timeout, self.policy.max_attempts)
            .await
    }

    /// Fetches a URL with an explicit timeout and attempt budget.
    ///
    /// Any failure (network, timeout, non-2xx status, truncated body) is
    /// logged as a warning and retried until `max_attempts` is used up,
    /// at which point [`FetchError::Exhausted`] is returned.
    pub async fn fetch_with(
        &self,
        url: &str,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Vec<u8>, FetchError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt_get(url, timeout).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt >= max_attempts => {
                    tracing::warn!(
                        url = %url,
                        attempts = max_attempts,
                        error = %e,
                        "Fetch failed after all attempts"
                    );
                    return Err(FetchError::Exhausted {
                        attempts: max_attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    attempt += 1;
                    let delay = self.policy.delay_before(attempt);
                    tracing::warn!(
                        url = %url,
                        attempt = attempt - 1,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn attempt_get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let request = async {
            let response = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, FEED_ACCEPT)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }

            read_limited_bytes(response, MAX_FEED_SIZE).await
        };

        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    /// Sends a single HEAD request and reports whether `url` itself answered
    /// with a 2xx status. Redirects are not followed, so a 3xx is `false`.
    ///
    /// Never retries and never errors: any failure is `false`.
    pub async fn probe(&self, url: &str, timeout: Duration) -> bool {
        let result = tokio::time::timeout(timeout, self.probe_client.head(url).send()).await;
        match result {
            Ok(Ok(response)) => {
                let ok = response.status().is_success();
                tracing::debug!(url = %url, status = %response.status(), ok, "Probed URL");
                ok
            }
            Ok(Err(e)) => {
                tracing::debug!(url = %url, error = %e, "Probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(url = %url, "Probe timed out");
                false
            }
        }
    }
}

/// Compares a `Content-Length` against the byte limit without truncating
/// it on targets where `usize` is narrower than 64 bits.
fn declared_length_exceeds(len: u64, limit: usize) -> bool {
    usize::try_from(len).map_or(true, |len| len > limit)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if declared_length_exceeds(len, limit) {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, header, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> Fetcher {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            backoff: Duration::ZERO,
        };
        Fetcher::new(DEFAULT_USER_AGENT, policy).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bytes = test_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"<rss/>");
    }

    #[tokio::test]
    async fn test_sends_identifying_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("accept", FEED_ACCEPT))
            .and(header_regex("user-agent", "^feedhub/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = test_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        assert!(result.is_ok(), "headers not matched: {:?}", result.err());
    }

    #[tokio::test]
    async fn test_500_retries_then_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let result = test_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await;
        match result.unwrap_err() {
            FetchError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FetchError::HttpStatus(500)));
            }
            e => panic!("Expected Exhausted, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_404_is_retried_like_any_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&mock_server)
            .await;

        let result = test_fetcher()
            .fetch_with(
                &format!("{}/feed", mock_server.uri()),
                Duration::from_secs(5),
                2,
            )
            .await;
        assert!(matches!(
            result,
            Err(FetchError::Exhausted { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_503_retry_then_success() {
        let mock_server = MockServer::start().await;

        // First two requests return 503, third succeeds
        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&mock_server)
            .await;

        let bytes = test_fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"recovered");
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let result = test_fetcher()
            .fetch_with(
                &format!("{}/slow", mock_server.uri()),
                Duration::from_millis(50),
                2,
            )
            .await;
        match result.unwrap_err() {
            FetchError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, FetchError::Timeout));
            }
            e => panic!("Expected Exhausted(Timeout), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("once"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = test_fetcher()
            .fetch_with(&mock_server.uri(), Duration::from_secs(5), 0)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_probe() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/favicon.ico"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = test_fetcher();
        let timeout = Duration::from_secs(3);
        assert!(
            fetcher
                .probe(&format!("{}/favicon.ico", mock_server.uri()), timeout)
                .await
        );
        assert!(
            !fetcher
                .probe(&format!("{}/missing.png", mock_server.uri()), timeout)
                .await
        );
    }

    #[tokio::test]
    async fn test_probe_does_not_follow_redirects() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/favicon.ico"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/"))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let fetcher = test_fetcher();
        let timeout = Duration::from_secs(3);
        assert!(
            !fetcher
                .probe(&format!("{}/favicon.ico", mock_server.uri()), timeout)
                .await
        );
        assert!(fetcher.probe(&mock_server.uri(), timeout).await);
    }

    #[tokio::test]
    async fn test_get_still_follows_redirects() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old.xml"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/feed.xml"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .mount(&mock_server)
            .await;

        let bytes = test_fetcher()
            .fetch(&format!("{}/old.xml", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"<rss/>");
    }

    #[test]
    fn test_declared_length_exceeds() {
        assert!(!declared_length_exceeds(10, 10));
        assert!(declared_length_exceeds(11, 10));
        assert!(declared_length_exceeds(u64::MAX, MAX_FEED_SIZE));
        assert!(declared_length_exceeds(u64::from(u32::MAX) + 1, MAX_FEED_SIZE));
    }

    #[tokio::test]
    async fn test_oversized_content_length_is_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; MAX_FEED_SIZE + 1]))
            .mount(&mock_server)
            .await;

        let result = test_fetcher()
            .fetch_with(&mock_server.uri(), Duration::from_secs(5), 1)
            .await;
        match result.unwrap_err() {
            FetchError::Exhausted { last, .. } => {
                assert!(matches!(*last, FetchError::ResponseTooLarge));
            }
            e => panic!("Expected Exhausted(ResponseTooLarge), got {:?}", e),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            backoff: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
        assert_eq!(policy.delay_before(4), Duration::from_millis(400));
    }
}
