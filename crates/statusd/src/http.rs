//! Outbound HTTP for the scraper tiers.
//!
//! The aggregator site serves an anti-bot page to obvious robots, so the
//! client presents itself as a desktop browser.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use status_common::StatusError;
use std::time::Duration;
use tracing::debug;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Retry schedule: `attempts` tries, sleeping `base_delay * 2^n` between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Build a client with browser-like default headers and a per-attempt timeout.
pub fn browser_client(
    timeout: Duration,
    accept_language: &str,
) -> Result<reqwest::Client, StatusError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    let language = HeaderValue::from_str(accept_language)
        .map_err(|e| StatusError::Config(format!("invalid accept_language: {}", e)))?;
    headers.insert(ACCEPT_LANGUAGE, language);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| StatusError::Config(format!("failed to build HTTP client: {}", e)))
}

/// GET `url` as text, retrying transport failures per `policy`.
pub async fn get_text_with_retry(
    client: &reqwest::Client,
    url: &str,
    policy: RetryPolicy,
) -> Result<String, StatusError> {
    let mut attempt = 1;
    loop {
        match get_text(client, url).await {
            Ok(body) => return Ok(body),
            Err(err) if err.is_retryable() && attempt < policy.attempts => {
                let delay = policy.backoff(attempt);
                debug!(%url, attempt, ?delay, error = %err, "fetch failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, StatusError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            StatusError::SourceUnavailable(format!("timeout fetching {}", url))
        } else {
            StatusError::SourceUnavailable(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(StatusError::SourceUnavailable(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    response
        .text()
        .await
        .map_err(|e| StatusError::SourceUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(5))
    }

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }

    #[tokio::test]
    async fn sends_browser_headers() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/")
                .header_exists("user-agent")
                .header("accept-language", "pt-BR,pt;q=0.9");
            then.status(200).body("<html></html>");
        });

        let client = browser_client(Duration::from_secs(2), "pt-BR,pt;q=0.9").unwrap();
        let body = get_text_with_retry(&client, &server.url("/"), fast_policy())
            .await
            .unwrap();
        assert_eq!(body, "<html></html>");
        mock.assert();
    }

    #[tokio::test]
    async fn retries_non_success_up_to_limit() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(503);
        });

        let client = browser_client(Duration::from_secs(2), "en").unwrap();
        let result = get_text_with_retry(&client, &server.url("/"), fast_policy()).await;

        assert!(matches!(result, Err(StatusError::SourceUnavailable(_))));
        mock.assert_hits(3);
    }

    #[tokio::test]
    async fn timeout_is_source_unavailable() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(500)).body("late");
        });

        let client = browser_client(Duration::from_millis(50), "en").unwrap();
        let result = get_text_with_retry(
            &client,
            &server.url("/slow"),
            RetryPolicy::new(1, Duration::ZERO),
        )
        .await;
        assert!(matches!(result, Err(StatusError::SourceUnavailable(_))));
    }
}
