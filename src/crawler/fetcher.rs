//! HTTP fetcher
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client from the crawl configuration
//! - User agent selection (fixed or rotating)
//! - Retry logic for transient failures
//! - Response size enforcement
//! - Failure classification
//!
//! Retries happen here and only here; callers treat any returned failure
//! as final for that URL.

use crate::config::CrawlConfig;
use reqwest::{redirect::Policy, Client, StatusCode};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// Maximum fetch attempts per URL (first try + retries)
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between attempts
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Browser user agents cycled through when rotation is enabled
const ROTATING_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Final URL after any redirects
    pub final_url: Url,

    /// HTTP status code (always 2xx)
    pub status: u16,

    /// Response headers as received
    pub headers: reqwest::header::HeaderMap,

    /// Raw response body; charset decoding happens at the parse boundary
    pub body: Vec<u8>,

    /// Hex SHA-256 of the raw response bytes
    pub content_hash: String,
}

impl FetchOutcome {
    /// Content-Type header value, empty if absent or non-ASCII
    pub fn content_type(&self) -> String {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    }
}

/// Classification of a fetch failure, recorded on the page node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailureKind {
    /// The request exceeded the configured timeout
    Timeout,

    /// TCP/TLS connection could not be established
    Connect,

    /// Terminal HTTP status (4xx, or 5xx after retries)
    HttpStatus(u16),

    /// Response body exceeded the configured size limit
    TooLarge,

    /// Anything else (body read errors, redirect loops, ...)
    Other,
}

/// A fetch that failed after the retry policy was exhausted
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub kind: FetchFailureKind,
    pub message: String,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FetchFailureKind::Timeout => write!(f, "timeout: {}", self.message),
            FetchFailureKind::Connect => write!(f, "connection error: {}", self.message),
            FetchFailureKind::HttpStatus(code) => write!(f, "http {}: {}", code, self.message),
            FetchFailureKind::TooLarge => write!(f, "too large: {}", self.message),
            FetchFailureKind::Other => write!(f, "{}", self.message),
        }
    }
}

impl FetchFailure {
    fn status(code: StatusCode) -> Self {
        Self {
            kind: FetchFailureKind::HttpStatus(code.as_u16()),
            message: code
                .canonical_reason()
                .unwrap_or("non-success status")
                .to_string(),
        }
    }

    fn too_large(limit: u64) -> Self {
        Self {
            kind: FetchFailureKind::TooLarge,
            message: format!("response body exceeds {} bytes", limit),
        }
    }

    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self {
                kind: FetchFailureKind::Timeout,
                message: "request timeout".to_string(),
            }
        } else if e.is_connect() {
            Self {
                kind: FetchFailureKind::Connect,
                message: "connection failed".to_string(),
            }
        } else {
            Self {
                kind: FetchFailureKind::Other,
                message: e.to_string(),
            }
        }
    }

    /// Transient failures are retried; everything else is terminal
    fn is_transient(&self) -> bool {
        match self.kind {
            FetchFailureKind::Timeout | FetchFailureKind::Connect => true,
            FetchFailureKind::HttpStatus(code) => code >= 500,
            _ => false,
        }
    }
}

/// Round-robin pool of user agent strings
///
/// With rotation disabled this always yields the configured agent, so
/// callers never branch on the mode.
pub struct UserAgentPool {
    agents: Vec<String>,
    cursor: AtomicUsize,
}

impl UserAgentPool {
    pub fn from_config(config: &CrawlConfig) -> Self {
        let agents = if config.rotate_user_agents {
            ROTATING_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            vec![config.user_agent.clone()]
        };
        Self {
            agents,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Next agent in rotation order
    pub fn next(&self) -> &str {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        &self.agents[idx]
    }
}

/// Builds the HTTP client shared by all workers of a run
///
/// # Example
///
/// ```no_run
/// use harvestman::config::CrawlConfig;
/// use harvestman::crawler::build_http_client;
///
/// let config = CrawlConfig::default();
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &CrawlConfig) -> Result<Client, reqwest::Error> {
    let redirect = if config.follow_redirects {
        Policy::limited(10)
    } else {
        Policy::none()
    };

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(redirect)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, retrying transient failures
///
/// # Retry Policy
///
/// | Condition | Action |
/// |-----------|--------|
/// | Timeout | Retry up to 3 attempts, exponential backoff |
/// | Connection error | Retry up to 3 attempts, exponential backoff |
/// | HTTP 5xx | Retry up to 3 attempts, exponential backoff |
/// | HTTP 4xx | Immediate failure, never retried |
/// | Body over size limit | Immediate failure |
///
/// Backoff starts at 500ms and doubles per attempt, never dropping below
/// the configured per-host delay (a retry is another request to the same
/// host and owes it the same courtesy). Redirects are handled by the
/// client per the configured policy; `final_url` in the outcome is the
/// URL the body was actually served from.
pub async fn fetch(
    client: &Client,
    agents: &UserAgentPool,
    config: &CrawlConfig,
    url: &Url,
) -> Result<FetchOutcome, FetchFailure> {
    let mut last_failure = None;

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            let backoff = retry_backoff(attempt, config);
            tracing::debug!("Retrying {} (attempt {}) after {:?}", url, attempt, backoff);
            tokio::time::sleep(backoff).await;
        }

        match attempt_fetch(client, agents, config, url).await {
            Ok(outcome) => return Ok(outcome),
            Err(failure) if failure.is_transient() && attempt < MAX_ATTEMPTS => {
                last_failure = Some(failure);
            }
            Err(failure) => return Err(failure),
        }
    }

    // Unreachable: the loop always returns on the last attempt
    Err(last_failure.unwrap_or(FetchFailure {
        kind: FetchFailureKind::Other,
        message: "fetch attempts exhausted".to_string(),
    }))
}

/// Delay before retry `attempt` (2-based): exponential, floored at the
/// per-host delay so retries respect host pacing
fn retry_backoff(attempt: u32, config: &CrawlConfig) -> Duration {
    let exponential = BACKOFF_BASE * 2u32.pow(attempt - 2);
    exponential.max(config.per_host_delay())
}

async fn attempt_fetch(
    client: &Client,
    agents: &UserAgentPool,
    config: &CrawlConfig,
    url: &Url,
) -> Result<FetchOutcome, FetchFailure> {
    let response = client
        .get(url.clone())
        .header(reqwest::header::USER_AGENT, agents.next())
        .send()
        .await
        .map_err(|e| FetchFailure::from_reqwest(&e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchFailure::status(status));
    }

    if let Some(len) = response.content_length() {
        if len > config.max_body_bytes {
            return Err(FetchFailure::too_large(config.max_body_bytes));
        }
    }

    let final_url = response.url().clone();
    let headers = response.headers().clone();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchFailure::from_reqwest(&e))?;

    // Content-Length can be absent or lie; re-check the actual body
    if bytes.len() as u64 > config.max_body_bytes {
        return Err(FetchFailure::too_large(config.max_body_bytes));
    }

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let content_hash = hex::encode(hasher.finalize());

    Ok(FetchOutcome {
        final_url,
        status: status.as_u16(),
        headers,
        body: bytes.to_vec(),
        content_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&CrawlConfig::default()).is_ok());
    }

    #[test]
    fn test_build_client_without_redirects() {
        let config = CrawlConfig {
            follow_redirects: false,
            ..CrawlConfig::default()
        };
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_fixed_agent_pool() {
        let config = CrawlConfig {
            user_agent: "TestBot/1.0".to_string(),
            ..CrawlConfig::default()
        };
        let pool = UserAgentPool::from_config(&config);
        assert_eq!(pool.next(), "TestBot/1.0");
        assert_eq!(pool.next(), "TestBot/1.0");
    }

    #[test]
    fn test_rotating_agent_pool_cycles() {
        let config = CrawlConfig {
            rotate_user_agents: true,
            ..CrawlConfig::default()
        };
        let pool = UserAgentPool::from_config(&config);

        let first = pool.next().to_string();
        let second = pool.next().to_string();
        assert_ne!(first, second);

        // Wraps back around after a full cycle
        for _ in 2..ROTATING_USER_AGENTS.len() {
            pool.next();
        }
        assert_eq!(pool.next(), first);
    }

    #[test]
    fn test_transient_classification() {
        let timeout = FetchFailure {
            kind: FetchFailureKind::Timeout,
            message: String::new(),
        };
        assert!(timeout.is_transient());

        let server_error = FetchFailure {
            kind: FetchFailureKind::HttpStatus(503),
            message: String::new(),
        };
        assert!(server_error.is_transient());

        let not_found = FetchFailure {
            kind: FetchFailureKind::HttpStatus(404),
            message: String::new(),
        };
        assert!(!not_found.is_transient());

        let too_large = FetchFailure {
            kind: FetchFailureKind::TooLarge,
            message: String::new(),
        };
        assert!(!too_large.is_transient());
    }

    #[test]
    fn test_failure_display() {
        let failure = FetchFailure {
            kind: FetchFailureKind::HttpStatus(404),
            message: "Not Found".to_string(),
        };
        assert_eq!(failure.to_string(), "http 404: Not Found");
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let config = CrawlConfig {
            per_host_delay_ms: 0,
            ..CrawlConfig::default()
        };
        assert_eq!(retry_backoff(2, &config), Duration::from_millis(500));
        assert_eq!(retry_backoff(3, &config), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_floored_at_per_host_delay() {
        let config = CrawlConfig {
            per_host_delay_ms: 800,
            ..CrawlConfig::default()
        };
        assert_eq!(retry_backoff(2, &config), Duration::from_millis(800));
        // Once the exponential delay exceeds the floor, it wins
        assert_eq!(retry_backoff(3, &config), Duration::from_millis(1000));
    }

    #[test]
    fn test_content_type_from_headers() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "text/html; charset=utf-8".parse().unwrap(),
        );
        let outcome = FetchOutcome {
            final_url: Url::parse("https://example.com/").unwrap(),
            status: 200,
            headers,
            body: Vec::new(),
            content_hash: String::new(),
        };
        assert_eq!(outcome.content_type(), "text/html; charset=utf-8");
    }

    #[test]
    fn test_content_type_missing_header() {
        let outcome = FetchOutcome {
            final_url: Url::parse("https://example.com/").unwrap(),
            status: 200,
            headers: reqwest::header::HeaderMap::new(),
            body: Vec::new(),
            content_hash: String::new(),
        };
        assert_eq!(outcome.content_type(), "");
    }

    // Network behavior (retry-then-success, size limit enforcement) is
    // covered by the wiremock integration tests.
}
