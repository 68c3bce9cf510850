use std::time::Duration;

use async_trait::async_trait;
use rand::Rng as _;
use rand::seq::IndexedRandom as _;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

use crate::model::ScrapedWine;
use crate::normalize::normalize_wine_page;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_LANGUAGE_FR: &str = "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7";

pub const USER_AGENTS: [&str; 15] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 11.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Body fragments served by anti-bot interstitials instead of the listing.
pub const CHALLENGE_MARKERS: [&str; 4] = ["challenge.js", "awswaf.com", "cf-challenge", "Just a moment"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const NONE: Self = Self {
        min_ms: 0,
        max_ms: 0,
    };

    pub fn sample(self) -> Duration {
        let (lo, hi) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };
        if lo == hi {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// Jitter slept before the first attempt.
    pub initial_delay: DelayRange,
    /// Backoff slept before every retry.
    pub retry_delay: DelayRange,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            max_retries: 5,
            initial_delay: DelayRange {
                min_ms: 500,
                max_ms: 1500,
            },
            retry_delay: DelayRange {
                min_ms: 3000,
                max_ms: 8000,
            },
        }
    }
}

impl FetchSettings {
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            self.initial_delay.sample()
        } else {
            self.retry_delay.sample()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid wine url: {0:?}")]
    InvalidUrl(String),
    #[error("request to {url} timed out after {attempts} attempts")]
    Timeout { url: String, attempts: u32 },
    #[error("http status {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("build http client: {0}")]
    Client(String),
}

/// Anything that can turn a listing URL into wine data.
#[async_trait]
pub trait WineSource: Send + Sync {
    /// `Ok(None)` means the page was reachable but yielded no wine data.
    async fn fetch_wine(&self, url: &str) -> Result<Option<ScrapedWine>, FetchError>;
}

/// Result of a single HTTP attempt, before the retry policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Page(String),
    Challenge,
    Timeout,
    Throttled(u16),
    Status(u16),
    Network(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Finish,
}

/// Timeouts, 429/503 and challenge pages are retried until `max_retries`
/// retries have been spent; everything else finishes immediately.
pub fn retry_decision(outcome: &AttemptOutcome, attempt: u32, max_retries: u32) -> RetryDecision {
    let retryable = matches!(
        outcome,
        AttemptOutcome::Challenge | AttemptOutcome::Timeout | AttemptOutcome::Throttled(_)
    );
    if retryable && attempt < max_retries {
        RetryDecision::Retry
    } else {
        RetryDecision::Finish
    }
}

/// Drops anything before the first `http`, then validates the remainder.
pub fn normalize_source_url(raw: &str) -> Result<String, FetchError> {
    let Some(start) = raw.find("http") else {
        return Err(FetchError::InvalidUrl(raw.to_owned()));
    };
    let candidate = raw[start..].trim();
    let parsed =
        url::Url::parse(candidate).map_err(|_| FetchError::InvalidUrl(raw.to_owned()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::InvalidUrl(raw.to_owned()));
    }
    Ok(candidate.to_owned())
}

pub fn is_challenge_page(body: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|marker| body.contains(marker))
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[derive(Debug, Clone)]
pub struct ReqwestWineFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestWineFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;
        Ok(Self { client, settings })
    }

    async fn attempt(&self, url: &str) -> AttemptOutcome {
        let response = match self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_FR)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return classify_transport_error(err),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return AttemptOutcome::Throttled(status.as_u16());
        }
        if !status.is_success() {
            return AttemptOutcome::Status(status.as_u16());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return classify_transport_error(err),
        };
        if is_challenge_page(&body) {
            return AttemptOutcome::Challenge;
        }
        AttemptOutcome::Page(body)
    }
}

fn classify_transport_error(err: reqwest::Error) -> AttemptOutcome {
    if err.is_timeout() {
        AttemptOutcome::Timeout
    } else {
        AttemptOutcome::Network(err.to_string())
    }
}

#[async_trait]
impl WineSource for ReqwestWineFetcher {
    async fn fetch_wine(&self, url: &str) -> Result<Option<ScrapedWine>, FetchError> {
        let url = normalize_source_url(url)?;
        let max_retries = self.settings.max_retries;

        let mut attempt = 0u32;
        loop {
            let delay = self.settings.delay_before(attempt);
            if attempt > 0 {
                tracing::debug!(%url, attempt, max_retries, ?delay, "retrying wine page fetch");
            }
            tokio::time::sleep(delay).await;

            let outcome = self.attempt(&url).await;
            if retry_decision(&outcome, attempt, max_retries) == RetryDecision::Retry {
                tracing::warn!(%url, attempt = attempt + 1, max_retries, ?outcome, "wine page fetch will be retried");
                attempt += 1;
                continue;
            }

            let attempts = attempt + 1;
            return match outcome {
                AttemptOutcome::Page(html) => Ok(normalize_wine_page(&html, &url)),
                AttemptOutcome::Challenge => {
                    tracing::warn!(%url, attempts, "challenge page persisted; giving up for now");
                    Ok(None)
                }
                AttemptOutcome::Timeout => Err(FetchError::Timeout { url, attempts }),
                AttemptOutcome::Throttled(status) | AttemptOutcome::Status(status) => {
                    Err(FetchError::HttpStatus { url, status })
                }
                AttemptOutcome::Network(message) => Err(FetchError::Network { url, message }),
            };
        }
    }
}
