pub mod browser;
pub mod extractor;


use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use ureq::Agent;
use url::Url;

use crate::config::ConfigError;
use crate::config::settings::{validate_retry_attempts, validate_timeout};
use crate::http::{RetryPolicy, build_agent, run_blocking, send_with_retry};
use crate::{AssistantError, Result};

/// Configuration for fetching product pages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    /// User agent string to use for requests
    pub user_agent: String,
    /// Timeout for HTTP requests in seconds
    pub timeout_seconds: u64,
    /// Maximum number of attempts for retryable errors
    pub retry_attempts: u32,
    /// Base delay between attempts, doubled after each failure
    pub retry_backoff_ms: u64,
}

impl Default for FetchConfig {
    #[inline]
    fn default() -> Self {
        Self {
            user_agent: "partselect-assistant/0.1.0 (Product Page Indexer)".to_string(),
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl FetchConfig {
    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyField("user_agent"));
        }
        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    #[inline]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }
}

/// A fetched page, reduced to its text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: Url,
    pub title: Option<String>,
    /// Text content in document order, before cleaning
    pub content: String,
}

/// Turns a product URL into page text
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Document>;
}

/// Plain HTTP page fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: Agent,
    retry: RetryPolicy,
}

impl HttpFetcher {
    #[inline]
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            agent: build_agent(config.timeout(), Some(&config.user_agent)),
            retry: config.retry_policy(),
        }
    }

    fn fetch_html(&self, url: &Url) -> anyhow::Result<String> {
        debug!("Making HTTP GET request to: {}", url);
        let body = send_with_retry(self.retry, url.as_str(), || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut response| response.body_mut().read_to_string())
        })
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("Failed to fetch {}", url))?;

        debug!("Successfully read {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

impl Default for HttpFetcher {
    #[inline]
    fn default() -> Self {
        Self::new(&FetchConfig::default())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Document> {
        let fetcher = self.clone();
        let target = url.clone();
        let html = run_blocking(move || fetcher.fetch_html(&target))
            .await
            .map_err(|e| AssistantError::Fetch(format!("{:#}", e)))?;

        let content = extractor::page_text(&html);
        let title = extractor::page_title(&html);
        info!(
            "Fetched {} ({} chars of text, title: {:?})",
            url,
            content.chars().count(),
            title
        );

        Ok(Document {
            url: url.clone(),
            title,
            content,
        })
    }
}

/// Validate and normalize a URL
#[inline]
pub fn validate_url(url_str: &str) -> anyhow::Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL format: {}", url_str))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {}", url_str));
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {}", url_str));
    }

    Ok(url)
}
