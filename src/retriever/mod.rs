// Retriever module
// Similarity search over the shared index with bounded retries on empty results


use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::config::settings::validate_retry_attempts;
use crate::database::ScoredText;
use crate::http::RetryPolicy;
use crate::indexer::VectorIndexHandle;
use crate::{AssistantError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 3,
            max_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.top_k == 0 || self.top_k > 100 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        validate_retry_attempts(self.max_attempts)
    }

    #[inline]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }
}

/// Passages returned for one query, most similar first
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetrievalResult {
    pub passages: Vec<ScoredText>,
}

impl RetrievalResult {
    #[inline]
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passage texts joined by single spaces, in rank order
    #[inline]
    pub fn context(&self) -> String {
        self.passages.iter().map(|p| p.text.as_str()).join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Retriever {
    config: RetrievalConfig,
}

impl Retriever {
    #[inline]
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Search `handle` for `query`, repeating the identical search while it comes back empty.
    ///
    /// The query is embedded once. Errors from the embedding provider or the index
    /// are returned immediately; only emptiness is retried.
    #[inline]
    pub async fn retrieve(&self, handle: &VectorIndexHandle, query: &str) -> Result<RetrievalResult> {
        let vector = handle.embed_query(query).await?;
        let policy = self.config.retry_policy();

        for attempt in 1..=policy.attempts {
            let passages = handle.search_by_vector(&vector, self.config.top_k).await?;
            if !passages.is_empty() {
                info!(
                    "Retrieved {} passages from '{}' on attempt {}",
                    passages.len(),
                    handle.name(),
                    attempt
                );
                return Ok(RetrievalResult { passages });
            }

            if attempt < policy.attempts {
                let delay = policy.delay_after(attempt);
                debug!(
                    "Search of '{}' came back empty (attempt {}/{}), retrying in {:?}",
                    handle.name(),
                    attempt,
                    policy.attempts,
                    delay
                );
                sleep(delay).await;
            }
        }

        warn!(
            "Search of '{}' stayed empty after {} attempts",
            handle.name(),
            policy.attempts
        );
        Err(AssistantError::RetrievalStall {
            attempts: policy.attempts,
        })
    }
}
