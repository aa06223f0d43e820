// Indexer module
// Turns a product page into embedded chunks in the shared vector index


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::VectorStoreConfig;
use crate::crawler::PageFetcher;
use crate::crawler::extractor::clean_page_text;
use crate::database::{IndexDescription, IndexSpec, ScoredText, VectorIndexService, VectorRecord};
use crate::embeddings::{ChunkingConfig, EmbeddingProvider, chunk_text, select_window};
use crate::{AssistantError, Result};

/// Bounded exponential backoff used while waiting for a new index to become ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReadinessPolicy {
    #[inline]
    fn default() -> Self {
        Self::from_config(&VectorStoreConfig::default())
    }
}

impl ReadinessPolicy {
    #[inline]
    pub fn from_config(config: &VectorStoreConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.readiness_poll_interval_ms),
            max_interval: Duration::from_millis(config.readiness_max_interval_ms),
            max_attempts: config.readiness_max_attempts.max(1),
        }
    }

    /// Wait before readiness check `attempt + 1`, doubling from the initial interval up to the cap
    #[inline]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }
}

/// Stable record id: re-indexing the same chunk of the same page overwrites it
#[inline]
pub fn record_id(source_url: &Url, text: &str) -> String {
    let key = format!("{}\n{}", source_url, text);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// Read access to the named index for similarity search
#[derive(Clone)]
pub struct VectorIndexHandle {
    service: Arc<dyn VectorIndexService>,
    embeddings: Arc<dyn EmbeddingProvider>,
    name: String,
}

impl fmt::Debug for VectorIndexHandle {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndexHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl VectorIndexHandle {
    #[inline]
    pub fn new(
        service: Arc<dyn VectorIndexService>,
        embeddings: Arc<dyn EmbeddingProvider>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            embeddings,
            name: name.into(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embeddings.embed_query(query).await
    }

    #[inline]
    pub async fn search_by_vector(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredText>> {
        self.service.query(&self.name, vector, top_k).await
    }

    /// Embed `query` and return the `top_k` most similar chunks
    #[inline]
    pub async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredText>> {
        let vector = self.embed_query(query).await?;
        self.search_by_vector(&vector, top_k).await
    }
}

/// Result of indexing one page
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub handle: VectorIndexHandle,
    pub title: Option<String>,
    pub total_chunks: usize,
    pub upserted: usize,
}

/// Fetches, cleans, chunks and embeds product pages into one shared index
pub struct ContentIndexer {
    service: Arc<dyn VectorIndexService>,
    embeddings: Arc<dyn EmbeddingProvider>,
    fetcher: Arc<dyn PageFetcher>,
    spec: IndexSpec,
    chunking: ChunkingConfig,
    readiness: ReadinessPolicy,
    propagation_delay: Duration,
}

impl ContentIndexer {
    #[inline]
    pub fn new(
        service: Arc<dyn VectorIndexService>,
        embeddings: Arc<dyn EmbeddingProvider>,
        fetcher: Arc<dyn PageFetcher>,
        store: &VectorStoreConfig,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            service,
            embeddings,
            fetcher,
            spec: store.index_spec(),
            chunking,
            readiness: ReadinessPolicy::from_config(store),
            propagation_delay: Duration::from_millis(store.propagation_delay_ms),
        }
    }

    #[inline]
    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    #[inline]
    pub fn handle(&self) -> VectorIndexHandle {
        VectorIndexHandle::new(
            Arc::clone(&self.service),
            Arc::clone(&self.embeddings),
            self.spec.name.as_str(),
        )
    }

    /// Create the index if it is missing and wait until it reports ready
    #[inline]
    pub async fn ensure_index(&self) -> Result<IndexDescription> {
        let existing = self.service.list_indexes().await?;
        if existing.iter().any(|name| *name == self.spec.name) {
            debug!("Index '{}' already exists", self.spec.name);
        } else {
            info!(
                "Creating index '{}' ({} dimensions, {} metric, {}/{})",
                self.spec.name,
                self.spec.dimension,
                self.spec.metric,
                self.spec.cloud,
                self.spec.region
            );
            self.service.create_index(&self.spec).await?;
        }

        self.wait_until_ready().await
    }

    async fn wait_until_ready(&self) -> Result<IndexDescription> {
        let attempts = self.readiness.max_attempts;

        for attempt in 1..=attempts {
            let description = self.service.describe_index(&self.spec.name).await?;
            if description.dimension != self.spec.dimension {
                return Err(AssistantError::IndexProvision(format!(
                    "Index '{}' has dimension {}, expected {}",
                    description.name, description.dimension, self.spec.dimension
                )));
            }
            if description.ready {
                debug!("Index '{}' ready after {} checks", self.spec.name, attempt);
                return Ok(description);
            }
            if attempt < attempts {
                let delay = self.readiness.delay_after(attempt);
                debug!(
                    "Index '{}' not ready (check {}/{}), waiting {:?}",
                    self.spec.name, attempt, attempts, delay
                );
                sleep(delay).await;
            }
        }

        Err(AssistantError::IndexProvision(format!(
            "Index '{}' was not ready after {} checks",
            self.spec.name, attempts
        )))
    }

    /// Index `url` and return a handle to search the shared index
    #[inline]
    pub async fn index(&self, url: &Url) -> Result<VectorIndexHandle> {
        self.index_page(url).await.map(|outcome| outcome.handle)
    }

    #[inline]
    pub async fn index_page(&self, url: &Url) -> Result<IndexOutcome> {
        self.ensure_index().await?;
        let handle = self.handle();
        if !self.propagation_delay.is_zero() {
            debug!(
                "Waiting {:?} for index '{}' to settle",
                self.propagation_delay,
                handle.name()
            );
            sleep(self.propagation_delay).await;
        }

        let document = self.fetcher.fetch(url).await?;
        let cleaned = clean_page_text(&document.content);
        let chunks = chunk_text(&cleaned, &self.chunking);
        let window = select_window(&chunks, &self.chunking);
        info!(
            "Split {} into {} chunks, keeping {}",
            url,
            chunks.len(),
            window.len()
        );

        let texts: Vec<String> = window.iter().map(|chunk| chunk.text.clone()).collect();
        let upserted = if texts.is_empty() {
            warn!("No text to index on {}", url);
            0
        } else {
            let vectors = self.embeddings.embed_documents(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(AssistantError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    vectors.len()
                )));
            }

            let source_url = url.to_string();
            let records: Vec<VectorRecord> = texts
                .into_iter()
                .zip(vectors)
                .map(|(text, values)| VectorRecord {
                    id: record_id(url, &text),
                    values,
                    text,
                    source_url: source_url.clone(),
                })
                .collect();
            self.service.upsert(&self.spec.name, records).await?
        };

        Ok(IndexOutcome {
            handle,
            title: document.title,
            total_chunks: chunks.len(),
            upserted,
        })
    }
}
