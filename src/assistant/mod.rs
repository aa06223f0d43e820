// Assistant module
// Sequences keyword extraction, page lookup, indexing, retrieval and answering

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, IndexBackend};
use crate::conversation::{ConversationEngine, MemoryConversationStore, SessionId};
use crate::crawler::HttpFetcher;
use crate::crawler::browser::{ChromeLocator, PageLocator};
use crate::database::{LanceIndexService, MemoryIndexService, PineconeClient, VectorIndexService};
use crate::embeddings::{EmbeddingProvider, OpenAiClient};
use crate::indexer::ContentIndexer;
use crate::keyword::extract;
use crate::prompt::augment;
use crate::retriever::Retriever;
use crate::{AssistantError, Result};

/// Open the vector index service selected by `config`
#[inline]
pub async fn open_index_service(config: &Config) -> Result<Arc<dyn VectorIndexService>> {
    let service: Arc<dyn VectorIndexService> = match config.vector_store.backend {
        IndexBackend::Pinecone => Arc::new(
            PineconeClient::new(&config.vector_store)
                .map_err(|e| AssistantError::Config(e.to_string()))?,
        ),
        IndexBackend::LanceDb => Arc::new(
            LanceIndexService::new(&config.vector_database_path(), config.vector_store.metric)
                .await?,
        ),
        IndexBackend::Memory => Arc::new(MemoryIndexService::new()),
    };
    info!("Using {} vector index backend", config.vector_store.backend);
    Ok(service)
}

/// OpenAI client for both embeddings and chat, checked against the index dimension
#[inline]
pub fn openai_client(config: &Config) -> Result<Arc<OpenAiClient>> {
    let client = OpenAiClient::new(&config.openai)
        .map_err(|e| AssistantError::Config(e.to_string()))?
        .with_dimension(config.vector_store.dimension);
    Ok(Arc::new(client))
}

/// Content indexer over the configured backend, fetching pages over HTTP
#[inline]
pub async fn content_indexer(
    config: &Config,
    embeddings: Arc<dyn EmbeddingProvider>,
) -> Result<ContentIndexer> {
    Ok(ContentIndexer::new(
        open_index_service(config).await?,
        embeddings,
        Arc::new(HttpFetcher::new(&config.fetch)),
        &config.vector_store,
        config.chunking.clone(),
    ))
}

/// Answers questions, pulling product page context in when the question names a part or model
pub struct QueryOrchestrator {
    locator: Arc<dyn PageLocator>,
    indexer: ContentIndexer,
    retriever: Retriever,
    engine: ConversationEngine,
}

impl QueryOrchestrator {
    #[inline]
    pub fn new(
        locator: Arc<dyn PageLocator>,
        indexer: ContentIndexer,
        retriever: Retriever,
        engine: ConversationEngine,
    ) -> Self {
        Self {
            locator,
            indexer,
            retriever,
            engine,
        }
    }

    /// Wire up the production providers described by `config`
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let openai = openai_client(config)?;
        let indexer = content_indexer(config, Arc::clone(&openai) as Arc<dyn EmbeddingProvider>).await?;
        let engine = ConversationEngine::new(openai, Arc::new(MemoryConversationStore::new()));

        Ok(Self::new(
            Arc::new(ChromeLocator::new(config.browser.clone())),
            indexer,
            Retriever::new(config.retrieval.clone()),
            engine,
        ))
    }

    #[inline]
    pub fn indexer(&self) -> &ContentIndexer {
        &self.indexer
    }

    #[inline]
    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Run the retrieval pipeline for `query`.
    ///
    /// Returns `Ok(None)` when the query names no part or model; the caller is
    /// expected to answer it with [`ConversationEngine::respond`]. Every query
    /// with a keyword locates and re-indexes its page.
    #[inline]
    pub async fn handle(&self, session: &SessionId, query: &str) -> Result<Option<String>> {
        let Some(keyword) = extract(query) else {
            info!("No part number or model in query");
            return Ok(None);
        };
        info!("Extracted {:?} keyword '{}'", keyword.kind, keyword);

        let url = self.locator.locate(keyword.as_str()).await?;
        let handle = self.indexer.index(&url).await?;
        let retrieved = self.retriever.retrieve(&handle, query).await?;
        let prompt = augment(&retrieved.context(), query);

        Ok(Some(self.engine.respond(session, &prompt).await))
    }

    /// Always produce an answer: pipeline failures degrade to answering the raw query
    #[inline]
    pub async fn answer(&self, session: &SessionId, query: &str) -> String {
        match self.handle(session, query).await {
            Ok(Some(answer)) => answer,
            Ok(None) => self.engine.respond(session, query).await,
            Err(e) => {
                warn!("Context lookup failed, answering without it: {}", e);
                self.engine.respond(session, query).await
            }
        }
    }
}
