// Embeddings module
// Content chunking plus the embedding provider seam and its OpenAI implementation

pub mod chunking;
pub mod openai;

use async_trait::async_trait;

use crate::{AssistantError, Result};

pub use chunking::{Chunk, ChunkingConfig, RecursiveSplitter, chunk_text, select_window};
pub use openai::OpenAiClient;

/// Turns text into fixed-length vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed several texts, returning one vector per input in input order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AssistantError::Embedding("Provider returned no embedding".to_string()))
    }
}
