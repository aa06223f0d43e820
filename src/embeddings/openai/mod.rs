#[cfg(test)]
mod tests;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::EmbeddingProvider;
use crate::config::{ConfigError, OpenAiConfig};
use crate::conversation::{CompletionProvider, Turn};
use crate::http::{HttpError, RetryPolicy, build_agent, run_blocking, send_with_retry};
use crate::{AssistantError, Result};

/// Client for the OpenAI embeddings and chat completions endpoints
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    batch_size: u32,
    dimension: Option<usize>,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &OpenAiConfig) -> std::result::Result<Self, ConfigError> {
        let api_key = config.resolve_api_key()?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(
        config: &OpenAiConfig,
        api_key: String,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            base_url: config.base_url()?,
            api_key,
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            batch_size: config.batch_size.max(1),
            dimension: None,
            agent: build_agent(config.timeout(), None),
            retry: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_backoff_ms),
            ),
        })
    }

    /// Reject embeddings whose length differs from `dimension`
    #[inline]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .with_context(|| format!("Failed to build OpenAI URL for {}", path))
    }

    fn post(&self, url: &Url, body: &str) -> std::result::Result<String, HttpError> {
        let authorization = format!("Bearer {}", self.api_key);
        send_with_retry(self.retry, url.as_str(), || {
            self.agent
                .post(url.as_str())
                .header("Authorization", authorization.as_str())
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn embed_single_batch(&self, url: &Url, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let response_text = self
            .post(url, &request_json)
            .map_err(|e| anyhow!(e))
            .context("Failed to generate embeddings")?;
        let mut response: EmbeddingResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        if response.data.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        response.data.sort_by_key(|item| item.index);
        let embeddings: Vec<Vec<f32>> = response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect();

        if let Some(expected) = self.dimension {
            if let Some(wrong) = embeddings.iter().find(|e| e.len() != expected) {
                return Err(anyhow!(
                    "Embedding has {} dimensions, index expects {}",
                    wrong.len(),
                    expected
                ));
            }
        }

        Ok(embeddings)
    }

    fn embed_blocking(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("embeddings")?;
        let mut results = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size as usize) {
            let embeddings = self
                .embed_single_batch(&url, batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            results.extend(embeddings);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    fn complete_blocking(&self, turns: &[Turn]) -> anyhow::Result<String> {
        let url = self.endpoint("chat/completions")?;
        let request = ChatRequest {
            model: &self.chat_model,
            messages: turns,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        let response_text = self
            .post(&url, &request_json)
            .map_err(|e| anyhow!(e))
            .context("Chat completion request failed")?;
        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Chat response contained no message content"))?;

        info!(
            "Completion from {} ({} turns in, {} chars out)",
            self.chat_model,
            turns.len(),
            content.len()
        );
        Ok(content)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = self.clone();
        let texts = texts.to_vec();
        run_blocking(move || client.embed_blocking(&texts))
            .await
            .map_err(|e| AssistantError::Embedding(format!("{:#}", e)))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        let client = self.clone();
        let turns = turns.to_vec();
        run_blocking(move || client.complete_blocking(&turns))
            .await
            .map_err(|e| AssistantError::Completion(format!("{:#}", e)))
    }
}
