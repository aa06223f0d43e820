// Pinecone REST client
// Control plane (list/create/describe) plus the per-index data plane (upsert/query)


use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use url::Url;

use super::{IndexDescription, IndexSpec, Metric, ScoredText, VectorIndexService, VectorRecord};
use crate::config::{ConfigError, VectorStoreConfig};
use crate::http::{HttpError, RetryPolicy, build_agent, run_blocking, send_with_retry};
use crate::{AssistantError, Result};

const API_VERSION: &str = "2024-07";
const UPSERT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct PineconeClient {
    controller_url: Url,
    api_key: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
    hosts: Arc<Mutex<HashMap<String, String>>>,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    dimension: Option<usize>,
    metric: Option<String>,
    host: Option<String>,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    state: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'static str,
    spec: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    serverless: ServerlessLocation<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessLocation<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorMetadata {
    text: String,
    #[serde(default)]
    source: String,
}

#[derive(Debug, Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: VectorMetadata,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<VectorMetadata>,
}

impl PineconeClient {
    #[inline]
    pub fn new(config: &VectorStoreConfig) -> std::result::Result<Self, ConfigError> {
        let api_key = config.resolve_api_key()?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(
        config: &VectorStoreConfig,
        api_key: String,
    ) -> std::result::Result<Self, ConfigError> {
        let controller_url = Url::parse(&config.controller_url)
            .map_err(|_| ConfigError::InvalidUrl(config.controller_url.clone()))?;

        Ok(Self {
            controller_url,
            api_key,
            agent: build_agent(config.timeout(), None),
            retry: RetryPolicy::default(),
            hosts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn controller(&self, path: &str) -> anyhow::Result<Url> {
        self.controller_url
            .join(path)
            .with_context(|| format!("Failed to build Pinecone URL for {}", path))
    }

    fn get(&self, url: &Url) -> std::result::Result<String, HttpError> {
        send_with_retry(self.retry, url.as_str(), || {
            self.agent
                .get(url.as_str())
                .header("Api-Key", self.api_key.as_str())
                .header("X-Pinecone-API-Version", API_VERSION)
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn post(&self, url: &Url, body: &str) -> std::result::Result<String, HttpError> {
        send_with_retry(self.retry, url.as_str(), || {
            self.agent
                .post(url.as_str())
                .header("Api-Key", self.api_key.as_str())
                .header("X-Pinecone-API-Version", API_VERSION)
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn list_indexes_blocking(&self) -> anyhow::Result<Vec<String>> {
        let url = self.controller("/indexes")?;
        let body = self.get(&url).context("Failed to list Pinecone indexes")?;
        let list: IndexList =
            serde_json::from_str(&body).context("Failed to parse index list response")?;
        Ok(list.indexes.into_iter().map(|index| index.name).collect())
    }

    fn create_index_blocking(&self, spec: &IndexSpec) -> anyhow::Result<()> {
        let url = self.controller("/indexes")?;
        let request = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric.as_str(),
            spec: ServerlessSpec {
                serverless: ServerlessLocation {
                    cloud: &spec.cloud,
                    region: &spec.region,
                },
            },
        };
        let body =
            serde_json::to_string(&request).context("Failed to serialize create index request")?;

        match self.post(&url, &body) {
            Ok(_) => {
                info!(
                    "Requested creation of index '{}' ({} dims, {})",
                    spec.name, spec.dimension, spec.metric
                );
                Ok(())
            }
            Err(HttpError::Status(409)) => {
                debug!("Index '{}' already exists", spec.name);
                Ok(())
            }
            Err(e) => Err(anyhow!(e)).context("Failed to create Pinecone index"),
        }
    }

    fn describe_index_blocking(&self, name: &str) -> anyhow::Result<IndexDescription> {
        let url = self.controller(&format!("/indexes/{}", name))?;
        let body = match self.get(&url) {
            Ok(body) => body,
            Err(HttpError::Status(404)) => return Err(anyhow!("Index '{}' does not exist", name)),
            Err(e) => return Err(anyhow!(e)).context("Failed to describe Pinecone index"),
        };
        let model: IndexModel =
            serde_json::from_str(&body).context("Failed to parse describe index response")?;

        if let Some(host) = model.host.as_deref().filter(|h| !h.is_empty()) {
            self.remember_host(name, host);
        }

        debug!(
            "Index '{}' state: {:?} (ready: {})",
            name, model.status.state, model.status.ready
        );

        Ok(IndexDescription {
            name: model.name,
            dimension: model.dimension.unwrap_or_default(),
            metric: model
                .metric
                .as_deref()
                .and_then(Metric::parse)
                .unwrap_or_default(),
            ready: model.status.ready,
        })
    }

    fn remember_host(&self, name: &str, host: &str) {
        if let Ok(mut hosts) = self.hosts.lock() {
            hosts.insert(name.to_string(), host.to_string());
        }
    }

    /// Resolve the data plane URL for an index, describing it on first use
    fn data_plane(&self, index: &str, path: &str) -> anyhow::Result<Url> {
        let cached = self
            .hosts
            .lock()
            .map_err(|e| anyhow!("Host cache lock poisoned: {}", e))?
            .get(index)
            .cloned();

        let host = match cached {
            Some(host) => host,
            None => {
                self.describe_index_blocking(index)?;
                self.hosts
                    .lock()
                    .map_err(|e| anyhow!("Host cache lock poisoned: {}", e))?
                    .get(index)
                    .cloned()
                    .ok_or_else(|| anyhow!("Index '{}' has no data plane host yet", index))?
            }
        };

        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };

        Url::parse(&base)
            .and_then(|url| url.join(path))
            .with_context(|| format!("Invalid data plane host for index '{}': {}", index, base))
    }

    fn upsert_blocking(&self, index: &str, records: &[VectorRecord]) -> anyhow::Result<usize> {
        let url = self.data_plane(index, "/vectors/upsert")?;
        let mut written = 0;

        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|record| UpsertVector {
                        id: &record.id,
                        values: &record.values,
                        metadata: VectorMetadata {
                            text: record.text.clone(),
                            source: record.source_url.clone(),
                        },
                    })
                    .collect(),
            };
            let body =
                serde_json::to_string(&request).context("Failed to serialize upsert request")?;
            let response = self
                .post(&url, &body)
                .map_err(|e| anyhow!(e))
                .with_context(|| format!("Failed to upsert {} vectors", batch.len()))?;
            let parsed: UpsertResponse =
                serde_json::from_str(&response).context("Failed to parse upsert response")?;
            written += parsed.upserted_count;
        }

        debug!("Upserted {} vectors into '{}'", written, index);
        Ok(written)
    }

    fn query_blocking(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
    ) -> anyhow::Result<Vec<ScoredText>> {
        let url = self.data_plane(index, "/query")?;
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };
        let body = serde_json::to_string(&request).context("Failed to serialize query request")?;
        let response = self
            .post(&url, &body)
            .map_err(|e| anyhow!(e))
            .context("Failed to query index")?;
        let parsed: QueryResponse =
            serde_json::from_str(&response).context("Failed to parse query response")?;

        Ok(parsed
            .matches
            .into_iter()
            .filter_map(|m| {
                let metadata = m.metadata?;
                Some(ScoredText {
                    id: m.id,
                    text: metadata.text,
                    score: m.score,
                })
            })
            .collect())
    }
}

fn provision_error(error: &anyhow::Error) -> AssistantError {
    AssistantError::IndexProvision(format!("{:#}", error))
}

fn data_error(error: &anyhow::Error) -> AssistantError {
    AssistantError::VectorIndex(format!("{:#}", error))
}

#[async_trait]
impl VectorIndexService for PineconeClient {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let client = self.clone();
        run_blocking(move || client.list_indexes_blocking())
            .await
            .map_err(|e| provision_error(&e))
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let client = self.clone();
        let spec = spec.clone();
        run_blocking(move || client.create_index_blocking(&spec))
            .await
            .map_err(|e| provision_error(&e))
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let client = self.clone();
        let name = name.to_string();
        run_blocking(move || client.describe_index_blocking(&name))
            .await
            .map_err(|e| provision_error(&e))
    }

    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let client = self.clone();
        let index = index.to_string();
        run_blocking(move || client.upsert_blocking(&index, &records))
            .await
            .map_err(|e| data_error(&e))
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredText>> {
        let client = self.clone();
        let index = index.to_string();
        let vector = vector.to_vec();
        run_blocking(move || client.query_blocking(&index, &vector, top_k))
            .await
            .map_err(|e| data_error(&e))
    }
}
