// Vector index module
// A narrow service interface over the vector database, with remote (Pinecone),
// local (LanceDB) and in-process backends

pub mod lancedb;
pub mod memory;
pub mod pinecone;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

pub use self::lancedb::LanceIndexService;
pub use self::memory::MemoryIndexService;
pub use self::pinecone::PineconeClient;

/// Distance metric fixed when an index is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Metric {
    #[default]
    #[serde(rename = "dotproduct")]
    DotProduct,
    #[serde(rename = "cosine")]
    Cosine,
    #[serde(rename = "euclidean")]
    Euclidean,
}

impl Metric {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DotProduct => "dotproduct",
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
        }
    }

    #[inline]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "dotproduct" => Some(Self::DotProduct),
            "cosine" => Some(Self::Cosine),
            "euclidean" => Some(Self::Euclidean),
            _ => None,
        }
    }

    /// Similarity score where larger means closer
    #[inline]
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        match self {
            Self::DotProduct => dot,
            Self::Cosine => {
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    dot / (norm_a * norm_b)
                }
            }
            Self::Euclidean => {
                let distance = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                -distance
            }
        }
    }
}

impl fmt::Display for Metric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to create an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub cloud: String,
    pub region: String,
}

/// Current state of an existing index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub ready: bool,
}

/// A chunk of text and its embedding, keyed by a stable id
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub text: String,
    pub source_url: String,
}

/// A similarity search hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredText {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// Operations the assistant needs from a vector database
#[async_trait]
pub trait VectorIndexService: Send + Sync {
    /// Names of all existing indexes
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Create an index; creating one that already exists is not an error
    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    async fn describe_index(&self, name: &str) -> Result<IndexDescription>;

    /// Insert or overwrite records by id, returning how many were written
    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> Result<usize>;

    /// Top-k records ordered from most to least similar
    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredText>>;
}
