
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::{IndexDescription, IndexSpec, ScoredText, VectorIndexService, VectorRecord};
use crate::{AssistantError, Result};

#[derive(Debug)]
struct MemoryIndex {
    spec: IndexSpec,
    records: Vec<VectorRecord>,
    pending_readiness_checks: u32,
}

/// In-process vector index, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryIndexService {
    indexes: Mutex<HashMap<String, MemoryIndex>>,
    readiness_delay: u32,
}

impl MemoryIndexService {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report newly created indexes as not ready for the first `checks` describes
    #[inline]
    pub fn with_readiness_delay(mut self, checks: u32) -> Self {
        self.readiness_delay = checks;
        self
    }

    /// Number of records stored in `index`
    #[inline]
    pub fn record_count(&self, index: &str) -> usize {
        self.indexes
            .lock()
            .map(|indexes| indexes.get(index).map_or(0, |i| i.records.len()))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MemoryIndex>>> {
        self.indexes
            .lock()
            .map_err(|e| AssistantError::VectorIndex(format!("Index lock poisoned: {}", e)))
    }
}

fn missing(name: &str) -> AssistantError {
    AssistantError::VectorIndex(format!("Index '{}' does not exist", name))
}

#[async_trait]
impl VectorIndexService for MemoryIndexService {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let mut indexes = self.lock()?;
        if indexes.contains_key(&spec.name) {
            debug!("Index '{}' already exists", spec.name);
            return Ok(());
        }
        indexes.insert(
            spec.name.clone(),
            MemoryIndex {
                spec: spec.clone(),
                records: Vec::new(),
                pending_readiness_checks: self.readiness_delay,
            },
        );
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let mut indexes = self.lock()?;
        let index = indexes.get_mut(name).ok_or_else(|| missing(name))?;
        let ready = index.pending_readiness_checks == 0;
        index.pending_readiness_checks = index.pending_readiness_checks.saturating_sub(1);
        Ok(IndexDescription {
            name: index.spec.name.clone(),
            dimension: index.spec.dimension,
            metric: index.spec.metric,
            ready,
        })
    }

    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let mut indexes = self.lock()?;
        let target = indexes.get_mut(index).ok_or_else(|| missing(index))?;
        let written = records.len();

        if let Some(bad) = records
            .iter()
            .find(|record| record.values.len() != target.spec.dimension)
        {
            return Err(AssistantError::VectorIndex(format!(
                "Vector dimension {} does not match index dimension {}",
                bad.values.len(),
                target.spec.dimension
            )));
        }

        for record in records {
            match target.records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => target.records.push(record),
            }
        }

        Ok(written)
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredText>> {
        let indexes = self.lock()?;
        let target = indexes.get(index).ok_or_else(|| missing(index))?;
        let metric = target.spec.metric;

        let mut hits: Vec<ScoredText> = target
            .records
            .iter()
            .map(|record| ScoredText {
                id: record.id.clone(),
                text: record.text.clone(),
                score: metric.score(vector, &record.values),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}
