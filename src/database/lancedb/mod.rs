// LanceDB vector database module
// Local on-disk backend: one table per index, metric recorded in the schema metadata


use ::lancedb::query::{ExecutableQuery, QueryBase};
use ::lancedb::{Connection, DistanceType, Table};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{IndexDescription, IndexSpec, Metric, ScoredText, VectorIndexService, VectorRecord};
use crate::{AssistantError, Result};

const METRIC_METADATA_KEY: &str = "metric";
const VECTOR_COLUMN: &str = "vector";

/// Vector index service backed by a local LanceDB directory
pub struct LanceIndexService {
    connection: Connection,
    default_metric: Metric,
}

fn db_error(context: &str, error: impl std::fmt::Display) -> AssistantError {
    AssistantError::VectorIndex(format!("{}: {}", context, error))
}

fn distance_type(metric: Metric) -> DistanceType {
    match metric {
        Metric::DotProduct => DistanceType::Dot,
        Metric::Cosine => DistanceType::Cosine,
        Metric::Euclidean => DistanceType::L2,
    }
}

/// Convert a LanceDB distance into a larger-is-closer score
fn distance_to_score(metric: Metric, distance: f32) -> f32 {
    match metric {
        Metric::DotProduct | Metric::Cosine => 1.0 - distance,
        Metric::Euclidean => -distance.max(0.0).sqrt(),
    }
}

fn create_schema(dimension: usize, metric: Metric) -> Arc<Schema> {
    let metadata = HashMap::from([(METRIC_METADATA_KEY.to_string(), metric.as_str().to_string())]);
    Arc::new(
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new("source_url", DataType::Utf8, false),
        ])
        .with_metadata(metadata),
    )
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AssistantError::VectorIndex(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AssistantError::VectorIndex(format!("Invalid {} column type", name)))
}

impl LanceIndexService {
    /// Open (or create) a LanceDB database rooted at `path`
    #[inline]
    pub async fn new(path: &Path, default_metric: Metric) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            db_error("Failed to create vector database directory", e)
        })?;

        let uri = format!("file://{}", path.display());
        debug!("Connecting to LanceDB at {}", uri);
        let connection = ::lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| db_error("Failed to connect to LanceDB", e))?;

        Ok(Self {
            connection,
            default_metric,
        })
    }

    async fn open(&self, name: &str) -> Result<Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| db_error(&format!("Failed to open index '{}'", name), e))
    }

    /// Dimension and metric of an existing table
    async fn table_shape(&self, table: &Table) -> Result<(usize, Metric)> {
        let schema = table
            .schema()
            .await
            .map_err(|e| db_error("Failed to read table schema", e))?;

        let dimension = schema
            .fields()
            .iter()
            .find(|field| field.name() == VECTOR_COLUMN)
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                AssistantError::VectorIndex("Could not determine vector dimension".to_string())
            })?;

        let metric = schema
            .metadata()
            .get(METRIC_METADATA_KEY)
            .and_then(|raw| Metric::parse(raw))
            .unwrap_or(self.default_metric);

        Ok((dimension, metric))
    }

    fn record_batch(records: &[VectorRecord], dimension: usize, metric: Metric) -> Result<RecordBatch> {
        let mut ids = Vec::with_capacity(records.len());
        let mut texts = Vec::with_capacity(records.len());
        let mut sources = Vec::with_capacity(records.len());
        let mut flat_values = Vec::with_capacity(records.len() * dimension);

        for record in records {
            if record.values.len() != dimension {
                return Err(AssistantError::VectorIndex(format!(
                    "Vector dimension {} does not match index dimension {}",
                    record.values.len(),
                    dimension
                )));
            }
            ids.push(record.id.as_str());
            texts.push(record.text.as_str());
            sources.push(record.source_url.as_str());
            flat_values.extend_from_slice(&record.values);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| db_error("Failed to create vector array", e))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(sources)),
        ];

        RecordBatch::try_new(create_schema(dimension, metric), arrays)
            .map_err(|e| db_error("Failed to create record batch", e))
    }

    fn parse_batch(batch: &RecordBatch, metric: Metric) -> Result<Vec<ScoredText>> {
        let ids = string_column(batch, "id")?;
        let texts = string_column(batch, "text")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        Ok((0..batch.num_rows())
            .map(|row| {
                let distance = distances
                    .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
                ScoredText {
                    id: ids.value(row).to_string(),
                    text: texts.value(row).to_string(),
                    score: distance_to_score(metric, distance),
                }
            })
            .collect())
    }

    /// Number of rows stored in `index`
    #[inline]
    pub async fn count(&self, index: &str) -> Result<usize> {
        self.open(index)
            .await?
            .count_rows(None)
            .await
            .map_err(|e| db_error("Failed to count rows", e))
    }
}

#[async_trait]
impl VectorIndexService for LanceIndexService {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| db_error("Failed to list tables", e))
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        if self.list_indexes().await?.contains(&spec.name) {
            debug!("Index '{}' already exists", spec.name);
            return Ok(());
        }

        self.connection
            .create_empty_table(&spec.name, create_schema(spec.dimension, spec.metric))
            .execute()
            .await
            .map_err(|e| {
                AssistantError::IndexProvision(format!(
                    "Failed to create index '{}': {}",
                    spec.name, e
                ))
            })?;

        info!(
            "Created index '{}' ({} dims, {})",
            spec.name, spec.dimension, spec.metric
        );
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        if !self.list_indexes().await?.iter().any(|n| n == name) {
            return Err(AssistantError::IndexProvision(format!(
                "Index '{}' does not exist",
                name
            )));
        }
        let table = self.open(name).await?;
        let (dimension, metric) = self.table_shape(&table).await?;

        Ok(IndexDescription {
            name: name.to_string(),
            dimension,
            metric,
            ready: true,
        })
    }

    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let table = self.open(index).await?;
        let (dimension, metric) = self.table_shape(&table).await?;
        let batch = Self::record_batch(&records, dimension, metric)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| db_error("Failed to upsert records", e))?;

        debug!("Upserted {} records into '{}'", records.len(), index);
        Ok(records.len())
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredText>> {
        let table = self.open(index).await?;
        let (_, metric) = self.table_shape(&table).await?;

        let mut stream = table
            .vector_search(vector)
            .map_err(|e| db_error("Failed to create vector search", e))?
            .column(VECTOR_COLUMN)
            .distance_type(distance_type(metric))
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| db_error("Failed to execute search", e))?;

        let mut hits = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| db_error("Failed to read result stream", e))?
        {
            hits.extend(Self::parse_batch(&batch, metric)?);
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}
