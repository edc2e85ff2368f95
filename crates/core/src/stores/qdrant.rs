use crate::error::StoreError;
use crate::models::{ContentChunk, IndexStats, QueryMatch};
use crate::retry::RetryPolicy;
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

pub const DEFAULT_UPSERT_BATCH: usize = 100;

/// Payload key holding the chunk id the point was derived from.
const ORIGINAL_ID: &str = "original_id";

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
    batch_size: usize,
    retry: RetryPolicy,
}

impl QdrantStore {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Result<Self, StoreError> {
        let parsed = Url::parse(endpoint)?;
        Ok(Self {
            endpoint: parsed.as_str().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
            batch_size: DEFAULT_UPSERT_BATCH,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.endpoint, self.collection, suffix)
    }

    /// Creates the collection with cosine distance unless it already exists.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let existing = self.client.get(self.collection_url("")).send().await?;
        if existing.status().is_success() {
            debug!(collection = %self.collection, "qdrant collection exists");
            return Ok(());
        }
        if existing.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(existing).await);
        }

        let created = self
            .client
            .put(self.collection_url(""))
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;
        checked(created).await?;

        info!(
            collection = %self.collection,
            dimensions = self.vector_size,
            "created qdrant collection"
        );
        Ok(())
    }

    async fn put_points(&self, points: &[Value]) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.collection_url("/points?wait=true"))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        checked(response).await.map(|_| ())
    }
}

/// Stable point id for a chunk id: the first 16 bytes of its SHA-256.
pub fn point_id(chunk_id: &str) -> Uuid {
    let digest = Sha256::digest(chunk_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

fn point_for(chunk: &ContentChunk, vector_size: usize) -> Result<Value, StoreError> {
    if chunk.values.len() != vector_size {
        return Err(StoreError::Request(format!(
            "chunk {} has {} dimensions, collection expects {}",
            chunk.id,
            chunk.values.len(),
            vector_size
        )));
    }

    let mut payload = chunk.metadata.clone();
    payload.insert(ORIGINAL_ID.into(), Value::String(chunk.id.clone()));

    Ok(json!({
        "id": point_id(&chunk.id).to_string(),
        "vector": chunk.values,
        "payload": payload,
    }))
}

fn parse_hits(body: &Value) -> Vec<QueryMatch> {
    body.pointer("/result")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .map(|hit| {
                    let mut metadata = hit
                        .get("payload")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default();
                    let id = match metadata.remove(ORIGINAL_ID) {
                        Some(Value::String(original)) => original,
                        _ => match hit.get("id") {
                            Some(Value::String(id)) => id.clone(),
                            Some(other) => other.to_string(),
                            None => String::new(),
                        },
                    };
                    QueryMatch {
                        id,
                        score: hit.get("score").and_then(Value::as_f64).unwrap_or(0.0),
                        metadata,
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_stats(body: &Value) -> IndexStats {
    let result = body.get("result").cloned().unwrap_or(Value::Object(Map::new()));
    IndexStats {
        points: result
            .get("points_count")
            .or_else(|| result.get("vectors_count"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        dimensions: result
            .pointer("/config/params/vectors/size")
            .and_then(Value::as_u64)
            .map(|size| size as usize),
        status: result
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
    }
}

async fn checked(response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(backend_error(response).await)
    }
}

async fn backend_error(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StoreError::BackendResponse {
        backend: "qdrant".to_string(),
        details: format!("{status}: {}", body.trim()),
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn upsert(&self, chunks: &[ContentChunk]) -> Result<usize, StoreError> {
        let points = chunks
            .iter()
            .map(|chunk| point_for(chunk, self.vector_size))
            .collect::<Result<Vec<_>, StoreError>>()?;

        for (batch_number, batch) in points.chunks(self.batch_size).enumerate() {
            self.retry
                .run("qdrant upsert", || self.put_points(batch))
                .await?;
            debug!(batch = batch_number + 1, points = batch.len(), "upserted batch");
        }

        Ok(points.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        if vector.len() != self.vector_size {
            return Err(StoreError::Request(format!(
                "query vector dim {} is not {}",
                vector.len(),
                self.vector_size
            )));
        }

        let mut body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
        });
        if let (Some(filter), Value::Object(fields)) = (filter, &mut body) {
            fields.insert("filter".into(), filter);
        }

        let response = self
            .client
            .post(self.collection_url("/points/search"))
            .json(&body)
            .send()
            .await?;
        let parsed: Value = checked(response).await?.json().await?;
        Ok(parse_hits(&parsed))
    }

    async fn describe_stats(&self) -> Result<IndexStats, StoreError> {
        let response = self.client.get(self.collection_url("")).send().await?;
        let parsed: Value = checked(response).await?.json().await?;
        Ok(parse_stats(&parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, values: Vec<f32>) -> ContentChunk {
        let mut metadata = Map::new();
        metadata.insert("content".into(), Value::from("Vectors have direction."));
        ContentChunk {
            id: id.to_string(),
            values,
            metadata,
        }
    }

    #[test]
    fn point_ids_are_stable_uuids() {
        let first = point_id("vectors_chunk_0");
        assert_eq!(first, point_id("vectors_chunk_0"));
        assert_ne!(first, point_id("vectors_chunk_1"));
        assert_eq!(first.to_string().len(), 36);
    }

    #[test]
    fn points_keep_the_chunk_id_in_their_payload() -> Result<(), StoreError> {
        let point = point_for(&chunk("vectors_chunk_0", vec![0.5, 0.5]), 2)?;

        assert_eq!(point["id"], point_id("vectors_chunk_0").to_string());
        assert_eq!(point["payload"][ORIGINAL_ID], "vectors_chunk_0");
        assert_eq!(point["payload"]["content"], "Vectors have direction.");
        Ok(())
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let result = point_for(&chunk("a", vec![1.0]), 3);
        assert!(matches!(result, Err(StoreError::Request(_))));
    }

    #[test]
    fn search_hits_map_back_to_chunk_ids() {
        let body = json!({
            "result": [
                {"id": "9b2c", "score": 0.91, "payload": {"original_id": "notes_chunk_2", "content": "Dot product"}},
                {"id": 7, "score": 0.5, "payload": {"content": "Cross product"}}
            ]
        });

        let hits = parse_hits(&body);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "notes_chunk_2");
        assert_eq!(hits[0].text(), "Dot product");
        assert!(!hits[0].metadata.contains_key(ORIGINAL_ID));
        assert_eq!(hits[1].id, "7");
    }

    #[test]
    fn collection_info_becomes_stats() {
        let body = json!({
            "result": {
                "status": "green",
                "points_count": 42,
                "config": {"params": {"vectors": {"size": 384, "distance": "Cosine"}}}
            }
        });

        let stats = parse_stats(&body);
        assert_eq!(
            stats,
            IndexStats {
                points: 42,
                dimensions: Some(384),
                status: "green".to_string(),
            }
        );
    }

    #[test]
    fn endpoint_must_be_a_url() {
        assert!(matches!(QdrantStore::new("not a url", "c", 3), Err(StoreError::Url(_))));
        assert!(QdrantStore::new("http://localhost:6333/", "c", 3).is_ok());
    }
}
