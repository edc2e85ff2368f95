use crate::error::StoreError;
use crate::models::{ContentChunk, IndexStats, QueryMatch};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Stores or replaces `chunks`, returning how many were written.
    async fn upsert(&self, chunks: &[ContentChunk]) -> Result<usize, StoreError>;

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<QueryMatch>, StoreError>;

    async fn describe_stats(&self) -> Result<IndexStats, StoreError>;
}
