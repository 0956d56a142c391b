use async_trait::async_trait;

use crate::types::{Candidate, Embeddable, EmbeddingRecord, KeywordFilter, VectorFilter};

/// One way of turning text into a vector (remote API, self-hosted server,
/// in-process model). Backends report failures; the provider chain decides
/// whether to fall back or degrade to an absent vector.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Stable identifier for logs, e.g. `ollama:nomic-embed-text`.
    fn name(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Persistent vector rows keyed by owner id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Width of the vector column. Fixed for the lifetime of the store.
    fn dim(&self) -> usize;
    /// Stored content hash for `owner_id`, if a row exists.
    async fn content_hash(&self, owner_id: &str) -> anyhow::Result<Option<String>>;
    /// Insert or replace the row for `record.owner_id`.
    async fn write(&self, record: EmbeddingRecord) -> anyhow::Result<()>;
    /// Stored vector for `owner_id`, if a row exists.
    async fn vector_of(&self, owner_id: &str) -> anyhow::Result<Option<Vec<f32>>>;
    /// Rows ordered by descending cosine similarity, filtered to
    /// `similarity >= threshold` when a threshold is given.
    async fn search(
        &self,
        query: &[f32],
        filter: &VectorFilter,
        threshold: Option<f64>,
        limit: usize,
    ) -> anyhow::Result<Vec<Candidate>>;
    async fn delete(&self, owner_id: &str) -> anyhow::Result<()>;
}

/// Full-text rows keyed by owner id.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    async fn upsert(&self, docs: &[Embeddable]) -> anyhow::Result<()>;
    /// Rows matching the OR-joined term query built by
    /// [`crate::query::or_query`] within `filter`, ordered by descending
    /// relevance. Filter terms do not contribute to the score.
    async fn search(&self, or_query: &str, filter: &KeywordFilter, limit: usize) -> anyhow::Result<Vec<Candidate>>;
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}
