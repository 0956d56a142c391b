//! Degrading wrappers around the vector and keyword stores.

use std::sync::Arc;

use tracing::{debug, warn};

use retrieve_core::analysis::Analysis;
use retrieve_core::hash::{concept_content, content_hash};
use retrieve_core::query::or_query;
use retrieve_core::traits::{KeywordStore, VectorStore};
use retrieve_core::types::{Candidate, Embeddable, EmbeddingRecord, KeywordFilter, OwnerKind, VectorFilter};
use retrieve_core::{Error, Result};
use retrieve_embed::EmbeddingProvider;

use crate::pool::StorePool;

/// What a vector upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new embedding was computed and stored.
    Written,
    /// The stored content hash matched; nothing was embedded.
    Unchanged,
    /// No embedding or no write; the store was left as it was.
    Failed,
}

impl UpsertOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    provider: EmbeddingProvider,
    pool: StorePool,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, provider: EmbeddingProvider, pool: StorePool) -> Result<Self> {
        if store.dim() != provider.dim() {
            return Err(Error::DimensionMismatch { expected: store.dim(), actual: provider.dim() });
        }
        Ok(Self { store, provider, pool })
    }

    pub fn dim(&self) -> usize {
        self.store.dim()
    }

    pub fn provider(&self) -> &EmbeddingProvider {
        &self.provider
    }

    /// Embed and store `item` unless its content hash is already stored.
    ///
    /// The pool permit is released before the embedding call.
    pub async fn upsert(&self, item: &Embeddable) -> UpsertOutcome {
        let hash = content_hash(&item.content);
        match self.pool.run("content_hash", self.store.content_hash(&item.owner_id)).await {
            Ok(Some(existing)) if existing == hash => {
                debug!(owner_id = %item.owner_id, "content unchanged, skipping embedding");
                return UpsertOutcome::Unchanged;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(owner_id = %item.owner_id, "upsert skipped: {}", e);
                return UpsertOutcome::Failed;
            }
        }

        let Some(vector) = self.provider.embed(&item.content).await else {
            warn!(owner_id = %item.owner_id, "no embedding available, row left untouched");
            return UpsertOutcome::Failed;
        };

        let record = EmbeddingRecord {
            owner_id: item.owner_id.clone(),
            owner_kind: item.owner_kind,
            document_id: item.document_id.clone(),
            source: item.source.clone(),
            content: item.content.clone(),
            content_hash: hash,
            move_type: item.move_type,
            vector,
            metadata: item.metadata.clone(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        match self.pool.run("write", self.store.write(record)).await {
            Ok(()) => UpsertOutcome::Written,
            Err(e) => {
                warn!(owner_id = %item.owner_id, "embedding write failed: {}", e);
                UpsertOutcome::Failed
            }
        }
    }

    /// Embed a concept from its name and optional description.
    pub async fn embed_concept(&self, concept_id: &str, name: &str, description: Option<&str>) -> UpsertOutcome {
        let item = Embeddable::new(concept_id, OwnerKind::Concept, concept_content(name, description));
        self.upsert(&item).await
    }

    /// Embed an analysis with its move type and concept id. Invalid analyses
    /// are rejected before anything is embedded.
    pub async fn embed_analysis(&self, analysis: &Analysis) -> Result<UpsertOutcome> {
        let item = analysis.embeddable()?;
        Ok(self.upsert(&item).await)
    }

    /// Nearest rows to `query`, or an empty list when the store is unavailable.
    pub async fn search(
        &self,
        query: &[f32],
        filter: &VectorFilter,
        threshold: Option<f64>,
        limit: usize,
    ) -> Vec<Candidate> {
        if query.len() != self.dim() {
            warn!(expected = self.dim(), actual = query.len(), "query vector has wrong width");
            return Vec::new();
        }
        match self.pool.run("vector_search", self.store.search(query, filter, threshold, limit)).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("vector search degraded to empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Embed `text` and search; empty when the embedding is absent.
    pub async fn search_text(
        &self,
        text: &str,
        filter: &VectorFilter,
        threshold: Option<f64>,
        limit: usize,
    ) -> Vec<Candidate> {
        match self.provider.embed(text).await {
            Some(v) => self.search(&v, filter, threshold, limit).await,
            None => Vec::new(),
        }
    }

    /// Rows closest to the stored vector of `owner_id`, excluding itself.
    pub async fn find_similar(&self, owner_id: &str, filter: &VectorFilter, limit: usize) -> Vec<Candidate> {
        let vector = match self.pool.run("vector_of", self.store.vector_of(owner_id)).await {
            Ok(Some(v)) => v,
            Ok(None) => {
                debug!(owner_id, "no stored vector");
                return Vec::new();
            }
            Err(e) => {
                warn!("find_similar degraded to empty: {}", e);
                return Vec::new();
            }
        };
        let filter = VectorFilter { exclude_owner: Some(owner_id.to_string()), ..filter.clone() };
        self.search(&vector, &filter, None, limit).await
    }

    pub async fn delete_owner(&self, owner_id: &str) -> Result<()> {
        self.pool.run("vector_delete", self.store.delete(owner_id)).await
    }
}

#[derive(Clone)]
pub struct KeywordIndex {
    store: Arc<dyn KeywordStore>,
    pool: StorePool,
}

impl KeywordIndex {
    pub fn new(store: Arc<dyn KeywordStore>, pool: StorePool) -> Self {
        Self { store, pool }
    }

    /// BM25 search over the OR of the query's terms, restricted to `filter`.
    /// Queries without terms and unavailable stores both yield an empty list.
    pub async fn search(&self, query_text: &str, filter: &KeywordFilter, limit: usize) -> Vec<Candidate> {
        let q = match or_query(query_text) {
            Ok(q) => q,
            Err(e) => {
                debug!("{}", e);
                return Vec::new();
            }
        };
        match self.pool.run("keyword_search", self.store.search(&q, filter, limit)).await {
            Ok(mut hits) => {
                hits.truncate(limit);
                hits
            }
            Err(e) => {
                warn!("keyword search degraded to empty: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn upsert(&self, items: &[Embeddable]) -> Result<()> {
        self.pool.run("keyword_upsert", self.store.upsert(items)).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.pool.run("keyword_delete", self.store.delete(id)).await
    }
}
