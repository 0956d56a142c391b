use std::sync::Arc;

use tracing::info;

use retrieve_core::chunking::TextChunker;
use retrieve_core::config::Settings;
use retrieve_core::traits::{KeywordStore, VectorStore};
use retrieve_core::{Error, Result};
use retrieve_embed::{build_provider, EmbeddingProvider};
use retrieve_text::TantivyKeywordStore;
use retrieve_vector::LanceVectorStore;

use crate::index::{KeywordIndex, VectorIndex};
use crate::ingest::Ingestor;
use crate::pool::StorePool;
use crate::service::HybridSearchService;

/// Wired components sharing one store pool. Construction performs every
/// configuration check so queries never fail on configuration.
#[derive(Clone)]
pub struct RetrievalContext {
    settings: Settings,
    chunker: TextChunker,
    pool: StorePool,
    vector: VectorIndex,
    keyword: KeywordIndex,
}

impl RetrievalContext {
    pub fn new(
        settings: Settings,
        provider: EmbeddingProvider,
        vector_store: Arc<dyn VectorStore>,
        keyword_store: Arc<dyn KeywordStore>,
    ) -> Result<Self> {
        settings.validate()?;
        let chunker = TextChunker::new(settings.chunking.clone())?;
        let pool = StorePool::from_settings(&settings.store);
        let vector = VectorIndex::new(vector_store, provider, pool.clone())?;
        let keyword = KeywordIndex::new(keyword_store, pool.clone());
        Ok(Self { settings, chunker, pool, vector, keyword })
    }

    /// Build the provider chain and open the on-disk stores under
    /// `store.data_dir`.
    pub async fn open(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let provider = build_provider(&settings.embedding)?;

        let vector_path = settings.store.vector_path();
        let vector_store = LanceVectorStore::open(&vector_path, &settings.store.vector_table, provider.dim())
            .await
            .map_err(|e| match e.downcast::<Error>() {
                Ok(err) => err,
                Err(other) => Error::StoreUnavailable(format!("{}: {other:#}", vector_path.display())),
            })?;

        let keyword_path = settings.store.keyword_path();
        let keyword_store = TantivyKeywordStore::open(&keyword_path)
            .map_err(|e| Error::StoreUnavailable(format!("{}: {e:#}", keyword_path.display())))?;

        info!(
            vectors = %vector_path.display(),
            keywords = %keyword_path.display(),
            dim = provider.dim(),
            "retrieval context ready"
        );
        Self::new(settings, provider, Arc::new(vector_store), Arc::new(keyword_store))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    pub fn pool(&self) -> &StorePool {
        &self.pool
    }

    pub fn vector_index(&self) -> &VectorIndex {
        &self.vector
    }

    pub fn keyword_index(&self) -> &KeywordIndex {
        &self.keyword
    }

    pub fn search_service(&self) -> HybridSearchService {
        HybridSearchService::new(
            self.vector.clone(),
            self.keyword.clone(),
            self.settings.fusion.clone(),
            self.settings.search.clone(),
        )
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.chunker.clone(), self.vector.clone(), self.keyword.clone())
    }
}
