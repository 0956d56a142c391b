use tracing::{debug, info};

use retrieve_core::config::{FusionSettings, SearchSettings};
use retrieve_core::query::SearchRequest;
use retrieve_core::types::{SearchResponse, SearchResult, VectorFilter};
use retrieve_core::Result;

use crate::fusion::fuse;
use crate::index::{KeywordIndex, VectorIndex};

/// Embeds the query, reads both indexes concurrently and fuses the two
/// candidate lists. Per-signal failures only remove that signal's
/// candidates; the caller always gets a (possibly empty) list.
#[derive(Clone)]
pub struct HybridSearchService {
    vector: VectorIndex,
    keyword: KeywordIndex,
    fusion: FusionSettings,
    search: SearchSettings,
}

impl HybridSearchService {
    pub fn new(vector: VectorIndex, keyword: KeywordIndex, fusion: FusionSettings, search: SearchSettings) -> Self {
        Self { vector, keyword, fusion, search }
    }

    /// A request carrying the configured defaults.
    pub fn request(&self, query: impl Into<String>) -> SearchRequest {
        SearchRequest::new(query)
            .limit(self.search.default_limit)
            .threshold(self.search.vector_threshold)
            .weights(self.fusion.vector_weight, self.fusion.keyword_weight)
            .strategy(self.fusion.strategy)
    }

    pub async fn search(&self, request: &SearchRequest) -> Vec<SearchResult> {
        let limit = request.limit;
        let pool_size = limit.saturating_mul(2);
        let scope = request.scope();
        let vector_filter = VectorFilter::scoped(&scope);

        let query_vector = self.vector.provider().embed(&request.query).await;
        if query_vector.is_none() {
            debug!("query embedding absent, keyword signal only");
        }

        let vector_read = async {
            match &query_vector {
                Some(v) => {
                    self.vector
                        .search(v, &vector_filter, Some(request.vector_threshold), pool_size)
                        .await
                }
                None => Vec::new(),
            }
        };
        let keyword_read = self.keyword.search(&request.query, &scope, pool_size);
        let (vector_hits, keyword_hits) = tokio::join!(vector_read, keyword_read);

        if vector_hits.is_empty() && keyword_hits.is_empty() {
            return Vec::new();
        }
        let config = request.fusion(&self.fusion.config());
        let results = fuse(request.strategy, &vector_hits, &keyword_hits, &config, limit);
        info!(
            query = %request.query,
            vector = vector_hits.len(),
            keyword = keyword_hits.len(),
            results = results.len(),
            "hybrid search"
        );
        results
    }

    /// Validate `request`, search, and wrap the results with the query and count.
    pub async fn respond(&self, request: &SearchRequest) -> Result<SearchResponse> {
        request.validate(self.search.min_query_len, self.search.max_limit)?;
        let results = self.search(request).await;
        Ok(SearchResponse::new(request.query.clone(), results))
    }
}
