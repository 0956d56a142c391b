//! Query-side helpers: keyword term extraction and request validation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::analysis::MoveType;
use crate::types::{FusionConfig, FusionStrategy, KeywordFilter, OwnerKind};

/// Split a raw query into keyword terms.
///
/// Every character that is neither a word character nor whitespace becomes a
/// separator, so `state-of-the-art` yields four terms. Terms are lowercased so
/// that words like `OR` or `AND` never reach a query parser as operators.
pub fn keyword_terms(query: &str) -> Vec<String> {
    let cleaned: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// OR-joined form of [`keyword_terms`], or `MalformedQuery` when nothing survives.
pub fn or_query(query: &str) -> Result<String> {
    let terms = keyword_terms(query);
    if terms.is_empty() {
        return Err(Error::MalformedQuery(format!("no searchable terms in {query:?}")));
    }
    Ok(terms.join(" OR "))
}

/// Caller-facing search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub vector_threshold: f64,
    pub vector_weight: f64,
    pub keyword_weight: f64,
    #[serde(default)]
    pub strategy: FusionStrategy,
    /// Restrict both signals to one owner kind.
    #[serde(default)]
    pub owner_kind: Option<OwnerKind>,
    /// Restrict both signals to analyses made with one move.
    #[serde(default)]
    pub move_type: Option<MoveType>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        let fusion = FusionConfig::default();
        Self {
            query: query.into(),
            limit: 10,
            vector_threshold: 0.4,
            vector_weight: fusion.vector_weight,
            keyword_weight: fusion.keyword_weight,
            strategy: FusionStrategy::Rrf,
            owner_kind: None,
            move_type: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.vector_threshold = threshold;
        self
    }

    pub fn weights(mut self, vector_weight: f64, keyword_weight: f64) -> Self {
        self.vector_weight = vector_weight;
        self.keyword_weight = keyword_weight;
        self
    }

    pub fn strategy(mut self, strategy: FusionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn owner_kind(mut self, owner_kind: Option<OwnerKind>) -> Self {
        self.owner_kind = owner_kind;
        self
    }

    pub fn move_type(mut self, move_type: Option<MoveType>) -> Self {
        self.move_type = move_type;
        self
    }

    /// Scope shared by both signals. A move type implies analysis rows.
    pub fn scope(&self) -> KeywordFilter {
        let owner_kind = match (self.owner_kind, self.move_type) {
            (None, Some(_)) => Some(OwnerKind::Analysis),
            (kind, _) => kind,
        };
        KeywordFilter { owner_kind, move_type: self.move_type }
    }

    /// Reject requests that must not reach the retrieval core.
    pub fn validate(&self, min_query_len: usize, max_limit: usize) -> Result<()> {
        let len = self.query.trim().chars().count();
        if len < min_query_len {
            return Err(Error::InvalidRequest(format!(
                "query must be at least {min_query_len} characters (got {len})"
            )));
        }
        if self.limit == 0 || self.limit > max_limit {
            return Err(Error::InvalidRequest(format!("limit must be within 1..={max_limit}")));
        }
        for (name, v) in [
            ("threshold", self.vector_threshold),
            ("vector_weight", self.vector_weight),
            ("keyword_weight", self.keyword_weight),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::InvalidRequest(format!("{name} {v} outside [0, 1]")));
            }
        }
        if let (Some(kind), Some(_)) = (self.owner_kind, self.move_type) {
            if kind != OwnerKind::Analysis {
                return Err(Error::InvalidRequest(format!("move_type only applies to analysis rows, not {kind}")));
            }
        }
        Ok(())
    }

    /// Fusion weights for this request with the configured `rrf_k`.
    pub fn fusion(&self, base: &FusionConfig) -> FusionConfig {
        FusionConfig { vector_weight: self.vector_weight, keyword_weight: self.keyword_weight, rrf_k: base.rrf_k }
    }
}
