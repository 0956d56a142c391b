//! Domain types shared by the chunker, the stores and the hybrid engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::analysis::MoveType;
use crate::error::Error;

/// Free-form metadata carried alongside chunks and results.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// A contiguous slice of a document produced by [`crate::chunking::TextChunker`].
///
/// - `text`: trimmed chunk payload
/// - `index`: 0-based position among the chunks emitted for one document
/// - `start_char`/`end_char`: character offsets of the slice in the trimmed input
/// - `metadata`: caller metadata plus `chunk_method`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub metadata: Meta,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// What kind of entity an embedding row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Concept,
    Analysis,
    SourceChunk,
    DocumentChunk,
}

impl OwnerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Analysis => "analysis",
            Self::SourceChunk => "source_chunk",
            Self::DocumentChunk => "document_chunk",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concept" => Ok(Self::Concept),
            "analysis" => Ok(Self::Analysis),
            "source_chunk" => Ok(Self::SourceChunk),
            "document_chunk" => Ok(Self::DocumentChunk),
            other => Err(Error::InvalidRequest(format!("unknown owner kind '{other}'"))),
        }
    }
}

/// Text handed to the indexes for one owner. The vector path derives the
/// content hash and the embedding from `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embeddable {
    pub owner_id: String,
    pub owner_kind: OwnerKind,
    pub document_id: Option<String>,
    pub source: Option<String>,
    pub content: String,
    #[serde(default)]
    pub move_type: Option<MoveType>,
    #[serde(default)]
    pub metadata: Meta,
}

impl Embeddable {
    pub fn new(owner_id: impl Into<String>, owner_kind: OwnerKind, content: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            owner_kind,
            document_id: None,
            source: None,
            content: content.into(),
            move_type: None,
            metadata: Meta::new(),
        }
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn with_move_type(mut self, move_type: Option<MoveType>) -> Self {
        self.move_type = move_type;
        self
    }

    pub fn with_metadata(mut self, metadata: Meta) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A persisted embedding row. `content_hash` is the idempotency key: a write
/// whose hash matches the stored one for the same `owner_id` is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub owner_id: String,
    pub owner_kind: OwnerKind,
    pub document_id: Option<String>,
    pub source: Option<String>,
    pub content: String,
    pub content_hash: String,
    /// Set for analysis rows only.
    #[serde(default)]
    pub move_type: Option<MoveType>,
    pub vector: Vec<f32>,
    pub metadata: Meta,
    /// Milliseconds since the Unix epoch.
    pub updated_at: i64,
}

/// One entry of a single-signal ranked list, as returned by a store.
///
/// `score` is cosine similarity for the vector signal and the store's
/// relevance rank for the keyword signal. Higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub content: String,
    pub source: Option<String>,
    pub metadata: Meta,
    pub score: f64,
}

/// Restrictions applied to a vector query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorFilter {
    pub owner_kind: Option<OwnerKind>,
    pub move_type: Option<MoveType>,
    pub document_ids: Vec<String>,
    pub exclude_owner: Option<String>,
}

impl VectorFilter {
    pub fn is_empty(&self) -> bool {
        self.owner_kind.is_none()
            && self.move_type.is_none()
            && self.document_ids.is_empty()
            && self.exclude_owner.is_none()
    }

    /// Vector restrictions matching a keyword scope.
    pub fn scoped(scope: &KeywordFilter) -> Self {
        Self { owner_kind: scope.owner_kind, move_type: scope.move_type, ..Self::default() }
    }
}

/// Restrictions applied to a keyword query. Filter terms never change scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    pub owner_kind: Option<OwnerKind>,
    pub move_type: Option<MoveType>,
}

impl KeywordFilter {
    pub fn is_empty(&self) -> bool {
        self.owner_kind.is_none() && self.move_type.is_none()
    }
}

/// A fused result. `vector_score` and `keyword_score` carry the raw per-signal
/// scores (0 when the item was absent from that signal); `combined_score` is
/// the fused value used for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub vector_score: f64,
    pub keyword_score: f64,
    pub combined_score: f64,
    #[serde(skip_serializing_if = "Meta::is_empty", default)]
    pub metadata: Meta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total: usize,
}

impl SearchResponse {
    pub fn new(query: impl Into<String>, results: Vec<SearchResult>) -> Self {
        let total = results.len();
        Self { query: query.into(), results, total }
    }
}

/// Scaling factors for rank fusion. The weights need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub vector_weight: f64,
    pub keyword_weight: f64,
    pub rrf_k: u32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { vector_weight: 0.7, keyword_weight: 0.3, rrf_k: 60 }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(0.0..=1.0).contains(&self.vector_weight) {
            return Err(Error::InvalidConfig(format!("vector_weight {} outside [0, 1]", self.vector_weight)));
        }
        if !(0.0..=1.0).contains(&self.keyword_weight) {
            return Err(Error::InvalidConfig(format!("keyword_weight {} outside [0, 1]", self.keyword_weight)));
        }
        if self.rrf_k == 0 {
            return Err(Error::InvalidConfig("rrf_k must be positive".to_string()));
        }
        Ok(())
    }
}

/// How the two ranked lists are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    #[default]
    Rrf,
    Weighted,
}
