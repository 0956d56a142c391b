pub mod analysis;
pub mod chunking;
pub mod config;
pub mod documents;
pub mod error;
pub mod hash;
pub mod query;
pub mod traits;
pub mod types;

pub use analysis::{Analysis, AnalysisElements, MoveType, Pattern};
pub use chunking::{split_paragraphs, ChunkingConfig, TextChunker};
pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use hash::{analysis_content, concept_content, content_hash};
pub use query::SearchRequest;
pub use types::{
    Candidate, Chunk, Embeddable, EmbeddingRecord, FusionConfig, FusionStrategy, KeywordFilter, Meta, OwnerKind,
    SearchResponse, SearchResult, VectorFilter,
};
