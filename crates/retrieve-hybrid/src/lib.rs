//! retrieve-hybrid
//!
//! Hybrid retrieval: vector and keyword candidates fused by rank.
pub mod context;
pub mod fusion;
pub mod index;
pub mod ingest;
pub mod pool;
pub mod service;

pub use context::RetrievalContext;
pub use fusion::fuse;
pub use index::{KeywordIndex, UpsertOutcome, VectorIndex};
pub use ingest::{chunk_id, IngestReport, Ingestor};
pub use pool::StorePool;
pub use service::HybridSearchService;
