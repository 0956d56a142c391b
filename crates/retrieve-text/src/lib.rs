//! retrieve-text
//!
//! Tantivy-backed BM25 keyword store for the hybrid retrieval engine.
pub mod schema;
pub mod store;

pub use store::TantivyKeywordStore;
