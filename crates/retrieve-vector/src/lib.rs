//! retrieve-vector
//!
//! LanceDB-backed embedding rows with cosine similarity search.
pub mod schema;
pub mod store;
pub mod table;

pub use store::{filter_predicate, LanceVectorStore};
