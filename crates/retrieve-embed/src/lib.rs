pub mod candle;
pub mod device;
pub mod hash;
pub mod pool;
pub mod provider;
pub mod remote;
pub mod tokenize;

pub use candle::CandleBackend;
pub use hash::HashEmbedder;
pub use pool::masked_mean_l2;
pub use provider::{build_provider, fake_embeddings_requested, EmbeddingProvider};
pub use remote::{OllamaBackend, OpenAiBackend};
