use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use retrieve_core::config::{EmbeddingSettings, LocalBackendKind};
use retrieve_core::traits::EmbeddingBackend;
use retrieve_core::{Error, Result};

use crate::candle::CandleBackend;
use crate::hash::HashEmbedder;
use crate::remote::{OllamaBackend, OpenAiBackend};

/// Ordered chain of embedding backends sharing one dimensionality.
///
/// Each call walks the chain until a backend returns a vector of the right
/// width within the timeout. When every backend fails the caller gets an
/// absent vector, never an error.
#[derive(Clone)]
pub struct EmbeddingProvider {
    backends: Vec<Arc<dyn EmbeddingBackend>>,
    timeout: Duration,
    dim: usize,
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("backends", &self.backend_names())
            .field("timeout", &self.timeout)
            .field("dim", &self.dim)
            .finish()
    }
}

impl EmbeddingProvider {
    pub fn new(backends: Vec<Arc<dyn EmbeddingBackend>>, timeout: Duration) -> Result<Self> {
        let Some(first) = backends.first() else {
            return Err(Error::InvalidConfig("at least one embedding backend is required".to_string()));
        };
        let dim = first.dim();
        if dim == 0 {
            return Err(Error::InvalidConfig(format!("backend {} reports zero dimension", first.name())));
        }
        if let Some(other) = backends.iter().find(|b| b.dim() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: other.dim() });
        }
        Ok(Self { backends, timeout, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Embed `text`, or `None` when no backend produced a usable vector.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match self.try_embed(text).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Like [`Self::embed`] but reports why every backend failed.
    pub async fn try_embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut failures = Vec::new();
        for backend in &self.backends {
            let outcome = tokio::time::timeout(self.timeout, backend.embed(text)).await;
            let reason = match outcome {
                Ok(Ok(v)) if v.len() == self.dim => {
                    debug!(backend = backend.name(), "embedded {} chars", text.len());
                    return Ok(v);
                }
                Ok(Ok(v)) => format!("returned {} dimensions, expected {}", v.len(), self.dim),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", self.timeout),
            };
            warn!(backend = backend.name(), "embedding backend failed: {}", reason);
            failures.push(format!("{}: {}", backend.name(), reason));
        }
        Err(Error::EmbeddingUnavailable(failures.join("; ")))
    }
}

/// True when `APP_USE_FAKE_EMBEDDINGS` asks for the hash embedder.
pub fn fake_embeddings_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Build the backend chain from settings: remote first when an API key is
/// configured, then the local backend.
pub fn build_provider(settings: &EmbeddingSettings) -> Result<EmbeddingProvider> {
    let timeout = Duration::from_millis(settings.timeout_ms);
    if fake_embeddings_requested() {
        info!("Using HashEmbedder (APP_USE_FAKE_EMBEDDINGS)");
        let backend: Arc<dyn EmbeddingBackend> = Arc::new(HashEmbedder::new(settings.dimension()));
        return EmbeddingProvider::new(vec![backend], timeout);
    }

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;

    let mut backends: Vec<Arc<dyn EmbeddingBackend>> = Vec::new();
    if settings.remote.is_configured() {
        let remote = OpenAiBackend::new(client.clone(), &settings.remote)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        backends.push(Arc::new(remote));
    }
    let local: Arc<dyn EmbeddingBackend> = match settings.local.kind {
        LocalBackendKind::Ollama => Arc::new(OllamaBackend::new(client, &settings.local)),
        LocalBackendKind::Hash => Arc::new(HashEmbedder::new(settings.local.dimension)),
        LocalBackendKind::Candle => {
            let dir = settings
                .local
                .model_dir
                .as_deref()
                .map(retrieve_core::config::expand_path)
                .unwrap_or_else(|| PathBuf::from("models"));
            let model = CandleBackend::load(&dir).map_err(|e| Error::EmbeddingUnavailable(format!("{e:#}")))?;
            if model.dim() != settings.local.dimension {
                return Err(Error::DimensionMismatch { expected: settings.local.dimension, actual: model.dim() });
            }
            Arc::new(model)
        }
    };
    backends.push(local);

    let provider = EmbeddingProvider::new(backends, timeout)?;
    info!(backends = ?provider.backend_names(), dim = provider.dim(), "Embedding provider ready");
    Ok(provider)
}
