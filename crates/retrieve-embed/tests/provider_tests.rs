use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use retrieve_core::config::{EmbeddingSettings, LocalBackendKind};
use retrieve_core::traits::EmbeddingBackend;
use retrieve_core::Error;
use retrieve_embed::{build_provider, EmbeddingProvider, HashEmbedder};

enum Behaviour {
    Ok,
    Fail,
    Hang,
    WrongWidth,
}

struct Scripted {
    name: &'static str,
    dim: usize,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(name: &'static str, dim: usize, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self { name, dim, behaviour, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl EmbeddingBackend for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Ok => Ok(vec![1.0; self.dim]),
            Behaviour::Fail => Err(anyhow!("{} is down", self.name)),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(vec![1.0; self.dim])
            }
            Behaviour::WrongWidth => Ok(vec![1.0; self.dim + 1]),
        }
    }
}

fn chain(backends: Vec<Arc<Scripted>>) -> EmbeddingProvider {
    let backends = backends.into_iter().map(|b| b as Arc<dyn EmbeddingBackend>).collect();
    EmbeddingProvider::new(backends, Duration::from_millis(50)).unwrap()
}

#[tokio::test]
async fn first_healthy_backend_wins() {
    let remote = Scripted::new("remote", 4, Behaviour::Ok);
    let local = Scripted::new("local", 4, Behaviour::Ok);
    let provider = chain(vec![remote.clone(), local.clone()]);

    assert_eq!(provider.embed("hello").await, Some(vec![1.0; 4]));
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert_eq!(local.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_remote_falls_back_to_local() {
    let remote = Scripted::new("remote", 4, Behaviour::Fail);
    let local = Scripted::new("local", 4, Behaviour::Ok);
    let provider = chain(vec![remote.clone(), local.clone()]);

    assert!(provider.embed("hello").await.is_some());
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    assert_eq!(local.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn timeout_and_wrong_width_count_as_failures() {
    let provider = chain(vec![Scripted::new("slow", 4, Behaviour::Hang), Scripted::new("local", 4, Behaviour::Ok)]);
    assert!(provider.embed("hello").await.is_some());

    let provider = chain(vec![Scripted::new("odd", 4, Behaviour::WrongWidth)]);
    assert_eq!(provider.embed("hello").await, None);
}

#[tokio::test]
async fn exhausted_chain_is_absent_not_error() {
    let provider = chain(vec![Scripted::new("remote", 4, Behaviour::Fail), Scripted::new("local", 4, Behaviour::Hang)]);
    assert_eq!(provider.embed("hello").await, None);

    let err = provider.try_embed("hello").await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingUnavailable(ref msg) if msg.contains("remote") && msg.contains("local")));
}

#[test]
fn mismatched_backend_dimensions_are_rejected() {
    let backends: Vec<Arc<dyn EmbeddingBackend>> =
        vec![Scripted::new("remote", 1536, Behaviour::Ok), Scripted::new("local", 768, Behaviour::Ok)];
    let err = EmbeddingProvider::new(backends, Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 1536, actual: 768 }));

    assert!(EmbeddingProvider::new(Vec::new(), Duration::from_secs(1)).is_err());
}

#[tokio::test]
async fn hash_backend_from_settings() {
    let mut settings = EmbeddingSettings::default();
    settings.local.kind = LocalBackendKind::Hash;
    settings.local.dimension = 32;

    let provider = build_provider(&settings).unwrap();
    assert_eq!(provider.dim(), 32);
    let v = provider.embed("systems thinking").await.unwrap();
    assert_eq!(v, HashEmbedder::new(32).embed_sync("systems thinking"));
}

#[tokio::test]
async fn remote_backend_is_tried_before_local() {
    let mut settings = EmbeddingSettings::default();
    settings.remote.api_key = Some("sk-test".into());
    settings.remote.dimension = 16;
    settings.local.kind = LocalBackendKind::Hash;
    settings.local.dimension = 16;
    settings.remote.base_url = "http://127.0.0.1:9".into();
    settings.timeout_ms = 500;

    let provider = build_provider(&settings).unwrap();
    if !retrieve_embed::fake_embeddings_requested() {
        assert_eq!(provider.backend_names(), vec!["openai:text-embedding-3-small", "hash"]);
    }
    // The unreachable remote fails and the hash backend answers.
    assert_eq!(provider.embed("fallback path").await.map(|v| v.len()), Some(16));
}
