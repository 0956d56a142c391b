use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunking::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{FusionConfig, FusionStrategy};

/// Layered configuration source: `config.toml`, then `config.<env>.toml`,
/// then `APP_*` environment variables (`APP_STORE__POOL_SIZE=4` sets
/// `store.pool_size`).
pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed, validated settings. Missing keys take their defaults.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub fusion: FusionSettings,
    pub search: SearchSettings,
    pub embedding: EmbeddingSettings,
    pub store: StoreSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.fusion.config().validate()?;
        self.search.validate()?;
        self.embedding.validate()?;
        self.store.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    pub vector_weight: f64,
    pub keyword_weight: f64,
    pub rrf_k: u32,
    pub strategy: FusionStrategy,
}

impl Default for FusionSettings {
    fn default() -> Self {
        let base = FusionConfig::default();
        Self {
            vector_weight: base.vector_weight,
            keyword_weight: base.keyword_weight,
            rrf_k: base.rrf_k,
            strategy: FusionStrategy::default(),
        }
    }
}

impl FusionSettings {
    pub fn config(&self) -> FusionConfig {
        FusionConfig { vector_weight: self.vector_weight, keyword_weight: self.keyword_weight, rrf_k: self.rrf_k }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    pub min_query_len: usize,
    pub vector_threshold: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_limit: 10, max_limit: 50, min_query_len: 2, vector_threshold: 0.4 }
    }
}

impl SearchSettings {
    fn validate(&self) -> Result<()> {
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(Error::InvalidConfig(format!(
                "search.default_limit must be in 1..={}, got {}",
                self.max_limit, self.default_limit
            )));
        }
        if !(0.0..=1.0).contains(&self.vector_threshold) {
            return Err(Error::InvalidConfig(format!(
                "search.vector_threshold {} outside [0, 1]",
                self.vector_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteEmbeddingSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
}

impl Default for RemoteEmbeddingSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }
}

impl RemoteEmbeddingSettings {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalBackendKind {
    #[default]
    Ollama,
    Candle,
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalEmbeddingSettings {
    pub kind: LocalBackendKind,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    /// Directory holding `config.json`, `tokenizer.json` and weights for the
    /// in-process backend.
    pub model_dir: Option<String>,
}

impl Default for LocalEmbeddingSettings {
    fn default() -> Self {
        Self {
            kind: LocalBackendKind::default(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 768,
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub remote: RemoteEmbeddingSettings,
    pub local: LocalEmbeddingSettings,
    pub timeout_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            remote: RemoteEmbeddingSettings::default(),
            local: LocalEmbeddingSettings::default(),
            timeout_ms: 60_000,
        }
    }
}

impl EmbeddingSettings {
    /// Dimension every backend and the vector column must share.
    pub fn dimension(&self) -> usize {
        if self.remote.is_configured() {
            self.remote.dimension
        } else {
            self.local.dimension
        }
    }

    fn validate(&self) -> Result<()> {
        if self.local.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.local.dimension must be positive".to_string()));
        }
        if self.remote.is_configured() && self.remote.dimension != self.local.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.remote.dimension,
                actual: self.local.dimension,
            });
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("embedding.timeout_ms must be positive".to_string()));
        }
        if self.local.kind == LocalBackendKind::Candle && self.local.model_dir.is_none() {
            return Err(Error::InvalidConfig(
                "embedding.local.model_dir is required for the candle backend".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub data_dir: String,
    pub vector_table: String,
    pub keyword_index_dir: String,
    pub pool_size: usize,
    pub acquire_timeout_ms: u64,
    pub query_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.retrieve".to_string(),
            vector_table: "document_embeddings".to_string(),
            keyword_index_dir: "keyword_index".to_string(),
            pool_size: 10,
            acquire_timeout_ms: 5_000,
            query_timeout_ms: 10_000,
        }
    }
}

impl StoreSettings {
    fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("store.pool_size must be positive".to_string()));
        }
        if self.vector_table.trim().is_empty() {
            return Err(Error::InvalidConfig("store.vector_table must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn data_path(&self) -> PathBuf {
        expand_path(&self.data_dir)
    }

    /// LanceDB directory inside `data_dir`.
    pub fn vector_path(&self) -> PathBuf {
        self.data_path().join("lancedb")
    }

    pub fn keyword_path(&self) -> PathBuf {
        resolve_with_base(&self.data_path(), &self.keyword_index_dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_from(toml: &str) -> Result<Settings> {
        Config::from_figment(Figment::from(Toml::string(toml))).settings()
    }

    #[test]
    fn empty_source_yields_defaults() {
        let s = settings_from("").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.chunking.chunk_size, 800);
        assert_eq!(s.fusion.rrf_k, 60);
        assert_eq!(s.fusion.strategy, FusionStrategy::Rrf);
        assert_eq!(s.search.max_limit, 50);
        assert_eq!(s.embedding.dimension(), 768);
        assert_eq!(s.store.pool_size, 10);
    }

    #[test]
    fn partial_sections_merge_over_defaults() {
        let s = settings_from(
            r#"
            [chunking]
            chunk_size = 400
            [fusion]
            strategy = "weighted"
            [store]
            pool_size = 3
            "#,
        )
        .unwrap();
        assert_eq!(s.chunking.chunk_size, 400);
        assert_eq!(s.chunking.chunk_overlap, 150);
        assert_eq!(s.fusion.strategy, FusionStrategy::Weighted);
        assert_eq!(s.store.pool_size, 3);
        assert_eq!(s.store.vector_table, "document_embeddings");
    }

    #[test]
    fn overlap_larger_than_size_is_rejected() {
        let err = settings_from("[chunking]\nchunk_size = 100\nchunk_overlap = 200\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn remote_and_local_dimensions_must_agree() {
        let err = settings_from("[embedding.remote]\napi_key = \"sk-test\"\n").unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 1536, actual: 768 }));

        let s = settings_from(
            "[embedding.remote]\napi_key = \"sk-test\"\ndimension = 768\n[embedding.local]\ndimension = 768\n",
        )
        .unwrap();
        assert!(s.embedding.remote.is_configured());
        assert_eq!(s.embedding.dimension(), 768);
    }

    #[test]
    fn blank_api_key_leaves_remote_unconfigured() {
        let s = settings_from("[embedding.remote]\napi_key = \"  \"\n").unwrap();
        assert!(!s.embedding.remote.is_configured());
    }

    #[test]
    fn candle_requires_model_dir() {
        assert!(settings_from("[embedding.local]\nkind = \"candle\"\n").is_err());
        assert!(settings_from("[embedding.local]\nkind = \"candle\"\nmodel_dir = \"/models/bge\"\n").is_ok());
    }

    #[test]
    fn out_of_range_weights_are_rejected() {
        assert!(settings_from("[fusion]\nvector_weight = 2.0\n").is_err());
        assert!(settings_from("[search]\nvector_threshold = 1.5\n").is_err());
    }

    #[test]
    fn config_get_extracts_nested_keys() {
        let cfg = Config::from_figment(Figment::from(Toml::string("[store]\nvector_table = \"docs\"\n")));
        let table: String = cfg.get("store.vector_table").unwrap();
        assert_eq!(table, "docs");
        assert!(cfg.get::<String>("store.missing").is_err());
    }

    #[test]
    fn resolve_with_base_keeps_absolute_paths() {
        let base = Path::new("/var/data");
        assert_eq!(resolve_with_base(base, "idx"), PathBuf::from("/var/data/idx"));
        assert_eq!(resolve_with_base(base, "/abs/idx"), PathBuf::from("/abs/idx"));
    }
}
