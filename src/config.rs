//! TOML configuration with environment overrides.
//!
//! Every section is optional and defaulted, so `docbase` runs with no file
//! at all. Values are resolved in three layers: built-in defaults, the TOML
//! file (if given), then `DOCBASE_*` environment variables.
//!
//! ```toml
//! [chunking]
//! chunk_size = 800
//! overlap = 100
//! preview_chars = 200
//!
//! [retrieval]
//! default_k = 5
//!
//! [embedding]
//! provider = "local"          # or "hashing"
//! model = "all-minilm-l6-v2"
//! batch_size = 64
//!
//! [server]
//! bind = "127.0.0.1:8000"
//!
//! [assets]
//! root = "./assets"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_overlap() -> usize {
    100
}
fn default_preview_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
        }
    }
}

fn default_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}

impl EmbeddingConfig {
    /// Deterministic hashing encoder with `dims` buckets. Handy for tests.
    pub fn hashing(dims: usize) -> Self {
        Self {
            provider: "hashing".to_string(),
            model: None,
            dims: Some(dims),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    ["md", "txt", "json", "pdf", "html", "htm"]
        .iter()
        .map(|ext| format!("**/*.{}", ext))
        .collect()
}

/// Load configuration: defaults, then the optional TOML file, then the
/// environment. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read config file: {}", p.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Apply `DOCBASE_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parsed::<usize, _>(&lookup, "DOCBASE_CHUNK_SIZE")? {
        config.chunking.chunk_size = v;
    }
    if let Some(v) = parsed::<usize, _>(&lookup, "DOCBASE_CHUNK_OVERLAP")? {
        config.chunking.overlap = v;
    }
    if let Some(v) = lookup("DOCBASE_EMBEDDING_PROVIDER") {
        config.embedding.provider = v;
    }
    if let Some(v) = lookup("DOCBASE_EMBEDDING_MODEL") {
        config.embedding.model = Some(v);
    }
    if let Some(v) = parsed::<usize, _>(&lookup, "DOCBASE_EMBEDDING_DIMS")? {
        config.embedding.dims = Some(v);
    }
    if let Some(v) = lookup("DOCBASE_BIND") {
        config.server.bind = v;
    }
    if let Some(v) = lookup("DOCBASE_ASSETS_DIR") {
        config.assets.root = Some(PathBuf::from(v));
    }
    Ok(())
}

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}={:?} is invalid: {}", key, raw, e)),
        None => Ok(None),
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }
    if config.chunking.preview_chars == 0 {
        bail!("chunking.preview_chars must be > 0");
    }
    if config.retrieval.default_k < 1 {
        bail!("retrieval.default_k must be >= 1");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    match config.embedding.provider.as_str() {
        "local" | "hashing" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local or hashing.",
            other
        ),
    }

    Ok(())
}
