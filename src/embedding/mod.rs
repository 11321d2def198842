//! Encoder selection.
//!
//! The [`EmbeddingEncoder`] trait and the deterministic [`HashingEncoder`]
//! come from `docbase-core`; this module adds the fastembed-backed
//! [`LocalEncoder`] and [`create_encoder`], which picks one from config.
//!
//! | `embedding.provider` | Encoder |
//! |----------------------|---------|
//! | `"local"` | [`LocalEncoder`] (feature `local-embeddings`) |
//! | `"hashing"` | [`HashingEncoder`] with `embedding.dims` buckets (default 384) |
//!
//! Encoders are expensive to load, so the knowledge base creates exactly
//! one at startup and reuses it across rebuilds.

#[cfg(feature = "local-embeddings")]
mod local;

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::EmbeddingConfig;

pub use docbase_core::embedding::{EmbedError, EmbeddingEncoder, HashingEncoder};
#[cfg(feature = "local-embeddings")]
pub use local::LocalEncoder;

/// Bucket count for the hashing encoder when `embedding.dims` is unset.
pub const DEFAULT_HASHING_DIMS: usize = 384;

/// Create the encoder named by `config.provider`.
///
/// # Errors
///
/// Unknown provider, a provider whose feature is not compiled in, or a
/// model that fails to load. Callers treat this as fatal.
pub fn create_encoder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingEncoder>> {
    match config.provider.as_str() {
        "hashing" => {
            let dims = config.dims.unwrap_or(DEFAULT_HASHING_DIMS);
            Ok(Arc::new(HashingEncoder::new(dims)?))
        }
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEncoder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
