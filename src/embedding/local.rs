//! Local neural encoder backed by fastembed (ONNX Runtime, bundled).
//!
//! Models are downloaded from Hugging Face on first use and cached; after
//! that, encoding runs fully offline.

use anyhow::{anyhow, bail, Result};
use std::sync::Mutex;
use tracing::info;

use super::{EmbedError, EmbeddingEncoder};
use crate::config::EmbeddingConfig;

pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

/// fastembed `TextEmbedding` behind a mutex; inference needs exclusive access.
///
/// Padded positions in a batch are masked out before pooling, so batching
/// does not change a text's embedding. Set `embedding.batch_size = 1` for
/// bit-for-bit parity with single-text encoding.
pub struct LocalEncoder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Mutex<fastembed::TextEmbedding>,
}

impl LocalEncoder {
    /// Load the configured model and measure its output dimension.
    ///
    /// # Errors
    ///
    /// Unknown model name, download/initialisation failure, or a configured
    /// `embedding.dims` that disagrees with the model's actual output.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
        let fastembed_model = config_to_fastembed_model(&model_name)?;

        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;

        let mut encoder = Self {
            model_name,
            dims: 0,
            batch_size: config.batch_size,
            model: Mutex::new(model),
        };

        let sample = encoder.run(&[String::new()])?;
        let dims = sample.first().map(|v| v.len()).unwrap_or(0);
        if dims == 0 {
            bail!("Model '{}' returned an empty embedding", encoder.model_name);
        }
        if let Some(expected) = config.dims {
            if expected != dims {
                bail!(
                    "embedding.dims = {} but model '{}' produces {}-dimensional vectors",
                    expected,
                    encoder.model_name,
                    dims
                );
            }
        }
        encoder.dims = dims;

        info!(model = %encoder.model_name, dims, "local embedding model loaded");
        Ok(encoder)
    }

    fn run(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbedError::Backend("embedding model lock poisoned".to_string()))?;
        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbedError::Backend(e.to_string()))
    }
}

impl EmbeddingEncoder for LocalEncoder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts)
    }
}

fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, all-minilm-l12-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             bge-large-en-v1.5, nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ),
    }
}
