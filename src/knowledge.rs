//! The knowledge base: extraction, chunking, embedding and indexing behind
//! one explicitly constructed handle.
//!
//! A [`KnowledgeBase`] owns one [`EmbeddingEncoder`] for its whole life and
//! one [`VectorIndex`] that is replaced wholesale by every [`build`].
//!
//! # Lifecycle
//!
//! ```text
//! start() ──► constructed ──build()/add()──► ready ──► shutdown()
//!                 │                            │
//!              query() → NotReady          query() → ranked metadata
//! ```
//!
//! # Concurrency
//!
//! `build` and `add` are serialized by a dedicated mutex, so two rebuilds
//! never interleave. The index itself sits behind an `RwLock`:
//!
//! - `build` embeds into a fresh index without holding the lock, then swaps
//!   it in under a short write lock.
//! - `add` validates and appends under the write lock; [`VectorIndex::add`]
//!   is all-or-nothing.
//! - `query` embeds without any lock and searches under a read lock, so
//!   queries run in parallel and never observe a partial batch.
//!
//! [`build`]: KnowledgeBase::build

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use docbase_core::chunk::{chunk_with_params, ChunkError, ChunkParams};
use docbase_core::embedding::{check_batch, EmbedError, EmbeddingEncoder};
use docbase_core::index::{FlatIndex, IndexError, Neighbor, VectorIndex};
use docbase_core::models::{ChunkMetadata, Document};

use crate::config::{ChunkingConfig, Config};
use crate::embedding::create_encoder;
use crate::extract::extract_document;

#[derive(Debug, Error)]
pub enum KbError {
    /// No `build` or `add` has completed yet.
    #[error("knowledge base is not ready: build it before querying")]
    NotReady,
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("knowledge base state poisoned by a panicked writer")]
    Poisoned,
}

/// A document left out of the index, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Chunks inserted by this call.
    pub chunks_ingested: usize,
    pub documents_ingested: usize,
    /// Rows in the index after this call.
    pub total_chunks: usize,
    pub skipped: Vec<SkippedDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BuildOutcome {
    Ingested(BuildReport),
    /// Every document was empty or unreadable. Not an error.
    NoData { skipped: Vec<SkippedDocument> },
}

impl BuildOutcome {
    pub fn chunks_ingested(&self) -> usize {
        match self {
            BuildOutcome::Ingested(report) => report.chunks_ingested,
            BuildOutcome::NoData { .. } => 0,
        }
    }

    pub fn skipped(&self) -> &[SkippedDocument] {
        match self {
            BuildOutcome::Ingested(report) => &report.skipped,
            BuildOutcome::NoData { skipped } => skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KbStats {
    pub ready: bool,
    pub chunks: usize,
    pub dims: usize,
    pub model: String,
    pub last_build: Option<DateTime<Utc>>,
}

struct Built<I> {
    index: I,
    at: DateTime<Utc>,
}

/// Chunk texts and their metadata, ready to embed.
#[derive(Default)]
struct Staged {
    texts: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
    documents: usize,
    skipped: Vec<SkippedDocument>,
}

pub struct KnowledgeBase<I: VectorIndex = FlatIndex> {
    encoder: Arc<dyn EmbeddingEncoder>,
    params: ChunkParams,
    preview_chars: usize,
    build_lock: Mutex<()>,
    state: RwLock<Option<Built<I>>>,
}

impl KnowledgeBase {
    /// Load the configured encoder and construct an empty knowledge base.
    ///
    /// Any failure here is meant to abort startup.
    pub fn start(config: &Config) -> Result<Self> {
        let encoder = create_encoder(&config.embedding)?;
        info!(
            model = encoder.model_name(),
            dims = encoder.dims(),
            "embedding encoder ready"
        );
        Ok(Self::with_encoder(&config.chunking, encoder)?)
    }

    /// Construct around an existing encoder, using a [`FlatIndex`].
    pub fn with_encoder(
        chunking: &ChunkingConfig,
        encoder: Arc<dyn EmbeddingEncoder>,
    ) -> Result<Self, KbError> {
        Self::with_index(chunking, encoder)
    }
}

impl<I: VectorIndex> KnowledgeBase<I> {
    /// Construct with an arbitrary index implementation.
    pub fn with_index(
        chunking: &ChunkingConfig,
        encoder: Arc<dyn EmbeddingEncoder>,
    ) -> Result<Self, KbError> {
        let params = ChunkParams::new(chunking.chunk_size, chunking.overlap)?;
        // Fail now rather than on first build if the encoder width is unusable.
        I::with_dims(encoder.dims())?;
        Ok(Self {
            encoder,
            params,
            preview_chars: chunking.preview_chars,
            build_lock: Mutex::new(()),
            state: RwLock::new(None),
        })
    }

    pub fn encoder(&self) -> &Arc<dyn EmbeddingEncoder> {
        &self.encoder
    }

    /// Replace the indexed set with `documents`.
    ///
    /// On error the previous index stays in place untouched.
    pub fn build(&self, documents: &[Document]) -> Result<BuildOutcome, KbError> {
        let _guard = self.build_lock.lock().map_err(|_| KbError::Poisoned)?;
        let staged = self.stage(documents);

        let mut index = I::with_dims(self.encoder.dims())?;
        let chunks = staged.texts.len();
        if chunks > 0 {
            let vectors = self.embed(&staged.texts)?;
            index.add(vectors, staged.metadatas)?;
        }
        let total = index.count();

        let mut state = self.state.write().map_err(|_| KbError::Poisoned)?;
        *state = Some(Built {
            index,
            at: Utc::now(),
        });
        drop(state);

        Ok(self.outcome(chunks, staged.documents, total, staged.skipped))
    }

    /// Append `documents` to the current index.
    ///
    /// Behaves like [`build`](Self::build) if nothing has been built yet.
    /// The whole batch is inserted or none of it is.
    pub fn add(&self, documents: &[Document]) -> Result<BuildOutcome, KbError> {
        let _guard = self.build_lock.lock().map_err(|_| KbError::Poisoned)?;
        let staged = self.stage(documents);

        let chunks = staged.texts.len();
        let vectors = if chunks > 0 {
            self.embed(&staged.texts)?
        } else {
            Vec::new()
        };

        let mut state = self.state.write().map_err(|_| KbError::Poisoned)?;
        let total = match state.as_mut() {
            Some(built) => {
                if chunks > 0 {
                    built.index.add(vectors, staged.metadatas)?;
                }
                built.at = Utc::now();
                built.index.count()
            }
            None => {
                let mut index = I::with_dims(self.encoder.dims())?;
                if chunks > 0 {
                    index.add(vectors, staged.metadatas)?;
                }
                let total = index.count();
                *state = Some(Built {
                    index,
                    at: Utc::now(),
                });
                total
            }
        };
        drop(state);

        Ok(self.outcome(chunks, staged.documents, total, staged.skipped))
    }

    /// The `k` nearest chunks to `text`, closest first.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<ChunkMetadata>, KbError> {
        Ok(self
            .search(text, k)?
            .into_iter()
            .map(|n| n.metadata)
            .collect())
    }

    /// Like [`query`](Self::query), with row numbers and distances.
    pub fn search(&self, text: &str, k: usize) -> Result<Vec<Neighbor>, KbError> {
        if !self.is_ready() {
            return Err(KbError::NotReady);
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.encoder.encode_one(text)?;
        check_batch(self.encoder.dims(), 1, std::slice::from_ref(&vector))?;

        let state = self.state.read().map_err(|_| KbError::Poisoned)?;
        let built = state.as_ref().ok_or(KbError::NotReady)?;
        Ok(built.index.search(&vector, k)?)
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Number of indexed chunks; zero before the first build.
    pub fn count(&self) -> usize {
        self.state
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|b| b.index.count()))
            .unwrap_or(0)
    }

    pub fn stats(&self) -> KbStats {
        let (ready, chunks, last_build) = match self.state.read() {
            Ok(state) => match state.as_ref() {
                Some(built) => (true, built.index.count(), Some(built.at)),
                None => (false, 0, None),
            },
            Err(_) => (false, 0, None),
        };
        KbStats {
            ready,
            chunks,
            dims: self.encoder.dims(),
            model: self.encoder.model_name().to_string(),
            last_build,
        }
    }

    /// Tear down, returning the final statistics.
    pub fn shutdown(self) -> KbStats {
        let stats = self.stats();
        info!(chunks = stats.chunks, "knowledge base shut down");
        stats
    }

    fn stage(&self, documents: &[Document]) -> Staged {
        let mut staged = Staged::default();
        for doc in documents {
            let extraction = extract_document(doc);
            if let Some(reason) = extraction.reason() {
                if extraction.is_failed() {
                    warn!(source = %doc.id, %reason, "extraction failed, skipping document");
                    staged.skipped.push(SkippedDocument {
                        source: doc.id.clone(),
                        reason: reason.to_string(),
                    });
                    continue;
                }
                warn!(source = %doc.id, %reason, "extraction degraded, using fallback text");
            }

            if extraction.text.trim().is_empty() {
                debug!(source = %doc.id, "no extractable text");
                staged.skipped.push(SkippedDocument {
                    source: doc.id.clone(),
                    reason: "no extractable text".to_string(),
                });
                continue;
            }

            let chunks = chunk_with_params(&extraction.text, &self.params);
            debug!(source = %doc.id, format = %doc.format, chunks = chunks.len(), "chunked");
            for chunk in chunks {
                staged.metadatas.push(ChunkMetadata::from_chunk(
                    &doc.id,
                    &chunk,
                    self.preview_chars,
                ));
                staged.texts.push(chunk.text);
            }
            staged.documents += 1;
        }
        staged
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        let vectors = self.encoder.encode(texts)?;
        check_batch(self.encoder.dims(), texts.len(), &vectors)?;
        Ok(vectors)
    }

    fn outcome(
        &self,
        chunks: usize,
        documents: usize,
        total: usize,
        skipped: Vec<SkippedDocument>,
    ) -> BuildOutcome {
        if chunks == 0 {
            info!(skipped = skipped.len(), "no chunks produced");
            return BuildOutcome::NoData { skipped };
        }
        info!(
            chunks,
            documents,
            total,
            skipped = skipped.len(),
            "knowledge base updated"
        );
        BuildOutcome::Ingested(BuildReport {
            chunks_ingested: chunks,
            documents_ingested: documents,
            total_chunks: total,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbase_core::embedding::HashingEncoder;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn kb() -> KnowledgeBase {
        let chunking = ChunkingConfig {
            chunk_size: 100,
            overlap: 10,
            preview_chars: 20,
        };
        KnowledgeBase::with_encoder(&chunking, Arc::new(HashingEncoder::new(64).unwrap()))
            .unwrap()
    }

    /// Drops the last vector of every batch once `short` is set.
    struct FlakyEncoder {
        inner: HashingEncoder,
        short: AtomicBool,
    }

    impl EmbeddingEncoder for FlakyEncoder {
        fn model_name(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            let mut out = self.inner.encode(texts)?;
            if self.short.load(Ordering::SeqCst) {
                out.pop();
            }
            Ok(out)
        }
    }

    fn flaky() -> (KnowledgeBase, Arc<FlakyEncoder>) {
        let encoder = Arc::new(FlakyEncoder {
            inner: HashingEncoder::new(16).unwrap(),
            short: AtomicBool::new(false),
        });
        let kb = KnowledgeBase::with_encoder(&ChunkingConfig::default(), encoder.clone()).unwrap();
        (kb, encoder)
    }

    #[test]
    fn test_query_before_build_is_not_ready() {
        let kb = kb();
        assert!(!kb.is_ready());
        assert!(matches!(kb.query("anything", 3), Err(KbError::NotReady)));
        assert!(matches!(kb.query("anything", 0), Err(KbError::NotReady)));
    }

    #[test]
    fn test_build_then_query() {
        let kb = kb();
        let outcome = kb
            .build(&[
                Document::new("fruit.txt", "apples oranges pears"),
                Document::new("tools.md", "hammer wrench screwdriver"),
            ])
            .unwrap();
        assert_eq!(outcome.chunks_ingested(), 2);
        assert_eq!(kb.count(), 2);

        let hits = kb.query("wrench hammer", 2).unwrap();
        assert_eq!(hits[0].source, "tools.md");
        assert_eq!(hits[0].preview_text, "hammer wrench screwd");
        assert!(kb.query("wrench", 0).unwrap().is_empty());
    }

    #[test]
    fn test_build_replaces_previous_set() {
        let kb = kb();
        kb.build(&[Document::new("a.txt", "alpha"), Document::new("b.txt", "beta")])
            .unwrap();
        kb.build(&[Document::new("c.txt", "gamma")]).unwrap();
        assert_eq!(kb.count(), 1);
        assert_eq!(kb.query("alpha", 5).unwrap()[0].source, "c.txt");
    }

    #[test]
    fn test_no_data_outcome() {
        let kb = kb();
        let outcome = kb
            .build(&[Document::new("empty.txt", ""), Document::new("blank.md", "  \n ")])
            .unwrap();
        match outcome {
            BuildOutcome::NoData { skipped } => assert_eq!(skipped.len(), 2),
            other => panic!("expected no data, got {:?}", other),
        }
        assert!(kb.is_ready());
        assert!(kb.query("anything", 5).unwrap().is_empty());
    }

    #[test]
    fn test_failed_pdf_is_skipped_not_indexed() {
        let kb = kb();
        let outcome = kb
            .build(&[
                Document::new("broken.pdf", "definitely not a pdf"),
                Document::new("notes.txt", "real content"),
            ])
            .unwrap();
        assert_eq!(outcome.chunks_ingested(), 1);
        assert_eq!(outcome.skipped().len(), 1);
        assert_eq!(outcome.skipped()[0].source, "broken.pdf");
        assert_eq!(kb.count(), 1);
    }

    #[test]
    fn test_add_appends_and_initialises() {
        let kb = kb();
        kb.add(&[Document::new("a.txt", "alpha")]).unwrap();
        assert!(kb.is_ready());
        let outcome = kb.add(&[Document::new("b.txt", "beta")]).unwrap();
        match outcome {
            BuildOutcome::Ingested(report) => {
                assert_eq!(report.chunks_ingested, 1);
                assert_eq!(report.total_chunks, 2);
            }
            other => panic!("expected ingested, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_build_keeps_previous_index() {
        let (kb, encoder) = flaky();
        kb.build(&[Document::new("a.txt", "alpha")]).unwrap();
        encoder.short.store(true, Ordering::SeqCst);

        let err = kb
            .build(&[Document::new("b.txt", "beta"), Document::new("c.txt", "gamma")])
            .unwrap_err();
        assert!(matches!(
            err,
            KbError::Embed(EmbedError::CountMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert_eq!(kb.count(), 1);

        encoder.short.store(false, Ordering::SeqCst);
        assert_eq!(kb.query("beta", 5).unwrap()[0].source, "a.txt");
    }

    #[test]
    fn test_failed_add_keeps_previous_rows() {
        let (kb, encoder) = flaky();
        kb.build(&[Document::new("a.txt", "alpha")]).unwrap();
        encoder.short.store(true, Ordering::SeqCst);

        assert!(kb
            .add(&[Document::new("b.txt", "beta"), Document::new("c.txt", "gamma")])
            .is_err());
        assert_eq!(kb.count(), 1);
    }

    #[test]
    fn test_failed_first_build_stays_not_ready() {
        let (kb, encoder) = flaky();
        encoder.short.store(true, Ordering::SeqCst);
        assert!(kb.build(&[Document::new("a.txt", "alpha")]).is_err());
        assert!(!kb.is_ready());
    }

    #[test]
    fn test_invalid_chunking_rejected() {
        let chunking = ChunkingConfig {
            chunk_size: 10,
            overlap: 10,
            preview_chars: 5,
        };
        let err = KnowledgeBase::with_encoder(&chunking, Arc::new(HashingEncoder::new(8).unwrap()))
            .err()
            .unwrap();
        assert!(matches!(err, KbError::Chunk(ChunkError::OverlapTooLarge { .. })));
    }

    #[test]
    fn test_stats_and_shutdown() {
        let kb = kb();
        let before = kb.stats();
        assert!(!before.ready);
        assert_eq!(before.dims, 64);
        assert_eq!(before.model, "hashing-64");
        assert!(before.last_build.is_none());

        kb.build(&[Document::new("a.txt", "alpha")]).unwrap();
        let after = kb.shutdown();
        assert!(after.ready);
        assert_eq!(after.chunks, 1);
        assert!(after.last_build.is_some());
    }
}
