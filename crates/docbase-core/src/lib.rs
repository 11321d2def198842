//! # docbase core
//!
//! Dependency-light building blocks for the docbase retrieval pipeline:
//! the document and chunk data model, the overlapping text chunker, the
//! embedding encoder trait, and the exact nearest-neighbour index.
//!
//! This crate performs no I/O and starts no runtime. Format-specific text
//! extraction, neural encoders, configuration and the knowledge-base
//! orchestrator live in the `docbase` application crate.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `DocumentFormat`, `Document`, `Chunk`, `ChunkMetadata` |
//! | [`chunk`] | Fixed-size chunking with overlap and natural-break snapping |
//! | [`embedding`] | `EmbeddingEncoder` trait, `HashingEncoder`, distance helpers |
//! | [`index`] | `VectorIndex` trait and the exact `FlatIndex` |

pub mod chunk;
pub mod embedding;
pub mod index;
pub mod models;
