//! # docbase
//!
//! A small retrieval-augmented knowledge base. Documents in several formats
//! are turned into text, split into overlapping chunks, embedded, and
//! stored in an exact nearest-neighbour index that answers similarity
//! queries with ranked chunk metadata.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌─────────┐   ┌─────────┐
//! │ Extract  │──▶│  Chunk  │──▶│  Embed  │──▶│  Index  │
//! │ md/html/ │   │ overlap │   │ encoder │   │  flat   │
//! │ json/pdf │   └─────────┘   └─────────┘   └────┬────┘
//! └──────────┘                                    │
//!                      ┌──────────────────────────┤
//!                      ▼                          ▼
//!                 ┌──────────┐              ┌──────────┐
//!                 │   CLI    │              │   HTTP   │
//!                 │(docbase) │              │  (axum)  │
//!                 └──────────┘              └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docbase extract manual.pdf
//! docbase query "how do I reset the device" --docs ./assets -k 3
//! docbase serve --docs ./assets
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and `DOCBASE_*` overrides |
//! | [`extract`] | Per-format text extraction |
//! | [`embedding`] | Encoder selection (hashing, fastembed) |
//! | [`knowledge`] | The knowledge base: build, add, query |
//! | [`assets`] | Directory scanning into documents |
//! | [`server`] | HTTP API |
//!
//! Chunking, the encoder trait and the vector index live in
//! [`docbase_core`].

pub mod assets;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod knowledge;
pub mod server;
