//! Core data models shared by the ingestion and retrieval pipeline.
//!
//! A [`Document`] is raw bytes plus a [`DocumentFormat`]. Extraction turns
//! it into text, the chunker turns text into [`Chunk`]s, and each chunk is
//! indexed alongside a [`ChunkMetadata`] record that callers get back from
//! queries.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported document formats, resolved once from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// `.txt`
    PlainText,
    /// `.md`
    Markdown,
    /// `.json`
    StructuredData,
    /// `.pdf`
    PortableDocument,
    /// `.html` / `.htm`
    Markup,
    /// Anything else; extracted through the lossy-decode fallback.
    Unknown,
}

impl DocumentFormat {
    /// Map a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => DocumentFormat::PlainText,
            "md" => DocumentFormat::Markdown,
            "json" => DocumentFormat::StructuredData,
            "pdf" => DocumentFormat::PortableDocument,
            "html" | "htm" => DocumentFormat::Markup,
            _ => DocumentFormat::Unknown,
        }
    }

    /// Infer the format from a file name or path.
    pub fn from_filename(name: &str) -> Self {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(DocumentFormat::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::PlainText => "plain_text",
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::StructuredData => "structured_data",
            DocumentFormat::PortableDocument => "portable_document",
            DocumentFormat::Markup => "markup",
            DocumentFormat::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw document handed to the knowledge base for ingestion.
///
/// `id` is the source filename; it becomes the `source` field of every
/// chunk produced from this document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Create a document, inferring its format from the filename extension.
    pub fn new(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let id = id.into();
        let format = DocumentFormat::from_filename(&id);
        Self {
            id,
            format,
            bytes: bytes.into(),
        }
    }

    /// Create a document with an explicitly declared format.
    pub fn with_format(
        id: impl Into<String>,
        format: DocumentFormat,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: id.into(),
            format,
            bytes: bytes.into(),
        }
    }
}

/// A contiguous span of a document's extracted text.
///
/// Offsets are character (not byte) offsets into the extracted text,
/// end-exclusive. Within one document `char_start` strictly increases with
/// `sequence_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence_index: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
}

impl Chunk {
    /// Number of characters in the chunk.
    pub fn len(&self) -> usize {
        self.char_end - self.char_start
    }

    pub fn is_empty(&self) -> bool {
        self.char_end == self.char_start
    }

    /// The first `max_chars` characters of the chunk text.
    pub fn preview(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}

/// Metadata stored next to every indexed vector and returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document id (filename).
    pub source: String,
    pub sequence_index: usize,
    pub char_start: usize,
    pub char_end: usize,
    /// Bounded-length prefix of the chunk text, for display.
    pub preview_text: String,
}

impl ChunkMetadata {
    pub fn from_chunk(source: &str, chunk: &Chunk, preview_chars: usize) -> Self {
        Self {
            source: source.to_string(),
            sequence_index: chunk.sequence_index,
            char_start: chunk.char_start,
            char_end: chunk.char_end,
            preview_text: chunk.preview(preview_chars),
        }
    }
}
