//! Fixed-size text chunker with overlap.
//!
//! Walks the extracted text in windows of at most `chunk_size` characters.
//! Each window ends at the best natural break (paragraph, line, sentence,
//! then word) found in the last fifth of the window; if there is none it
//! ends exactly at `chunk_size`. The next window starts `overlap`
//! characters before the previous one ended, so with no natural breaks the
//! stride is exactly `chunk_size - overlap`.
//!
//! Offsets are measured in characters and come straight from the windows
//! the chunker actually produced, so `char_start`/`char_end` always match
//! the chunk text.
//!
//! # Guarantees
//!
//! - Empty text yields no chunks.
//! - Every chunk has `1..=chunk_size` characters.
//! - `char_start` strictly increases; consecutive chunks overlap by at most
//!   `overlap` characters and never leave a gap.
//! - The last chunk ends at the end of the text.
//! - Output depends only on `(text, chunk_size, overlap)`.
//!
//! # Example
//!
//! ```rust
//! use docbase_core::chunk::chunk_text;
//!
//! let text = "x".repeat(1000);
//! let chunks = chunk_text(&text, 800, 100).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!((chunks[0].char_start, chunks[0].char_end), (0, 800));
//! assert_eq!((chunks[1].char_start, chunks[1].char_end), (700, 1000));
//! ```

use thiserror::Error;

use crate::models::Chunk;

/// Natural breaks are searched in the last `1 / BREAK_WINDOW_DIVISOR` of a window.
const BREAK_WINDOW_DIVISOR: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk_size must be > 0")]
    ZeroChunkSize,
    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Nominal advance between chunk starts when no natural break fires.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split `text` into overlapping chunks. See the module docs for the rules.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkError> {
    let params = ChunkParams::new(chunk_size, overlap)?;
    Ok(chunk_with_params(text, &params))
}

/// Same as [`chunk_text`] with pre-validated parameters.
pub fn chunk_with_params(text: &str, params: &ChunkParams) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();
    if total == 0 {
        return chunks;
    }

    let mut start = 0usize;
    loop {
        let hard_end = (start + params.chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            find_break_point(&chars, start, hard_end, params.overlap)
        };

        chunks.push(Chunk {
            sequence_index: chunks.len(),
            char_start: start,
            char_end: end,
            text: chars[start..end].iter().collect(),
        });

        if end == total {
            break;
        }
        // end - start > overlap, so this always advances.
        start = end - params.overlap;
    }

    chunks
}

/// Pick the end of the window starting at `start`, preferring natural breaks.
///
/// Candidates are limited to the last fifth of the window and to ends that
/// leave more than `overlap` characters in the chunk.
fn find_break_point(chars: &[char], start: usize, hard_end: usize, overlap: usize) -> usize {
    let window = (hard_end - start) / BREAK_WINDOW_DIVISOR;
    let lowest = hard_end.saturating_sub(window).max(start + overlap + 1);
    if lowest > hard_end {
        return hard_end;
    }
    let candidates = || (lowest..=hard_end).rev();

    // Paragraph break
    if let Some(p) =
        candidates().find(|&p| p >= start + 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n')
    {
        return p;
    }
    // Line break
    if let Some(p) = candidates().find(|&p| chars[p - 1] == '\n') {
        return p;
    }
    // Sentence end followed by whitespace
    if let Some(p) = candidates().find(|&p| {
        p < chars.len() && matches!(chars[p - 1], '.' | '!' | '?') && chars[p].is_whitespace()
    }) {
        return p;
    }
    // Word boundary
    if let Some(p) = candidates().find(|&p| chars[p - 1].is_whitespace()) {
        return p;
    }

    hard_end
}
