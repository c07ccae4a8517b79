//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text hierarchically by paragraphs, lines, sentences and words before
//! falling back to a hard character cut.
//!
//! All sizes are counted in characters (Unicode scalar values). Separators stay
//! attached to the text that precedes them, so the chunks of a document, with
//! each chunk's leading [`Chunk::overlap`] characters removed, concatenate back
//! to the document text.

use crate::document::{Chunk, Document};

/// Boundaries tried in order, from the most to the least meaningful.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting documents into chunks.
///
/// Implementations return chunks in document order with a sequence
/// [`index`](Chunk::index) that runs across all input documents.
pub trait Chunker: Send + Sync {
    /// Split documents into chunks.
    ///
    /// Documents with empty text produce no chunks.
    fn chunk(&self, documents: &[Document]) -> Vec<Chunk>;
}

/// Splits text hierarchically: paragraphs → lines → sentences → words → characters.
///
/// Pieces produced by the split are merged greedily into chunks of at most
/// `chunk_size` characters. Each chunk after the first starts with the
/// trailing whole pieces of its predecessor, up to `chunk_overlap` characters.
///
/// # Example
///
/// ```rust
/// use docqa_rag::{Chunker, Document, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(1000, 100);
/// let chunks = chunker.chunk(&[Document::new("notes.pdf", "A short note.")]);
/// assert_eq!(chunks.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk (a value of 0 is treated as 1)
    /// * `chunk_overlap` - characters shared between consecutive chunks, kept below `chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1) }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Compute the chunk spans for a single text.
    fn spans(&self, text: &str) -> Vec<Span> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        split_pieces(text, Offset::default(), self.chunk_size, &SEPARATORS, &mut pieces);
        merge_pieces(&pieces, self.chunk_size, self.chunk_overlap)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for document in documents {
            for span in self.spans(&document.text) {
                let index = chunks.len();
                chunks.push(Chunk {
                    id: format!("{}#{index}", document.source),
                    text: document.text[span.byte_start..span.byte_end].to_string(),
                    source: document.source.clone(),
                    page: document.page.or_else(|| page_for_offset(document, span.char_start)),
                    index,
                    start: span.char_start,
                    overlap: span.overlap,
                });
            }
        }

        chunks
    }
}

/// Resolve the page a joined-document offset falls on.
fn page_for_offset(document: &Document, char_offset: usize) -> Option<usize> {
    if document.page_offsets.is_empty() {
        return None;
    }
    let passed = document.page_offsets.iter().take_while(|start| **start <= char_offset).count();
    Some(passed.max(1))
}

#[derive(Debug, Clone, Copy, Default)]
struct Offset {
    byte: usize,
    char: usize,
}

/// A contiguous piece of the text no longer than the chunk size.
#[derive(Debug, Clone, Copy)]
struct Piece {
    byte_start: usize,
    byte_end: usize,
    char_start: usize,
    chars: usize,
}

/// A merged chunk before it is materialised.
#[derive(Debug, Clone, Copy)]
struct Span {
    byte_start: usize,
    byte_end: usize,
    char_start: usize,
    overlap: usize,
}

/// Recursively split `text` into pieces of at most `chunk_size` characters,
/// preferring earlier separators.
fn split_pieces(
    text: &str,
    base: Offset,
    chunk_size: usize,
    separators: &[&str],
    out: &mut Vec<Piece>,
) {
    let chars = text.chars().count();
    if chars <= chunk_size {
        out.push(Piece {
            byte_start: base.byte,
            byte_end: base.byte + text.len(),
            char_start: base.char,
            chars,
        });
        return;
    }

    let Some((separator, remaining_separators)) = separators.split_first() else {
        hard_cut(text, base, chunk_size, out);
        return;
    };

    let segments = split_keeping_separator(text, separator);
    if segments.len() == 1 {
        split_pieces(text, base, chunk_size, remaining_separators, out);
        return;
    }

    let mut offset = base;
    for segment in segments {
        split_pieces(segment, offset, chunk_size, remaining_separators, out);
        offset.byte += segment.len();
        offset.char += segment.chars().count();
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Cut text into consecutive pieces of exactly `chunk_size` characters (the last may be shorter).
fn hard_cut(text: &str, base: Offset, chunk_size: usize, out: &mut Vec<Piece>) {
    let mut piece_start = 0;
    let mut piece_chars = 0;
    let mut char_start = base.char;

    for (byte_index, _) in text.char_indices() {
        if piece_chars == chunk_size {
            out.push(Piece {
                byte_start: base.byte + piece_start,
                byte_end: base.byte + byte_index,
                char_start,
                chars: piece_chars,
            });
            char_start += piece_chars;
            piece_start = byte_index;
            piece_chars = 0;
        }
        piece_chars += 1;
    }

    if piece_chars > 0 {
        out.push(Piece {
            byte_start: base.byte + piece_start,
            byte_end: base.byte + text.len(),
            char_start,
            chars: piece_chars,
        });
    }
}

/// Greedily merge pieces into chunks, carrying whole trailing pieces as overlap.
fn merge_pieces(pieces: &[Piece], chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut len = 0;
    let mut overlap = 0;
    let mut next = 0;

    while next < pieces.len() {
        while next < pieces.len() && len + pieces[next].chars <= chunk_size {
            len += pieces[next].chars;
            next += 1;
        }

        spans.push(Span {
            byte_start: pieces[start].byte_start,
            byte_end: pieces[next - 1].byte_end,
            char_start: pieces[start].char_start,
            overlap,
        });

        if next == pieces.len() {
            break;
        }

        // Carry trailing pieces of this chunk into the next one.
        let previous_start = start;
        start = next;
        overlap = 0;
        while start > previous_start && overlap + pieces[start - 1].chars <= chunk_overlap {
            start -= 1;
            overlap += pieces[start].chars;
        }
        // The next chunk must still fit its first new piece.
        while start < next && overlap + pieces[next].chars > chunk_size {
            overlap -= pieces[start].chars;
            start += 1;
        }
        len = overlap;
    }

    spans
}
