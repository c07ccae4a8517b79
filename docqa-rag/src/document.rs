//! Data types for documents, chunks, index entries and answers.

use serde::{Deserialize, Serialize};

/// Text loaded from one uploaded file, or from one page of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The uploaded file name this text came from.
    pub source: String,
    /// The text content.
    pub text: String,
    /// 1-based page number when the loader produced one document per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Character offsets at which each page starts, when pages were joined.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_offsets: Vec<usize>,
}

impl Document {
    /// Create a document with no page information.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source: source.into(), text: text.into(), page: None, page_offsets: Vec::new() }
    }

    /// Create a document for a single page.
    pub fn page(source: impl Into<String>, page: usize, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            page: Some(page),
            page_offsets: Vec::new(),
        }
    }
}

/// A contiguous, bounded-length substring of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// `{source}#{index}`.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// The source document's file name.
    pub source: String,
    /// The source page, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Sequence index across the whole request.
    pub index: usize,
    /// Character offset of the chunk inside its document.
    pub start: usize,
    /// Number of leading characters shared with the previous chunk of the same document.
    pub overlap: usize,
}

/// A [`Chunk`] paired with its embedding vector.
///
/// Entries are produced by [`EmbeddingClient::embed_chunks`](crate::EmbeddingClient::embed_chunks),
/// so an index can never hold a chunk whose vector was not computed.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub(crate) chunk: Chunk,
    pub(crate) embedding: Vec<f32>,
}

impl IndexEntry {
    /// The indexed chunk.
    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// A user question about one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    /// The question text.
    pub input: String,
    /// The target document's file name.
    pub file_name: String,
}

impl Query {
    pub fn new(input: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self { input: input.into(), file_name: file_name.into() }
    }
}

/// Non-fatal signal that low-ranked context was dropped to fit the prompt budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextTruncated {
    /// Number of chunks dropped.
    pub dropped: usize,
    /// Number of chunks kept.
    pub kept: usize,
}

/// The answer produced for a [`Query`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The completion text.
    pub text: String,
    /// The chunks that were placed in the prompt, in retrieval order.
    pub sources: Vec<SearchResult>,
    /// Set when the prompt assembler dropped context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_truncated: Option<ContextTruncated>,
}
