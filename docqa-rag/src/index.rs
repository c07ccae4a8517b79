//! Request-scoped in-memory vector index.
//!
//! [`VectorIndex`] owns the [`IndexEntry`] values built for one pipeline run
//! and answers nearest-neighbour queries by exhaustive scan, which is plenty
//! for the handful of chunks a single PDF produces.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Chunk, IndexEntry, SearchResult};
use crate::embedding::EmbeddingClient;
use crate::error::Result;

/// How the index scores a stored vector against a query vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Cosine similarity in `[-1, 1]`; 0 when either vector has zero magnitude.
    #[default]
    Cosine,
    /// `1 / (1 + euclidean_distance)`, in `(0, 1]`.
    Euclidean,
}

impl SimilarityMetric {
    /// Score two vectors; higher is more similar.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::Euclidean => 1.0 / (1.0 + euclidean_distance(a, b)),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// An in-memory similarity index over embedded chunks.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{SimilarityMetric, VectorIndex};
///
/// let index = VectorIndex::build(chunks, &embedder, SimilarityMetric::Cosine).await?;
/// let results = index.query(&embedder, "What university did the candidate attend?", 4).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    metric: SimilarityMetric,
}

impl VectorIndex {
    /// Create an index from already-embedded entries.
    pub fn from_entries(entries: Vec<IndexEntry>, metric: SimilarityMetric) -> Self {
        Self { entries, metric }
    }

    /// Embed `chunks` through `embedder` and index the results.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`](crate::RagError::Embedding) when the
    /// embedding client exhausts its retry budget.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &EmbeddingClient,
        metric: SimilarityMetric,
    ) -> Result<Self> {
        let entries = embedder.embed_chunks(chunks).await?;
        Ok(Self::from_entries(entries, metric))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Embed `text` and return its `k` nearest chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`](crate::RagError::Embedding) if the
    /// query cannot be embedded.
    pub async fn query(
        &self,
        embedder: &EmbeddingClient,
        text: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = embedder.embed_query(text).await?;
        Ok(self.search(&embedding, k))
    }

    /// Return the `k` entries most similar to `embedding`.
    ///
    /// `k` is clamped to `1..=len`. Results are ordered by descending score;
    /// equal scores keep the lower chunk sequence index first.
    pub fn search(&self, embedding: &[f32], k: usize) -> Vec<SearchResult> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let k = k.clamp(1, self.entries.len());

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (self.metric.score(&entry.embedding, embedding), entry))
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.index.cmp(&b.chunk.index))
        });
        scored.truncate(k);

        debug!(
            result_count = scored.len(),
            top_score = scored.first().map(|(score, _)| *score),
            "index search completed"
        );

        scored
            .into_iter()
            .map(|(score, entry)| SearchResult { chunk: entry.chunk.clone(), score })
            .collect()
    }
}
