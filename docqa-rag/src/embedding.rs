//! Embedding provider trait and the resilient client the pipeline calls it through.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, error, warn};

use crate::config::ProviderConfig;
use crate::document::{Chunk, IndexEntry};
use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (OpenAI, local models, …)
/// behind a unified async interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short provider name used in errors and logs.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Calls an [`EmbeddingProvider`] with a per-call timeout, bounded retries with
/// exponential backoff, and at most `max_concurrency` batches in flight.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    config: ProviderConfig,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl EmbeddingClient {
    /// Wrap a provider with the limits from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the config has a zero limit.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    /// Embed every chunk, pairing each with its vector.
    ///
    /// Entries come back in the same order as `chunks`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] once a batch has exhausted its retry
    /// budget, or immediately if the provider returns vectors of the wrong
    /// shape.
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexEntry>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let batches: Vec<&[&str]> = texts.chunks(self.config.batch_size).collect();
        debug!(
            provider = self.provider.name(),
            chunk_count = chunks.len(),
            batch_count = batches.len(),
            max_concurrency = self.config.max_concurrency,
            "embedding chunks"
        );

        let calls: Vec<_> =
            batches.into_iter().map(|batch| self.embed_batch_with_retry(batch)).collect();
        let embeddings: Vec<Vec<Vec<f32>>> = stream::iter(calls)
            .buffered(self.config.max_concurrency)
            .try_collect()
            .await?;

        Ok(chunks
            .into_iter()
            .zip(embeddings.into_iter().flatten())
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect())
    }

    /// Embed a single query text under the same retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] when the retry budget is exhausted.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch_with_retry(&[text]).await?;
        vectors.pop().ok_or_else(|| {
            RagError::embedding(self.provider.name(), "provider returned no vector for query")
        })
    }

    async fn embed_batch_with_retry(&self, batch: &[&str]) -> Result<Vec<Vec<f32>>> {
        let provider = self.provider.name();
        let timeout = self.config.timeout();
        let mut attempt = 0;

        loop {
            let call = self.provider.embed_batch(batch);
            let outcome = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(RagError::embedding(
                    provider,
                    format!("request timed out after {}ms", self.config.timeout_ms),
                )),
            };

            match outcome {
                Ok(vectors) => return self.check_shape(batch.len(), vectors),
                Err(e) if attempt < self.config.max_retries => {
                    let delay = self.config.backoff_for_attempt(attempt);
                    warn!(
                        provider,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "embedding call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(provider, attempts = attempt + 1, error = %e, "embedding failed");
                    return Err(match e {
                        RagError::Embedding { .. } => e,
                        other => RagError::embedding(provider, other.to_string()),
                    });
                }
            }
        }
    }

    fn check_shape(&self, expected: usize, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>> {
        let provider = self.provider.name();
        if vectors.len() != expected {
            return Err(RagError::embedding(
                provider,
                format!("expected {expected} vectors, provider returned {}", vectors.len()),
            ));
        }
        let dimensions = self.provider.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(RagError::embedding(
                provider,
                format!("expected {dimensions} dimensions, provider returned {}", bad.len()),
            ));
        }
        Ok(vectors)
    }
}
