//! Configuration for the pipeline and its provider clients.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::index::SimilarityMetric;

/// Configuration parameters for the question-answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Load one document per PDF page instead of one joined document.
    pub split_pages: bool,
    /// Upper bound on the assembled prompt, in characters.
    pub max_prompt_chars: usize,
    /// Similarity used by the vector index.
    pub metric: SimilarityMetric,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 0,
            top_k: 4,
            split_pages: false,
            max_prompt_chars: 12_000,
            metric: SimilarityMetric::Cosine,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Load one document per page.
    pub fn split_pages(mut self, split: bool) -> Self {
        self.config.split_pages = split;
        self
    }

    /// Set the prompt budget in characters.
    pub fn max_prompt_chars(mut self, max: usize) -> Self {
        self.config.max_prompt_chars = max;
        self
    }

    /// Set the similarity metric.
    pub fn metric(mut self, metric: SimilarityMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `max_prompt_chars == 0`
    pub fn build(self) -> Result<RagConfig> {
        if self.config.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.config.max_prompt_chars == 0 {
            return Err(RagError::Config("max_prompt_chars must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}

/// Explicit settings handed to each provider and provider client at construction.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Credential for the external API.
    pub api_key: String,
    /// Retries after the first attempt. Completion calls ignore this.
    pub max_retries: u32,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum in-flight embedding batches per pipeline run.
    pub max_concurrency: usize,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Ceiling for a single backoff delay.
    pub max_backoff_ms: u64,
    /// Number of texts sent per embedding call.
    pub batch_size: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_retries: 3,
            timeout_ms: 30_000,
            max_concurrency: 1,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 10_000,
            batch_size: 64,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("max_retries", &self.max_retries)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_concurrency", &self.max_concurrency)
            .field("initial_backoff_ms", &self.initial_backoff_ms)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a config with the given API key and default limits.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), ..Self::default() }
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn with_backoff(mut self, initial_ms: u64, multiplier: f64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.backoff_multiplier = multiplier;
        self.max_backoff_ms = max_ms;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// The per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retry number `attempt` (0-indexed), capped at `max_backoff_ms`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Validate limits that would otherwise stall a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] when `max_concurrency`, `batch_size` or
    /// `timeout_ms` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(RagError::Config("max_concurrency must be greater than zero".into()));
        }
        if self.batch_size == 0 {
            return Err(RagError::Config("batch_size must be greater than zero".into()));
        }
        if self.timeout_ms == 0 {
            return Err(RagError::Config("timeout_ms must be greater than zero".into()));
        }
        Ok(())
    }
}
