//! # docqa-rag
//!
//! Answer questions about an uploaded PDF with retrieval-augmented generation.
//!
//! ## Overview
//!
//! A [`RagPipeline`] runs one question through these components:
//!
//! - [`DocumentLoader`] - reads the stored file ([`PdfLoader`], [`MemoryLoader`])
//! - [`Chunker`] - splits documents into bounded chunks ([`RecursiveChunker`])
//! - [`EmbeddingClient`] - embeds chunks through an [`EmbeddingProvider`] with
//!   retries, timeouts and bounded concurrency
//! - [`VectorIndex`] - request-scoped similarity search
//! - [`PromptAssembler`] - builds the prompt within a character budget
//! - [`CompletionClient`] - asks a [`CompletionProvider`] for the answer
//!
//! ## Features
//!
//! - `openai` - [`openai::OpenAIEmbeddingProvider`] and [`openai::OpenAIChatProvider`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{
//!     CompletionClient, EmbeddingClient, PdfLoader, ProviderConfig, Query, RagConfig, RagPipeline,
//!     mock::{BagOfWordsEmbedder, ExtractiveCompleter},
//! };
//!
//! let provider = ProviderConfig::new("unused");
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::builder().chunk_size(1000).chunk_overlap(100).build()?)
//!     .loader(Arc::new(PdfLoader::new("pdfs", false)))
//!     .embedding_client(EmbeddingClient::new(
//!         Arc::new(BagOfWordsEmbedder::default()),
//!         provider.clone(),
//!     )?)
//!     .completion_client(CompletionClient::new(
//!         Arc::new(ExtractiveCompleter::default()),
//!         provider,
//!     )?)
//!     .build()?;
//!
//! let answer = pipeline.answer(&Query::new("What university?", "resume.pdf")).await?;
//! println!("{}", answer.text);
//! ```

pub mod chunking;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
pub mod mock;
pub mod pipeline;
pub mod prompt;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, RecursiveChunker};
pub use completion::{CompletionClient, CompletionProvider};
pub use config::{ProviderConfig, RagConfig, RagConfigBuilder};
pub use document::{Answer, Chunk, ContextTruncated, Document, IndexEntry, Query, SearchResult};
pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use error::{ErrorKind, PipelineError, RagError, Result};
pub use index::{SimilarityMetric, VectorIndex};
pub use loader::{DocumentLoader, MemoryLoader, PdfLoader};
pub use pipeline::{PipelineRun, RagPipeline, RagPipelineBuilder, Stage};
pub use prompt::{AssembledPrompt, Prompt, PromptAssembler};
