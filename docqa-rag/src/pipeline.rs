//! Question-answering pipeline orchestrator.
//!
//! A [`RagPipeline`] answers one [`Query`] by walking an explicit state
//! machine:
//!
//! ```text
//! Idle → Loading → Splitting → Embedding → Indexing
//!      → Retrieving → Assembling → Completing → Done
//!
//! any stage ──error──→ Failed
//! ```
//!
//! Every run rebuilds its documents, chunks and index from scratch. Provider
//! calls are awaited in place, so dropping the future returned by
//! [`RagPipeline::answer`] cancels every provider call in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{PdfLoader, Query, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .loader(Arc::new(PdfLoader::new("pdfs", false)))
//!     .embedding_client(embedder)
//!     .completion_client(completer)
//!     .build()?;
//!
//! let answer = pipeline.answer(&Query::new("What university?", "resume.pdf")).await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::completion::CompletionClient;
use crate::config::RagConfig;
use crate::document::{Answer, Chunk, Document, IndexEntry, Query, SearchResult};
use crate::embedding::EmbeddingClient;
use crate::error::{PipelineError, RagError, Result};
use crate::index::VectorIndex;
use crate::loader::DocumentLoader;
use crate::prompt::{AssembledPrompt, Prompt, PromptAssembler};

/// A state of the per-request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Idle,
    Loading,
    Splitting,
    Embedding,
    Indexing,
    Retrieving,
    Assembling,
    Completing,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Splitting => "splitting",
            Self::Embedding => "embedding",
            Self::Indexing => "indexing",
            Self::Retrieving => "retrieving",
            Self::Assembling => "assembling",
            Self::Completing => "completing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one traced run: the stages entered, in order, and the result.
///
/// The last stage is [`Stage::Done`] on success and [`Stage::Failed`] otherwise.
#[derive(Debug)]
pub struct PipelineRun {
    pub stages: Vec<Stage>,
    pub result: std::result::Result<Answer, PipelineError>,
}

struct Trace {
    stages: Vec<Stage>,
}

impl Trace {
    fn enter(&mut self, stage: Stage) -> Stage {
        debug!(stage = %stage, "pipeline transition");
        self.stages.push(stage);
        stage
    }
}

/// The question-answering pipeline. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedder: EmbeddingClient,
    completer: CompletionClient,
    assembler: PromptAssembler,
}

impl fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("embedder", &self.embedder)
            .field("completer", &self.completer)
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Answer `query` against its target document.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] naming the stage that failed and carrying
    /// the component error.
    pub async fn answer(&self, query: &Query) -> std::result::Result<Answer, PipelineError> {
        self.answer_traced(query).await.result
    }

    /// Like [`answer`](Self::answer), also reporting every stage entered.
    pub async fn answer_traced(&self, query: &Query) -> PipelineRun {
        let started = Instant::now();
        let mut trace = Trace { stages: Vec::with_capacity(10) };
        let result = self.run(query, &mut trace).await;

        match &result {
            Ok(answer) => {
                trace.enter(Stage::Done);
                info!(
                    file_name = %query.file_name,
                    sources = answer.sources.len(),
                    truncated = answer.context_truncated.is_some(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "answered question"
                );
            }
            Err(e) => {
                trace.enter(Stage::Failed);
                error!(
                    file_name = %query.file_name,
                    stage = %e.stage,
                    kind = %e.kind(),
                    error = %e.source,
                    "pipeline failed"
                );
            }
        }

        PipelineRun { stages: trace.stages, result }
    }

    async fn run(
        &self,
        query: &Query,
        trace: &mut Trace,
    ) -> std::result::Result<Answer, PipelineError> {
        let fail = |stage: Stage| move |e: RagError| PipelineError::new(stage, e);

        let stage = trace.enter(Stage::Idle);
        validate_query(query).map_err(fail(stage))?;

        let stage = trace.enter(Stage::Loading);
        let documents = self.load(&query.file_name).await.map_err(fail(stage))?;

        trace.enter(Stage::Splitting);
        let chunks = self.split(&documents);

        let stage = trace.enter(Stage::Embedding);
        let entries = self.embed(chunks).await.map_err(fail(stage))?;

        trace.enter(Stage::Indexing);
        let index = self.index(entries);

        let stage = trace.enter(Stage::Retrieving);
        let results = self.retrieve(&index, &query.input).await.map_err(fail(stage))?;

        let stage = trace.enter(Stage::Assembling);
        let assembled = self.assemble(&results, &query.input).map_err(fail(stage))?;

        let stage = trace.enter(Stage::Completing);
        let text = self.complete(&assembled.prompt).await.map_err(fail(stage))?;

        Ok(Answer { text, sources: assembled.included, context_truncated: assembled.truncated })
    }

    async fn load(&self, file_name: &str) -> Result<Vec<Document>> {
        let documents = self.loader.load(file_name.trim()).await?;
        debug!(file_name, document_count = documents.len(), "documents loaded");
        Ok(documents)
    }

    fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks = self.chunker.chunk(documents);
        debug!(chunk_count = chunks.len(), "documents split");
        chunks
    }

    async fn embed(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexEntry>> {
        self.embedder.embed_chunks(chunks).await
    }

    fn index(&self, entries: Vec<IndexEntry>) -> VectorIndex {
        VectorIndex::from_entries(entries, self.config.metric)
    }

    async fn retrieve(&self, index: &VectorIndex, question: &str) -> Result<Vec<SearchResult>> {
        index.query(&self.embedder, question, self.config.top_k).await
    }

    fn assemble(&self, results: &[SearchResult], question: &str) -> Result<AssembledPrompt> {
        self.assembler.assemble(results, question)
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.completer.complete(prompt).await
    }
}

fn validate_query(query: &Query) -> Result<()> {
    if query.input.trim().is_empty() {
        return Err(RagError::Validation("input must not be empty".into()));
    }
    if query.file_name.trim().is_empty() {
        return Err(RagError::Validation("fileName must not be empty".into()));
    }
    Ok(())
}

/// Builder for constructing a [`RagPipeline`].
///
/// The loader, embedding client and completion client are required. The
/// chunker defaults to a [`RecursiveChunker`] and the assembler to a
/// [`PromptAssembler`], both sized from the config.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    loader: Option<Arc<dyn DocumentLoader>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedder: Option<EmbeddingClient>,
    completer: Option<CompletionClient>,
    assembler: Option<PromptAssembler>,
}

impl RagPipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn embedding_client(mut self, client: EmbeddingClient) -> Self {
        self.embedder = Some(client);
        self
    }

    pub fn completion_client(mut self, client: CompletionClient) -> Self {
        self.completer = Some(client);
        self
    }

    pub fn prompt_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = Some(assembler);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required collaborator is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let loader =
            self.loader.ok_or_else(|| RagError::Config("document loader is required".into()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::Config("embedding client is required".into()))?;
        let completer = self
            .completer
            .ok_or_else(|| RagError::Config("completion client is required".into()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });
        let assembler =
            self.assembler.unwrap_or_else(|| PromptAssembler::new(config.max_prompt_chars));

        Ok(RagPipeline { config, loader, chunker, embedder, completer, assembler })
    }
}
