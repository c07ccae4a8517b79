//! End-to-end pipeline runs with deterministic providers.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docqa_rag::mock::{BagOfWordsEmbedder, ExtractiveCompleter};
use docqa_rag::{
    Chunker, CompletionClient, CompletionProvider, DocumentLoader, EmbeddingClient,
    EmbeddingProvider, ErrorKind, MemoryLoader, PdfLoader, Prompt, PromptAssembler,
    ProviderConfig, Query, RagConfig, RagError, RagPipeline, RecursiveChunker, Result, Stage,
};

fn provider_config() -> ProviderConfig {
    ProviderConfig::new("test").with_backoff(100, 2.0, 1_000)
}

fn embedder(provider: Arc<dyn EmbeddingProvider>, max_retries: u32) -> EmbeddingClient {
    EmbeddingClient::new(provider, provider_config().with_max_retries(max_retries)).unwrap()
}

fn completer(provider: Arc<dyn CompletionProvider>) -> CompletionClient {
    CompletionClient::new(provider, provider_config()).unwrap()
}

fn resume_config() -> RagConfig {
    RagConfig::builder().chunk_size(1000).chunk_overlap(100).split_pages(true).build().unwrap()
}

fn memory_pipeline(loader: MemoryLoader) -> RagPipeline {
    RagPipeline::builder()
        .config(resume_config())
        .loader(Arc::new(loader))
        .embedding_client(embedder(Arc::new(BagOfWordsEmbedder::default()), 3))
        .completion_client(completer(Arc::new(ExtractiveCompleter::default())))
        .build()
        .unwrap()
}

/// Fails the first `failures` embedding calls, then delegates to the bag-of-words embedder.
struct FlakyEmbedder {
    failures: usize,
    calls: AtomicUsize,
    inner: BagOfWordsEmbedder,
}

impl FlakyEmbedder {
    fn new(failures: usize) -> Self {
        Self { failures, calls: AtomicUsize::new(0), inner: BagOfWordsEmbedder::default() }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(RagError::Embedding {
                provider: "flaky".into(),
                message: format!("503 on call {call}"),
            });
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

#[tokio::test]
async fn resume_question_is_answered_from_the_education_page() {
    let dir = tempfile::tempdir().unwrap();
    let pages = common::resume_pages();
    let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    std::fs::write(dir.path().join("resume.pdf"), common::pdf_bytes(&page_refs)).unwrap();

    let loader = Arc::new(PdfLoader::new(dir.path(), true));
    let documents = loader.load("resume.pdf").await.unwrap();
    assert_eq!(documents.len(), 3);
    let chunks = RecursiveChunker::new(1000, 100).chunk(&documents);
    assert!(chunks.len() >= 6, "got {} chunks", chunks.len());

    let pipeline = RagPipeline::builder()
        .config(resume_config())
        .loader(loader)
        .embedding_client(embedder(Arc::new(BagOfWordsEmbedder::default()), 3))
        .completion_client(completer(Arc::new(ExtractiveCompleter::default())))
        .build()
        .unwrap();

    let answer = pipeline
        .answer(&Query::new("What university did the candidate attend?", "resume.pdf"))
        .await
        .unwrap();

    let top = &answer.sources[0].chunk;
    assert_eq!(top.page, Some(2));
    assert!(top.text.contains("Stanford University"));
    assert!(answer.text.contains("Stanford"), "answer was {:?}", answer.text);
    assert!(answer.context_truncated.is_none());
}

#[tokio::test]
async fn identical_queries_produce_identical_answers() {
    let loader = MemoryLoader::new(true).with_file("resume.pdf", common::resume_pages());
    let pipeline = memory_pipeline(loader);
    let query = Query::new("What university did the candidate attend?", "resume.pdf");

    let first = pipeline.answer(&query).await.unwrap();
    let second = pipeline.answer(&query).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pipeline_runs_on_a_spawned_task() {
    let loader = MemoryLoader::new(true).with_file("resume.pdf", common::resume_pages());
    let pipeline = Arc::new(memory_pipeline(loader));
    let query = Query::new("What university did the candidate attend?", "resume.pdf");

    let task = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        let query = query.clone();
        async move { pipeline.answer(&query).await }
    });
    let spawned = task.await.unwrap().unwrap();
    assert_eq!(spawned, pipeline.answer(&query).await.unwrap());
}

#[tokio::test]
async fn never_uploaded_file_fails_at_loading() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = RagPipeline::builder()
        .loader(Arc::new(PdfLoader::new(dir.path(), false)))
        .embedding_client(embedder(Arc::new(BagOfWordsEmbedder::default()), 0))
        .completion_client(completer(Arc::new(ExtractiveCompleter::default())))
        .build()
        .unwrap();

    let run = pipeline.answer_traced(&Query::new("Anything?", "never-uploaded.pdf")).await;
    let err = run.result.unwrap_err();
    assert_eq!(err.stage, Stage::Loading);
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(run.stages, vec![Stage::Idle, Stage::Loading, Stage::Failed]);
}

#[tokio::test]
async fn corrupt_pdf_is_an_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.pdf"), b"%PDF-1.5 truncated garbage").unwrap();
    let pipeline = RagPipeline::builder()
        .loader(Arc::new(PdfLoader::new(dir.path(), false)))
        .embedding_client(embedder(Arc::new(BagOfWordsEmbedder::default()), 0))
        .completion_client(completer(Arc::new(ExtractiveCompleter::default())))
        .build()
        .unwrap();

    let err = pipeline.answer(&Query::new("Anything?", "broken.pdf")).await.unwrap_err();
    assert_eq!(err.stage, Stage::Loading);
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
}

#[tokio::test(start_paused = true)]
async fn embedding_failures_within_the_retry_budget_are_absorbed() {
    let flaky = Arc::new(FlakyEmbedder::new(3));
    let pipeline = RagPipeline::builder()
        .config(resume_config())
        .loader(Arc::new(MemoryLoader::new(true).with_file("resume.pdf", common::resume_pages())))
        .embedding_client(embedder(flaky.clone(), 3))
        .completion_client(completer(Arc::new(ExtractiveCompleter::default())))
        .build()
        .unwrap();

    let query = Query::new("What university did the candidate attend?", "resume.pdf");
    let answer = pipeline.answer(&query).await;
    assert!(answer.is_ok());
    // Three failures, the successful chunk batch, then the query embedding.
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn embedding_failures_beyond_the_retry_budget_fail_the_embedding_stage() {
    let flaky = Arc::new(FlakyEmbedder::new(4));
    let pipeline = RagPipeline::builder()
        .config(resume_config())
        .loader(Arc::new(MemoryLoader::new(true).with_file("resume.pdf", common::resume_pages())))
        .embedding_client(embedder(flaky.clone(), 3))
        .completion_client(completer(Arc::new(ExtractiveCompleter::default())))
        .build()
        .unwrap();

    let err = pipeline
        .answer(&Query::new("What university did the candidate attend?", "resume.pdf"))
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::Embedding);
    assert_eq!(err.kind(), ErrorKind::Embedding);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn oversized_context_is_truncated_not_rejected() {
    let pipeline = RagPipeline::builder()
        .config(resume_config())
        .loader(Arc::new(MemoryLoader::new(true).with_file("resume.pdf", common::resume_pages())))
        .embedding_client(embedder(Arc::new(BagOfWordsEmbedder::default()), 0))
        .completion_client(completer(Arc::new(ExtractiveCompleter::default())))
        .prompt_assembler(PromptAssembler::new(1_500))
        .build()
        .unwrap();

    let answer = pipeline
        .answer(&Query::new("What university did the candidate attend?", "resume.pdf"))
        .await
        .unwrap();
    let truncated = answer.context_truncated.expect("context should be truncated");
    assert_eq!(truncated.kept, 1);
    assert_eq!(truncated.dropped, 3);
    assert_eq!(answer.sources.len(), 1);
    assert!(answer.text.contains("Stanford"));
}

#[tokio::test]
async fn completion_failure_reports_the_completing_stage() {
    struct Unavailable;

    #[async_trait]
    impl CompletionProvider for Unavailable {
        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            Err(RagError::Completion { provider: "down".into(), message: "503".into() })
        }
    }

    let pipeline = RagPipeline::builder()
        .loader(Arc::new(MemoryLoader::new(false).with_file("a.pdf", ["Some text."])))
        .embedding_client(embedder(Arc::new(BagOfWordsEmbedder::default()), 0))
        .completion_client(completer(Arc::new(Unavailable)))
        .build()
        .unwrap();

    let run = pipeline.answer_traced(&Query::new("What text?", "a.pdf")).await;
    let err = run.result.unwrap_err();
    assert_eq!(err.stage, Stage::Completing);
    assert_eq!(err.kind(), ErrorKind::Completion);
    assert_eq!(run.stages.len(), 9);
    assert_eq!(run.stages[7], Stage::Completing);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_request_cancels_in_flight_embedding() {
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    struct Stalled {
        dropped: Arc<AtomicBool>,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl EmbeddingProvider for Stalled {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let _guard = DropFlag(self.dropped.clone());
            tokio::time::sleep(Duration::from_secs(3600)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(vec![1.0])
        }

        fn dimensions(&self) -> usize {
            1
        }
    }

    let dropped = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let stalled = Stalled { dropped: dropped.clone(), finished: finished.clone() };
    let pipeline = RagPipeline::builder()
        .loader(Arc::new(MemoryLoader::new(false).with_file("a.pdf", ["Some text."])))
        .embedding_client(
            EmbeddingClient::new(Arc::new(stalled), provider_config().with_timeout_ms(7_200_000))
                .unwrap(),
        )
        .completion_client(completer(Arc::new(ExtractiveCompleter::default())))
        .build()
        .unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_millis(100),
        pipeline.answer(&Query::new("What text?", "a.pdf")),
    )
    .await;

    assert!(outcome.is_err(), "request should have been cut off");
    assert!(dropped.load(Ordering::SeqCst));
    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert!(!finished.load(Ordering::SeqCst));
}
