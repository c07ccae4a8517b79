//! Command-line and environment configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use docqa_rag::{ProviderConfig, RagConfig};

use crate::storage::UploadPolicy;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Serve PDF upload and question answering over HTTP.
#[derive(Clone, Parser)]
#[command(name = "docqa", version, about)]
pub struct Args {
    /// Interface to bind.
    #[arg(long, env = "DOCQA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "DOCQA_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory uploaded PDFs are stored in.
    #[arg(long, env = "DOCQA_UPLOAD_DIR", default_value = "pdfs")]
    pub upload_dir: PathBuf,

    /// OpenAI API key.
    #[arg(long, env = "OPEN_AI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Maximum chunk size in characters.
    #[arg(long, env = "DOCQA_CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, env = "DOCQA_CHUNK_OVERLAP", default_value_t = 100)]
    pub chunk_overlap: usize,

    /// Chunks retrieved per question.
    #[arg(long, env = "DOCQA_TOP_K", default_value_t = 4)]
    pub top_k: usize,

    /// Treat every PDF page as its own document.
    #[arg(long, env = "DOCQA_SPLIT_PAGES")]
    pub split_pages: bool,

    /// Upper bound on the prompt sent to the model, in characters.
    #[arg(long, env = "DOCQA_MAX_PROMPT_CHARS", default_value_t = 12_000)]
    pub max_prompt_chars: usize,

    /// Embedding retries after the first attempt.
    #[arg(long, env = "DOCQA_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Per-call provider timeout in milliseconds.
    #[arg(long, env = "DOCQA_TIMEOUT_MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Embedding batches in flight per request.
    #[arg(long, env = "DOCQA_MAX_CONCURRENCY", default_value_t = 1)]
    pub max_concurrency: usize,

    /// How to handle uploads that reuse a stored file name.
    #[arg(
        long,
        env = "DOCQA_UPLOAD_POLICY",
        value_enum,
        default_value_t = UploadPolicy::Overwrite
    )]
    pub upload_policy: UploadPolicy,

    /// Largest accepted upload request, in bytes.
    #[arg(long, env = "DOCQA_MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Log output format.
    #[arg(long, env = "DOCQA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("upload_dir", &self.upload_dir)
            .field("api_key", &"<redacted>")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("top_k", &self.top_k)
            .field("split_pages", &self.split_pages)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("max_retries", &self.max_retries)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_concurrency", &self.max_concurrency)
            .field("upload_policy", &self.upload_policy)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Args {
    /// Pipeline settings, validated.
    ///
    /// # Errors
    ///
    /// Returns [`docqa_rag::RagError::Config`] for inconsistent chunking or retrieval values.
    pub fn rag_config(&self) -> docqa_rag::Result<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .split_pages(self.split_pages)
            .max_prompt_chars(self.max_prompt_chars)
            .build()
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(self.api_key.clone())
            .with_max_retries(self.max_retries)
            .with_timeout_ms(self.timeout_ms)
            .with_max_concurrency(self.max_concurrency)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig { host: self.host.clone(), port: self.port }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}
