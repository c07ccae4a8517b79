//! Error types for the `docqa-rag` crate.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::Stage;

/// Errors that can occur in document question-answering operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller supplied invalid or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested document does not exist in storage.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The document bytes could not be parsed as the declared format.
    #[error("Unsupported format ({source_name}): {message}")]
    UnsupportedFormat {
        /// The file the loader was reading.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while generating a completion.
    #[error("Completion error ({provider}): {message}")]
    Completion {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error outside of the not-found case.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Return the stable kind name of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::Embedding { .. } => ErrorKind::Embedding,
            Self::Completion { .. } => ErrorKind::Completion,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::Embedding { provider: provider.to_string(), message: message.into() }
    }

    pub(crate) fn completion(provider: &str, message: impl Into<String>) -> Self {
        Self::Completion { provider: provider.to_string(), message: message.into() }
    }
}

/// The taxonomy of failures reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Missing input, wrong MIME type, oversized question.
    #[serde(rename = "ValidationError")]
    Validation,
    /// File missing from storage.
    #[serde(rename = "NotFoundError")]
    NotFound,
    /// File present but not parseable.
    #[serde(rename = "UnsupportedFormatError")]
    UnsupportedFormat,
    /// Embedding provider failure after the retry budget.
    #[serde(rename = "EmbeddingError")]
    Embedding,
    /// Completion provider failure.
    #[serde(rename = "CompletionError")]
    Completion,
    /// Invalid configuration.
    #[serde(rename = "ConfigError")]
    Config,
    /// Storage I/O failure.
    #[serde(rename = "IoError")]
    Io,
}

impl ErrorKind {
    /// The stable name of this kind, e.g. `"NotFoundError"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::UnsupportedFormat => "UnsupportedFormatError",
            Self::Embedding => "EmbeddingError",
            Self::Completion => "CompletionError",
            Self::Config => "ConfigError",
            Self::Io => "IoError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline failure: the originating component's error plus the stage it failed in.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    /// The stage that was running when the error occurred.
    pub stage: Stage,
    /// The component error.
    #[source]
    pub source: RagError,
}

impl PipelineError {
    /// Create a new pipeline error for the given stage.
    pub fn new(stage: Stage, source: RagError) -> Self {
        Self { stage, source }
    }

    /// The originating component's error kind.
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// A convenience result type for docqa operations.
pub type Result<T> = std::result::Result<T, RagError>;
