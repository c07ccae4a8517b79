//! Document loaders.
//!
//! [`PdfLoader`] reads uploaded PDFs from the storage directory with `lopdf`;
//! [`MemoryLoader`] serves page texts held in memory.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Separator placed between page texts when pages are joined into one document.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Loads the documents for one stored file.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load `file_name`, returning a non-empty, ordered list of documents.
    async fn load(&self, file_name: &str) -> Result<Vec<Document>>;
}

/// Reject anything that is not a plain file name inside the storage directory.
///
/// # Errors
///
/// Returns [`RagError::Validation`] for empty names, path separators, or `.`/`..`.
pub fn validate_file_name(file_name: &str) -> Result<()> {
    let trimmed = file_name.trim();
    if trimmed.is_empty() {
        return Err(RagError::Validation("file name must not be empty".into()));
    }
    if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
        return Err(RagError::Validation(format!("invalid file name: {file_name}")));
    }
    Ok(())
}

/// Turn extracted page texts into documents.
fn pages_to_documents(source: &str, pages: Vec<String>, split_pages: bool) -> Vec<Document> {
    if split_pages {
        return pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| Document::page(source, i + 1, text))
            .collect();
    }

    let mut text = String::new();
    let mut page_offsets = Vec::with_capacity(pages.len());
    let mut offset = 0;
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            text.push_str(PAGE_SEPARATOR);
            offset += PAGE_SEPARATOR.chars().count();
        }
        page_offsets.push(offset);
        text.push_str(page);
        offset += page.chars().count();
    }
    vec![Document { source: source.to_string(), text, page: None, page_offsets }]
}

/// Loads PDFs from a directory.
#[derive(Debug, Clone)]
pub struct PdfLoader {
    root: PathBuf,
    split_pages: bool,
}

impl PdfLoader {
    pub fn new(root: impl Into<PathBuf>, split_pages: bool) -> Self {
        Self { root: root.into(), split_pages }
    }

    /// Parse PDF bytes that were already read.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFormat`] if the bytes are not a PDF,
    /// the PDF has no pages, or a page's text cannot be extracted.
    pub fn parse(&self, source: &str, bytes: &[u8]) -> Result<Vec<Document>> {
        parse_pdf(source, bytes, self.split_pages)
    }
}

fn parse_pdf(source: &str, bytes: &[u8], split_pages: bool) -> Result<Vec<Document>> {
    let unsupported =
        |message: String| RagError::UnsupportedFormat { source_name: source.to_string(), message };

    let pdf = lopdf::Document::load_mem(bytes)
        .map_err(|e| unsupported(format!("not a readable PDF: {e}")))?;
    let page_numbers: Vec<u32> = pdf.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(unsupported("PDF has no pages".into()));
    }

    let pages = page_numbers
        .iter()
        .map(|&number| {
            pdf.extract_text(&[number]).map(|text| text.trim_end().to_string()).map_err(|e| {
                unsupported(format!("cannot extract text from page {number}: {e}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(source, page_count = pages.len(), split_pages, "parsed pdf");
    Ok(pages_to_documents(source, pages, split_pages))
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    /// Reads the file, then parses it on the blocking pool. A dropped caller
    /// stops waiting, but a parse already started runs to completion.
    async fn load(&self, file_name: &str) -> Result<Vec<Document>> {
        validate_file_name(file_name)?;
        let path = self.root.join(file_name.trim());
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => RagError::NotFound(file_name.to_string()),
            _ => RagError::Io(e),
        })?;
        debug!(file_name, bytes = bytes.len(), "read stored file");

        let source = file_name.to_string();
        let split_pages = self.split_pages;
        tokio::task::spawn_blocking(move || parse_pdf(&source, &bytes, split_pages))
            .await
            .map_err(|e| RagError::Io(io::Error::other(format!("pdf parse task failed: {e}"))))?
    }
}

/// Serves documents from page texts held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<String>>,
    split_pages: bool,
}

impl MemoryLoader {
    pub fn new(split_pages: bool) -> Self {
        Self { files: HashMap::new(), split_pages }
    }

    /// Register `pages` under `file_name`, replacing any earlier entry.
    pub fn with_file<I, S>(mut self, file_name: impl Into<String>, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.insert(file_name.into(), pages.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl DocumentLoader for MemoryLoader {
    async fn load(&self, file_name: &str) -> Result<Vec<Document>> {
        validate_file_name(file_name)?;
        let pages = self
            .files
            .get(file_name)
            .ok_or_else(|| RagError::NotFound(file_name.to_string()))?;
        if pages.is_empty() {
            return Err(RagError::UnsupportedFormat {
                source_name: file_name.to_string(),
                message: "document has no pages".into(),
            });
        }
        Ok(pages_to_documents(file_name, pages.clone(), self.split_pages))
    }
}
