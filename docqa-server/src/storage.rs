//! Local directory storage for uploaded files.

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// What to do when an upload reuses a stored file name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UploadPolicy {
    /// Replace the stored file.
    #[default]
    Overwrite,
    /// Refuse the upload.
    Reject,
    /// Store under `stem-1.ext`, `stem-2.ext`, …
    Version,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("{0}")]
    InvalidName(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A file written by [`FileStorage::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// The name the file is stored under.
    pub name: String,
    pub size: usize,
}

/// Stores uploads in one directory keyed by file name.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    policy: UploadPolicy,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>, policy: UploadPolicy) -> Self {
        Self { root: root.into(), policy }
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Store `bytes` under `name` according to the upload policy.
    ///
    /// The bytes are staged in a temporary file in the storage directory and
    /// renamed into place, so readers see either the old file or the new one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] for names that are not plain file
    /// names, [`StorageError::AlreadyExists`] under [`UploadPolicy::Reject`],
    /// and [`StorageError::Io`] when the write fails.
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        docqa_rag::loader::validate_file_name(name)
            .map_err(|_| StorageError::InvalidName(format!("invalid file name: {name}")))?;
        let name = name.trim().to_string();
        let size = bytes.len();

        let root = self.root.clone();
        let policy = self.policy;
        let bytes = bytes.to_vec();
        let stored = tokio::task::spawn_blocking(move || store(&root, policy, &name, &bytes))
            .await
            .map_err(|e| io::Error::other(format!("storage task failed: {e}")))??;

        info!(name = %stored, size, policy = ?self.policy, "stored upload");
        Ok(StoredFile { name: stored, size })
    }
}

fn store(
    root: &Path,
    policy: UploadPolicy,
    name: &str,
    bytes: &[u8],
) -> Result<String, StorageError> {
    let mut staged =
        tempfile::Builder::new().prefix(".upload-").suffix(".part").tempfile_in(root)?;
    staged.write_all(bytes)?;
    staged.flush()?;

    if policy == UploadPolicy::Overwrite {
        staged.persist(root.join(name)).map_err(|e| e.error)?;
        return Ok(name.to_string());
    }

    let (stem, extension) = split_extension(name);
    let mut candidate = name.to_string();
    let mut version = 0u32;
    loop {
        match staged.persist_noclobber(root.join(&candidate)) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() != io::ErrorKind::AlreadyExists => {
                return Err(e.error.into());
            }
            Err(_) if policy == UploadPolicy::Reject => {
                return Err(StorageError::AlreadyExists(name.to_string()));
            }
            Err(e) => {
                debug!(candidate, "versioned name taken");
                staged = e.file;
                version += 1;
                candidate = format!("{stem}-{version}{extension}");
            }
        }
    }
}

/// Split `resume.pdf` into `("resume", ".pdf")`.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    }
}
