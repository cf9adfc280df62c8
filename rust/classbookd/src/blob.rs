//! Object storage for subject attachments.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const BLOB_DIR: &str = "blobs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: String,
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid blob path: {0}")]
    BadPath(String),
}

/// Why an upload was refused before reaching storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PdfRejection {
    #[error("only .pdf files can be attached (got {file_name:?})")]
    NotPdf { file_name: String },

    #[error("file is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

/// Name must end in `.pdf` (any case) and size must not exceed `limit`.
pub fn validate_pdf(file_name: &str, size: u64, limit: u64) -> Result<(), PdfRejection> {
    if !file_name.to_lowercase().ends_with(".pdf") {
        return Err(PdfRejection::NotPdf {
            file_name: file_name.to_string(),
        });
    }
    if size > limit {
        return Err(PdfRejection::TooLarge { size, limit });
    }
    Ok(())
}

pub fn subject_pdf_path(subject_id: &str) -> String {
    format!("subjects/{}/syllabus.pdf", subject_id)
}

pub trait BlobStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<StoredBlob, BlobError>;

    /// Returns false when nothing was stored at `path`.
    fn delete(&self, path: &str) -> Result<bool, BlobError>;

    fn ping(&self) -> Result<(), BlobError>;
}

/// Blobs kept as plain files under `<root>/blobs/`.
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(workspace: &Path, public_base_url: &str) -> Self {
        Self {
            root: workspace.join(BLOB_DIR),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let rel = Path::new(path);
        let clean = !path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(BlobError::BadPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn url_for(&self, path: &str, file: &Path) -> String {
        if self.public_base_url.is_empty() {
            format!("file://{}", file.to_string_lossy())
        } else {
            format!("{}/{}", self.public_base_url, path)
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> BlobError {
    BlobError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<StoredBlob, BlobError> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        // Write then rename so a failed upload never leaves a truncated blob behind.
        let tmp = file.with_extension("uploading");
        std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &file).map_err(|e| io_err(&file, e))?;
        Ok(StoredBlob {
            path: path.to_string(),
            url: self.url_for(path, &file),
            size: bytes.len() as u64,
        })
    }

    fn delete(&self, path: &str) -> Result<bool, BlobError> {
        let file = self.resolve(path)?;
        match std::fs::remove_file(&file) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&file, e)),
        }
    }

    fn ping(&self) -> Result<(), BlobError> {
        std::fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;
        std::fs::read_dir(&self.root).map_err(|e| io_err(&self.root, e))?;
        Ok(())
    }
}
