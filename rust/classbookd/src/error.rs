use crate::blob::{BlobError, PdfRejection};
use crate::csv_import::CsvImportError;
use crate::store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    /// Missing or malformed input. Nothing was written.
    #[error("{0}")]
    Invalid(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A composite key that must be unique is already taken.
    #[error("{0}")]
    Conflict(String),

    /// Refused because other records still reference the target.
    #[error("{kind} is still referenced by {count} {referrers}")]
    InUse {
        kind: &'static str,
        count: usize,
        referrers: &'static str,
    },

    #[error(transparent)]
    File(#[from] PdfRejection),

    #[error(transparent)]
    Csv(#[from] CsvImportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("export failed: {0:#}")]
    Export(anyhow::Error),
}

impl RecordError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable code reported to IPC clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "bad_params",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InUse { .. } => "in_use",
            Self::File(_) => "invalid_file",
            Self::Csv(_) => "invalid_csv",
            Self::Store(_) => "store_failed",
            Self::Blob(_) => "blob_failed",
            Self::Export(_) => "export_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InUse {
                count, referrers, ..
            } => Some(json!({ "count": count, "referrers": referrers })),
            Self::File(PdfRejection::TooLarge { size, limit }) => {
                Some(json!({ "size": size, "limit": limit }))
            }
            Self::Csv(CsvImportError::Header { found }) => Some(json!({ "found": found })),
            _ => None,
        }
    }
}
