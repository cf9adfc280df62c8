//! Document store seam.
//!
//! Records are schemaless JSON objects grouped into named collections. The
//! record layer only needs exact-match lookups, merge-style writes and
//! bounded write batches, so that is all the trait exposes.

mod sqlite;

pub use sqlite::{SqliteStore, DB_FILE, DEFAULT_MAX_BATCH_OPS};

use serde_json::{Map, Value};
use thiserror::Error;

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
    pub created_at: String,
    pub updated_at: String,
}

/// Exact-match condition on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: &'static str,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Merge {
        collection: String,
        id: String,
        fields: Fields,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Ordered group of writes applied together by [`DocumentStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, collection: &str, id: &str, fields: Fields) {
        self.ops.push(WriteOp::Merge {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
    }

    pub fn delete(&mut self, collection: &str, id: &str) {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("document {collection}/{id} does not exist")]
    Missing { collection: String, id: String },

    #[error("batch of {ops} operations exceeds the store limit of {limit}")]
    BatchTooLarge { ops: usize, limit: usize },

    #[error("failed to prepare store directory: {0}")]
    Io(#[from] std::io::Error),
}

pub trait DocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents in `collection` matching every filter, in insertion order.
    fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>, StoreError>;

    /// Creates a document with a generated id and returns the id.
    fn insert(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Overwrites the given top-level fields of an existing document.
    fn merge(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Returns false when the document was already gone.
    fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Applies every operation or none. Batches larger than
    /// [`DocumentStore::max_batch_ops`] are refused.
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    fn max_batch_ops(&self) -> usize;

    fn ping(&self) -> Result<(), StoreError>;
}

pub(crate) fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
