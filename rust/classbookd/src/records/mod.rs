//! Record manager: keyed CRUD over subjects, classes, students, lesson logs
//! and attendance, including the composite-key upserts and cascade deletes.
//!
//! Multi-document operations are best effort. Cascades delete children in
//! store-sized batches and remove the parent last, so an interrupted cascade
//! leaves the parent visible and the delete can simply be retried.

mod attendance;
mod classes;
mod export;
mod lessons;
mod students;
mod subjects;

pub use attendance::{AttendanceDay, AttendanceEntry, AttendanceRow, SheetRow};
pub use classes::{CascadeCounts, ClassPatch, ClassSummary};
pub use export::{ExportSummary, SheetSummary, WORKBOOK_FORMAT};
pub use lessons::{LessonDay, LessonLogRow, LessonUpsert};
pub use students::{ImportPolicy, ImportSummary, StudentPatch};
pub use subjects::SubjectPatch;

use crate::blob::BlobStore;
use crate::config::AppConfig;
use crate::error::RecordError;
use crate::model::{to_fields, ClassSection, Entity, Stored, Subject};
use crate::store::{DocumentStore, Filter, WriteBatch};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

pub struct RecordManager<S, B> {
    store: S,
    blobs: B,
    config: AppConfig,
}

/// Display names for a class, resolved from the class and subject records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassLabel {
    pub class_name: Option<String>,
    pub subject_name: Option<String>,
}

/// Result of [`RecordManager::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemCheck {
    pub store_ok: bool,
    pub store_error: Option<String>,
    pub blobs_ok: bool,
    pub blobs_error: Option<String>,
}

impl<S: DocumentStore, B: BlobStore> RecordManager<S, B> {
    pub fn new(store: S, blobs: B, config: AppConfig) -> Self {
        Self {
            store,
            blobs,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn check(&self) -> SystemCheck {
        let store = self.store.ping();
        let blobs = self.blobs.ping();
        SystemCheck {
            store_ok: store.is_ok(),
            store_error: store.err().map(|e| e.to_string()),
            blobs_ok: blobs.is_ok(),
            blobs_error: blobs.err().map(|e| e.to_string()),
        }
    }

    fn batch_limit(&self) -> usize {
        self.config
            .store
            .batch_limit
            .min(self.store.max_batch_ops())
            .max(1)
    }

    fn find<T: Entity>(&self, id: &str) -> Result<Option<Stored<T>>, RecordError> {
        match self.store.get(T::COLLECTION, id)? {
            Some(doc) => Ok(Some(Stored::from_document(doc)?)),
            None => Ok(None),
        }
    }

    fn load<T: Entity>(&self, id: &str) -> Result<Stored<T>, RecordError> {
        self.find(id)?
            .ok_or_else(|| RecordError::not_found(T::KIND, id))
    }

    fn query<T: Entity>(&self, filters: &[Filter]) -> Result<Vec<Stored<T>>, RecordError> {
        let docs = self.store.query(T::COLLECTION, filters)?;
        debug!(collection = T::COLLECTION, hits = docs.len(), "query");
        docs.into_iter()
            .map(|d| Stored::from_document(d).map_err(RecordError::from))
            .collect()
    }

    fn create<T: Entity>(&self, data: T) -> Result<Stored<T>, RecordError> {
        let id = self.store.insert(T::COLLECTION, to_fields(&data)?)?;
        self.load(&id)
    }

    fn save<T: Entity>(&self, id: &str, data: &T) -> Result<Stored<T>, RecordError> {
        self.store.merge(T::COLLECTION, id, to_fields(data)?)?;
        self.load(id)
    }

    fn class_label(
        &self,
        cache: &mut HashMap<String, ClassLabel>,
        class_id: &str,
    ) -> Result<ClassLabel, RecordError> {
        if let Some(label) = cache.get(class_id) {
            return Ok(label.clone());
        }
        let mut label = ClassLabel::default();
        if let Some(class) = self.find::<ClassSection>(class_id)? {
            label.subject_name = self
                .find::<Subject>(&class.data.subject_id)?
                .map(|s| s.data.name);
            label.class_name = Some(class.data.class_name);
        }
        cache.insert(class_id.to_string(), label.clone());
        Ok(label)
    }

    /// Deletes `ids` from `collection` in batches no larger than the
    /// configured limit. Returns how many delete operations were committed.
    fn delete_chunked(&self, collection: &str, ids: &[String]) -> Result<usize, RecordError> {
        let mut deleted = 0;
        for chunk in ids.chunks(self.batch_limit()) {
            let mut batch = WriteBatch::new();
            for id in chunk {
                batch.delete(collection, id);
            }
            self.store.commit(batch)?;
            deleted += chunk.len();
        }
        Ok(deleted)
    }
}

pub(crate) fn required_text(field: &str, value: &str) -> Result<String, RecordError> {
    let t = value.trim();
    if t.is_empty() {
        return Err(RecordError::invalid(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

pub(crate) fn validate_year(year: i64) -> Result<i64, RecordError> {
    if !(2000..=2100).contains(&year) {
        return Err(RecordError::invalid(format!(
            "year must be between 2000 and 2100, got {}",
            year
        )));
    }
    Ok(year)
}

/// Normalizes to `YYYY-MM-DD`.
pub(crate) fn parse_date(raw: &str) -> Result<String, RecordError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| RecordError::invalid(format!("date must be YYYY-MM-DD, got {:?}", raw)))
}

pub(crate) fn validate_period(period: i64) -> Result<u32, RecordError> {
    u32::try_from(period)
        .ok()
        .filter(|p| *p >= 1)
        .ok_or_else(|| RecordError::invalid(format!("period must be >= 1, got {}", period)))
}
