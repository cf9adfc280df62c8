use super::{required_text, RecordManager};
use crate::blob::BlobStore;
use crate::csv_import::{parse_roster, RosterRow};
use crate::error::RecordError;
use crate::model::{ClassSection, Stored, Student, COL_ATTENDANCE, COL_STUDENTS};
use crate::store::{DocumentStore, Filter};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// What an import does with a student number that is already on the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPolicy {
    /// Overwrite the stored name. Repeats within one file: last row wins.
    #[default]
    Upsert,
    /// Keep the stored name. Repeats within one file: first row wins.
    Skip,
}

impl ImportPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "upsert" => Some(Self::Upsert),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Rows with a blank number or name.
    pub rejected: usize,
    pub rejected_lines: Vec<u64>,
    /// Rows whose number already appeared earlier in the same input.
    pub duplicates_in_batch: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub student_no: Option<String>,
    pub student_name: Option<String>,
}

impl<S: DocumentStore, B: BlobStore> RecordManager<S, B> {
    pub fn create_student(
        &self,
        class_id: &str,
        student_no: &str,
        student_name: &str,
    ) -> Result<Stored<Student>, RecordError> {
        self.load::<ClassSection>(class_id)?;
        let student_no = required_text("student number", student_no)?;
        let student_name = required_text("student name", student_name)?;
        if self.find_student_by_no(class_id, &student_no)?.is_some() {
            return Err(RecordError::Conflict(format!(
                "student number {} already exists in this class",
                student_no
            )));
        }
        self.create(Student {
            class_id: class_id.to_string(),
            student_no,
            student_name,
        })
    }

    pub fn update_student(
        &self,
        id: &str,
        patch: StudentPatch,
    ) -> Result<Stored<Student>, RecordError> {
        let mut student = self.load::<Student>(id)?;
        if let Some(no) = patch.student_no {
            let no = required_text("student number", &no)?;
            if let Some(other) = self.find_student_by_no(&student.data.class_id, &no)? {
                if other.id != id {
                    return Err(RecordError::Conflict(format!(
                        "student number {} already exists in this class",
                        no
                    )));
                }
            }
            student.data.student_no = no;
        }
        if let Some(name) = patch.student_name {
            student.data.student_name = required_text("student name", &name)?;
        }
        self.save(id, &student.data)
    }

    pub fn get_student(&self, id: &str) -> Result<Stored<Student>, RecordError> {
        self.load(id)
    }

    pub fn list_students(&self, class_id: &str) -> Result<Vec<Stored<Student>>, RecordError> {
        let mut rows = self.query::<Student>(&[Filter::eq("class_id", class_id)])?;
        rows.sort_by(|a, b| a.data.student_no.cmp(&b.data.student_no));
        Ok(rows)
    }

    /// Removes the student and every attendance record that names them.
    /// Returns the number of attendance records removed.
    pub fn delete_student(&self, id: &str) -> Result<usize, RecordError> {
        self.load::<Student>(id)?;
        let attendance: Vec<String> = self
            .store
            .query(COL_ATTENDANCE, &[Filter::eq("student_id", id)])?
            .into_iter()
            .map(|d| d.id)
            .collect();
        let removed = self.delete_chunked(COL_ATTENDANCE, &attendance)?;
        self.store.delete(COL_STUDENTS, id)?;
        info!(student_id = %id, attendance = removed, "student deleted");
        Ok(removed)
    }

    /// Applies roster rows in input order. Later rows see the effect of
    /// earlier ones, which is what settles repeats within one input.
    pub fn import_students(
        &self,
        class_id: &str,
        rows: &[RosterRow],
        policy: ImportPolicy,
    ) -> Result<ImportSummary, RecordError> {
        self.load::<ClassSection>(class_id)?;
        let mut roster: HashMap<String, Stored<Student>> = self
            .list_students(class_id)?
            .into_iter()
            .map(|s| (s.data.student_no.clone(), s))
            .collect();

        let mut summary = ImportSummary::default();
        let mut seen = HashSet::new();
        for row in rows {
            let no = row.student_no.trim();
            let name = row.student_name.trim();
            if no.is_empty() || name.is_empty() {
                summary.rejected += 1;
                summary.rejected_lines.push(row.line);
                continue;
            }
            if !seen.insert(no.to_string()) {
                summary.duplicates_in_batch += 1;
            }

            match (roster.get(no), policy) {
                (Some(_), ImportPolicy::Skip) => summary.skipped += 1,
                (Some(existing), ImportPolicy::Upsert) => {
                    let mut data = existing.data.clone();
                    data.student_name = name.to_string();
                    let saved = self.save(&existing.id, &data)?;
                    roster.insert(no.to_string(), saved);
                    summary.updated += 1;
                }
                (None, _) => {
                    let created = self.create(Student {
                        class_id: class_id.to_string(),
                        student_no: no.to_string(),
                        student_name: name.to_string(),
                    })?;
                    roster.insert(no.to_string(), created);
                    summary.created += 1;
                }
            }
        }

        if summary.rejected > 0 {
            warn!(
                class_id = %class_id,
                rejected = summary.rejected,
                lines = ?summary.rejected_lines,
                "roster rows with blank number or name"
            );
        }
        info!(
            class_id = %class_id,
            ?policy,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            "roster imported"
        );
        Ok(summary)
    }

    pub fn import_students_csv(
        &self,
        class_id: &str,
        bytes: &[u8],
        policy: ImportPolicy,
    ) -> Result<ImportSummary, RecordError> {
        let rows = parse_roster(bytes)?;
        self.import_students(class_id, &rows, policy)
    }

    fn find_student_by_no(
        &self,
        class_id: &str,
        student_no: &str,
    ) -> Result<Option<Stored<Student>>, RecordError> {
        Ok(self
            .query::<Student>(&[
                Filter::eq("class_id", class_id),
                Filter::eq("student_no", student_no),
            ])?
            .into_iter()
            .next())
    }
}
