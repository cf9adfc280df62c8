use super::{required_text, validate_year, RecordManager};
use crate::blob::BlobStore;
use crate::error::RecordError;
use crate::model::{
    ClassSection, ScheduleSlot, Stored, Subject, Term, COL_ATTENDANCE, COL_CLASSES,
    COL_LESSON_LOGS, COL_STUDENTS,
};
use crate::store::{Document, DocumentStore, Filter};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ClassPatch {
    pub subject_id: Option<String>,
    pub class_name: Option<String>,
    pub year: Option<i64>,
    pub term: Option<Term>,
}

/// Listing row with the subject name joined at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSummary {
    pub class: Stored<ClassSection>,
    pub subject_name: Option<String>,
    pub student_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeCounts {
    pub students: usize,
    pub lesson_logs: usize,
    pub attendance: usize,
}

impl<S: DocumentStore, B: BlobStore> RecordManager<S, B> {
    pub fn create_class(
        &self,
        subject_id: &str,
        class_name: &str,
        year: i64,
        term: Term,
    ) -> Result<Stored<ClassSection>, RecordError> {
        self.load::<Subject>(subject_id)?;
        let class_name = required_text("class name", class_name)?;
        let year = validate_year(year)?;
        self.ensure_class_unique(subject_id, &class_name, year, term, None)?;
        let class = self.create(ClassSection {
            subject_id: subject_id.to_string(),
            class_name,
            year,
            term,
            schedule: Vec::new(),
        })?;
        info!(class_id = %class.id, subject_id = %subject_id, "class created");
        Ok(class)
    }

    pub fn update_class(
        &self,
        id: &str,
        patch: ClassPatch,
    ) -> Result<Stored<ClassSection>, RecordError> {
        let mut class = self.load::<ClassSection>(id)?;
        if let Some(subject_id) = patch.subject_id {
            self.load::<Subject>(&subject_id)?;
            class.data.subject_id = subject_id;
        }
        if let Some(name) = patch.class_name {
            class.data.class_name = required_text("class name", &name)?;
        }
        if let Some(year) = patch.year {
            class.data.year = validate_year(year)?;
        }
        if let Some(term) = patch.term {
            class.data.term = term;
        }
        let c = &class.data;
        self.ensure_class_unique(&c.subject_id, &c.class_name, c.year, c.term, Some(id))?;
        self.save(id, &class.data)
    }

    pub fn get_class(&self, id: &str) -> Result<Stored<ClassSection>, RecordError> {
        self.load(id)
    }

    pub fn list_classes(&self, year: i64, term: Term) -> Result<Vec<ClassSummary>, RecordError> {
        let classes = self.query::<ClassSection>(&[
            Filter::eq("year", year),
            Filter::eq("term", term.as_str()),
        ])?;
        let mut subject_names: HashMap<String, Option<String>> = HashMap::new();
        let mut out = Vec::with_capacity(classes.len());
        for class in classes {
            let subject_name = match subject_names.get(&class.data.subject_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .find::<Subject>(&class.data.subject_id)?
                        .map(|s| s.data.name);
                    subject_names.insert(class.data.subject_id.clone(), name.clone());
                    name
                }
            };
            let student_count = self
                .store
                .query(COL_STUDENTS, &[Filter::eq("class_id", class.id.as_str())])?
                .len();
            out.push(ClassSummary {
                class,
                subject_name,
                student_count,
            });
        }
        out.sort_by(|a, b| a.class.data.class_name.cmp(&b.class.data.class_name));
        Ok(out)
    }

    /// Stores the weekly timetable. Slots outside weekday 1..=7 or period
    /// >= 1 are dropped; repeated (weekday, period) pairs keep the first.
    pub fn set_schedule(
        &self,
        class_id: &str,
        slots: &[ScheduleSlot],
    ) -> Result<Stored<ClassSection>, RecordError> {
        let mut class = self.load::<ClassSection>(class_id)?;
        let mut seen = HashSet::new();
        let kept: Vec<ScheduleSlot> = slots
            .iter()
            .copied()
            .filter(|s| s.is_valid() && seen.insert((s.weekday, s.period)))
            .collect();
        if kept.len() < slots.len() {
            warn!(
                class_id = %class_id,
                dropped = slots.len() - kept.len(),
                "schedule slots dropped"
            );
        }
        class.data.schedule = kept;
        self.save(class_id, &class.data)
    }

    /// Removes the class with its students, lesson logs and attendance.
    /// The class document goes last.
    pub fn delete_class(&self, id: &str) -> Result<CascadeCounts, RecordError> {
        self.load::<ClassSection>(id)?;
        let by_class = [Filter::eq("class_id", id)];

        let ids = |docs: Vec<Document>| -> Vec<String> {
            docs.into_iter().map(|d| d.id).collect()
        };
        let attendance = ids(self.store.query(COL_ATTENDANCE, &by_class)?);
        let lesson_logs = ids(self.store.query(COL_LESSON_LOGS, &by_class)?);
        let students = ids(self.store.query(COL_STUDENTS, &by_class)?);

        let counts = CascadeCounts {
            attendance: self.delete_chunked(COL_ATTENDANCE, &attendance)?,
            lesson_logs: self.delete_chunked(COL_LESSON_LOGS, &lesson_logs)?,
            students: self.delete_chunked(COL_STUDENTS, &students)?,
        };
        self.store.delete(COL_CLASSES, id)?;
        info!(
            class_id = %id,
            students = counts.students,
            lesson_logs = counts.lesson_logs,
            attendance = counts.attendance,
            "class deleted with dependents"
        );
        Ok(counts)
    }

    fn ensure_class_unique(
        &self,
        subject_id: &str,
        class_name: &str,
        year: i64,
        term: Term,
        exclude_id: Option<&str>,
    ) -> Result<(), RecordError> {
        let clash = self
            .query::<ClassSection>(&[
                Filter::eq("subject_id", subject_id),
                Filter::eq("year", year),
                Filter::eq("term", term.as_str()),
            ])?
            .into_iter()
            .any(|c| c.data.class_name == class_name && Some(c.id.as_str()) != exclude_id);
        if clash {
            return Err(RecordError::Conflict(format!(
                "class {:?} already exists for this subject in {} term {}",
                class_name,
                year,
                term.as_str()
            )));
        }
        Ok(())
    }
}
