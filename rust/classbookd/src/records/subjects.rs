use super::{required_text, validate_year, RecordManager};
use crate::blob::{subject_pdf_path, validate_pdf, BlobStore};
use crate::error::RecordError;
use crate::model::{ClassSection, Stored, Subject, Term, COL_SUBJECTS, PDF_MIME};
use crate::store::{DocumentStore, Filter};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub year: Option<i64>,
    pub term: Option<Term>,
}

impl<S: DocumentStore, B: BlobStore> RecordManager<S, B> {
    pub fn create_subject(
        &self,
        name: &str,
        year: i64,
        term: Term,
    ) -> Result<Stored<Subject>, RecordError> {
        let name = required_text("name", name)?;
        let year = validate_year(year)?;
        self.ensure_subject_unique(&name, year, term, None)?;
        let subject = self.create(Subject {
            name,
            year,
            term,
            pdf_path: None,
            pdf_url: None,
            pdf_size: None,
            pdf_mime: None,
        })?;
        info!(subject_id = %subject.id, name = %subject.data.name, "subject created");
        Ok(subject)
    }

    pub fn update_subject(
        &self,
        id: &str,
        patch: SubjectPatch,
    ) -> Result<Stored<Subject>, RecordError> {
        let mut subject = self.load::<Subject>(id)?;
        if let Some(name) = patch.name {
            subject.data.name = required_text("name", &name)?;
        }
        if let Some(year) = patch.year {
            subject.data.year = validate_year(year)?;
        }
        if let Some(term) = patch.term {
            subject.data.term = term;
        }
        let s = &subject.data;
        self.ensure_subject_unique(&s.name, s.year, s.term, Some(id))?;
        self.save(id, &subject.data)
    }

    pub fn get_subject(&self, id: &str) -> Result<Stored<Subject>, RecordError> {
        self.load(id)
    }

    pub fn list_subjects(&self, year: i64, term: Term) -> Result<Vec<Stored<Subject>>, RecordError> {
        let mut rows = self.query::<Subject>(&[
            Filter::eq("year", year),
            Filter::eq("term", term.as_str()),
        ])?;
        rows.sort_by(|a, b| a.data.name.cmp(&b.data.name));
        Ok(rows)
    }

    /// Refuses while any class still belongs to the subject. Removes the
    /// stored PDF before the subject document itself.
    pub fn delete_subject(&self, id: &str) -> Result<(), RecordError> {
        let subject = self.load::<Subject>(id)?;
        let classes = self.query::<ClassSection>(&[Filter::eq("subject_id", id)])?;
        if !classes.is_empty() {
            return Err(RecordError::InUse {
                kind: "subject",
                count: classes.len(),
                referrers: "classes",
            });
        }
        self.store.delete(COL_SUBJECTS, id)?;
        if let Some(path) = subject.data.pdf_path.as_deref() {
            if let Err(e) = self.blobs.delete(path) {
                warn!(subject_id = %id, path = %path, error = %e, "subject pdf not removed");
            }
        }
        info!(subject_id = %id, "subject deleted");
        Ok(())
    }

    /// Checks an upload against the configured size limit without touching storage.
    pub fn check_pdf(&self, file_name: &str, size: u64) -> Result<(), RecordError> {
        validate_pdf(file_name, size, self.config.uploads.max_pdf_bytes)?;
        Ok(())
    }

    pub fn attach_subject_pdf(
        &self,
        id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Stored<Subject>, RecordError> {
        let mut subject = self.load::<Subject>(id)?;
        self.check_pdf(file_name, bytes.len() as u64)?;

        let blob = self.blobs.put(&subject_pdf_path(id), bytes, PDF_MIME)?;
        subject.data.pdf_path = Some(blob.path);
        subject.data.pdf_url = Some(blob.url);
        subject.data.pdf_size = Some(blob.size);
        subject.data.pdf_mime = Some(PDF_MIME.to_string());
        info!(subject_id = %id, size = blob.size, "subject pdf attached");
        self.save(id, &subject.data)
    }

    fn ensure_subject_unique(
        &self,
        name: &str,
        year: i64,
        term: Term,
        exclude_id: Option<&str>,
    ) -> Result<(), RecordError> {
        let clash = self
            .query::<Subject>(&[Filter::eq("year", year), Filter::eq("term", term.as_str())])?
            .into_iter()
            .any(|s| s.data.name == name && Some(s.id.as_str()) != exclude_id);
        if clash {
            return Err(RecordError::Conflict(format!(
                "subject {:?} already exists for {} term {}",
                name,
                year,
                term.as_str()
            )));
        }
        Ok(())
    }
}
