use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    get_optional_i64, get_optional_str, get_optional_term, get_required_i64, get_required_str,
    get_required_term, with_records,
};
use crate::ipc::types::{AppState, Records, Request};
use crate::model::{Stored, Subject};
use crate::records::SubjectPatch;
use serde_json::{json, Value};
use std::path::Path;

fn subject_json(subject: &Stored<Subject>) -> Value {
    let s = &subject.data;
    json!({
        "id": subject.id,
        "name": s.name,
        "year": s.year,
        "term": s.term.as_str(),
        "pdfPath": s.pdf_path,
        "pdfUrl": s.pdf_url,
        "pdfSize": s.pdf_size,
        "pdfMime": s.pdf_mime,
        "createdAt": subject.created_at,
        "updatedAt": subject.updated_at,
    })
}

fn subjects_list(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let year = get_required_i64(params, "year")?;
    let term = get_required_term(params, "term")?;
    let subjects = records.list_subjects(year, term)?;
    Ok(json!({ "subjects": subjects.iter().map(subject_json).collect::<Vec<_>>() }))
}

fn subjects_create(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let year = get_required_i64(params, "year")?;
    let term = get_required_term(params, "term")?;
    let subject = records.create_subject(&name, year, term)?;
    Ok(json!({ "subject": subject_json(&subject) }))
}

fn subjects_update(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "subjectId")?;
    let patch = SubjectPatch {
        name: get_optional_str(params, "name")?,
        year: get_optional_i64(params, "year")?,
        term: get_optional_term(params, "term")?,
    };
    let subject = records.update_subject(&id, patch)?;
    Ok(json!({ "subject": subject_json(&subject) }))
}

fn subjects_delete(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "subjectId")?;
    records.delete_subject(&id)?;
    Ok(json!({ "deleted": true }))
}

/// The size and extension are checked from file metadata before the
/// bytes are read.
fn subjects_attach_pdf(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "subjectId")?;
    let source = get_required_str(params, "sourcePath")?;
    let source = Path::new(&source);
    let file_name = match get_optional_str(params, "fileName")? {
        Some(name) => name,
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    };

    let meta = std::fs::metadata(source).map_err(|e| {
        HandlerErr::new(
            "file_read_failed",
            format!("failed to read {}: {}", source.to_string_lossy(), e),
        )
    })?;
    records.check_pdf(&file_name, meta.len())?;
    let bytes = std::fs::read(source).map_err(|e| {
        HandlerErr::new(
            "file_read_failed",
            format!("failed to read {}: {}", source.to_string_lossy(), e),
        )
    })?;
    let subject = records.attach_subject_pdf(&id, &file_name, &bytes)?;
    Ok(json!({ "subject": subject_json(&subject) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let f: fn(&Records, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "subjects.list" => subjects_list,
        "subjects.create" => subjects_create,
        "subjects.update" => subjects_update,
        "subjects.delete" => subjects_delete,
        "subjects.attachPdf" => subjects_attach_pdf,
        _ => return None,
    };
    Some(with_records(state, req, f))
}
