use crate::csv_import::{RosterRow, CSV_TEMPLATE};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_required_str, student_json, with_records};
use crate::ipc::types::{AppState, Records, Request};
use crate::records::{ImportPolicy, ImportSummary, StudentPatch};
use serde_json::{json, Value};

const TEMPLATE_FILE_NAME: &str = "students_template.csv";

fn students_list(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let students = records.list_students(&class_id)?;
    Ok(json!({ "students": students.iter().map(student_json).collect::<Vec<_>>() }))
}

fn students_create(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let no = get_required_str(params, "studentNo")?;
    let name = get_required_str(params, "studentName")?;
    let student = records.create_student(&class_id, &no, &name)?;
    Ok(json!({ "student": student_json(&student) }))
}

fn students_update(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "studentId")?;
    let patch = StudentPatch {
        student_no: get_optional_str(params, "studentNo")?,
        student_name: get_optional_str(params, "studentName")?,
    };
    let student = records.update_student(&id, patch)?;
    Ok(json!({ "student": student_json(&student) }))
}

fn students_delete(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "studentId")?;
    let removed = records.delete_student(&id)?;
    Ok(json!({ "deleted": true, "attendanceRemoved": removed }))
}

fn parse_inline_rows(items: &[Value]) -> Result<Vec<RosterRow>, HandlerErr> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            Ok(RosterRow {
                line: i as u64 + 1,
                student_no: get_optional_str(item, "studentNo")?.unwrap_or_default(),
                student_name: get_optional_str(item, "studentName")?.unwrap_or_default(),
            })
        })
        .collect()
}

fn summary_json(summary: &ImportSummary, policy: ImportPolicy) -> Value {
    json!({
        "policy": policy,
        "created": summary.created,
        "updated": summary.updated,
        "skipped": summary.skipped,
        "rejected": summary.rejected,
        "rejectedLines": summary.rejected_lines,
        "duplicatesInBatch": summary.duplicates_in_batch,
    })
}

/// Imports either a CSV file (`path`) or inline `rows`.
fn students_import(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let policy = match get_optional_str(params, "policy")? {
        Some(raw) => ImportPolicy::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params("policy must be upsert or skip"))?,
        None => records.config().import.default_policy,
    };

    let summary = if let Some(items) = params.get("rows").and_then(|v| v.as_array()) {
        let rows = parse_inline_rows(items)?;
        records.import_students(&class_id, &rows, policy)?
    } else {
        let path = get_required_str(params, "path")?;
        let bytes = std::fs::read(&path).map_err(|e| {
            HandlerErr::new("file_read_failed", format!("failed to read {}: {}", path, e))
        })?;
        records.import_students_csv(&class_id, &bytes, policy)?
    };
    Ok(summary_json(&summary, policy))
}

fn students_csv_template(_records: &Records, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!({ "fileName": TEMPLATE_FILE_NAME, "csv": CSV_TEMPLATE }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let f: fn(&Records, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "students.list" => students_list,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
        "students.import" => students_import,
        "students.csvTemplate" => students_csv_template,
        _ => return None,
    };
    Some(with_records(state, req, f))
}
