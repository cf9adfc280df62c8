use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_required_i64, get_required_str, with_records};
use crate::ipc::types::{AppState, Records, Request};
use crate::model::{AttendanceRecord, AttendanceStatus, LabelSet, Stored};
use crate::records::AttendanceEntry;
use serde_json::{json, Map, Value};

/// Statuses leave the daemon in the configured vocabulary and are accepted
/// in any of them.
fn parse_status(raw: &str) -> Result<AttendanceStatus, HandlerErr> {
    AttendanceStatus::from_label(raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown attendance status {:?}", raw)))
}

fn record_json(record: &Stored<AttendanceRecord>, labels: LabelSet) -> Value {
    let r = &record.data;
    json!({
        "id": record.id,
        "classId": r.class_id,
        "date": r.date,
        "period": r.period,
        "studentId": r.student_id,
        "status": r.status.label(labels),
        "remark": r.remark,
        "createdAt": record.created_at,
        "updatedAt": record.updated_at,
    })
}

fn status_labels(labels: LabelSet) -> Vec<&'static str> {
    AttendanceStatus::ALL.iter().map(|s| s.label(labels)).collect()
}

fn attendance_sheet(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let labels = records.config().attendance.labels;
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_str(params, "date")?;
    let period = get_required_i64(params, "period")?;
    let rows: Vec<Value> = records
        .attendance_sheet(&class_id, &date, period)?
        .iter()
        .map(|row| {
            json!({
                "studentId": row.student.id,
                "studentNo": row.student.data.student_no,
                "studentName": row.student.data.student_name,
                "recordId": row.record_id,
                "status": row.status.label(labels),
                "remark": row.remark,
            })
        })
        .collect();
    Ok(json!({ "rows": rows, "statuses": status_labels(labels) }))
}

fn attendance_upsert(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let labels = records.config().attendance.labels;
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_str(params, "date")?;
    let period = get_required_i64(params, "period")?;
    let student_id = get_required_str(params, "studentId")?;
    let status = parse_status(&get_required_str(params, "status")?)?;
    let remark = get_optional_str(params, "remark")?.unwrap_or_default();
    let record =
        records.upsert_attendance(&class_id, &date, period, &student_id, status, &remark)?;
    Ok(json!({ "record": record_json(&record, labels) }))
}

fn parse_entries(params: &Value) -> Result<Vec<AttendanceEntry>, HandlerErr> {
    let Some(items) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    items
        .iter()
        .map(|item| {
            let status = match get_optional_str(item, "status")? {
                Some(raw) => parse_status(&raw)?,
                None => AttendanceStatus::default(),
            };
            Ok(AttendanceEntry {
                student_id: get_required_str(item, "studentId")?,
                status,
                remark: get_optional_str(item, "remark")?.unwrap_or_default(),
            })
        })
        .collect()
}

fn attendance_save(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let labels = records.config().attendance.labels;
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_str(params, "date")?;
    let period = get_required_i64(params, "period")?;
    let entries = parse_entries(params)?;
    let apply_all = match get_optional_str(params, "applyAll")? {
        Some(raw) => Some(parse_status(&raw)?),
        None => None,
    };
    let saved = records.save_attendance_sheet(&class_id, &date, period, &entries, apply_all)?;
    Ok(json!({
        "saved": saved.len(),
        "records": saved.iter().map(|r| record_json(r, labels)).collect::<Vec<_>>(),
    }))
}

fn attendance_by_date(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let labels = records.config().attendance.labels;
    let date = get_required_str(params, "date")?;
    let day = records.attendance_by_date(&date)?;
    let rows: Vec<Value> = day
        .rows
        .iter()
        .map(|row| {
            let mut v = record_json(&row.record, labels);
            v["className"] = json!(row.label.class_name);
            v["subjectName"] = json!(row.label.subject_name);
            v["studentNo"] = json!(row.student_no);
            v["studentName"] = json!(row.student_name);
            v
        })
        .collect();
    let mut counts = Map::new();
    for (status, n) in &day.counts {
        counts.insert(status.label(labels).to_string(), json!(n));
    }
    Ok(json!({ "rows": rows, "counts": counts }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let f: fn(&Records, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "attendance.sheet" => attendance_sheet,
        "attendance.upsert" => attendance_upsert,
        "attendance.save" => attendance_save,
        "attendance.byDate" => attendance_by_date,
        _ => return None,
    };
    Some(with_records(state, req, f))
}
