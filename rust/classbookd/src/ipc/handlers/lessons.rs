use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_optional_str, get_required_i64, get_required_str, with_records};
use crate::ipc::types::{AppState, Records, Request};
use crate::model::{LessonLog, Stored};
use serde_json::{json, Value};

fn lesson_json(log: &Stored<LessonLog>) -> Value {
    let l = &log.data;
    json!({
        "id": log.id,
        "classId": l.class_id,
        "date": l.date,
        "period": l.period,
        "progress": l.progress,
        "note": l.note,
        "createdAt": log.created_at,
        "updatedAt": log.updated_at,
    })
}

fn lessons_list(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_str(params, "date")?;
    let logs = records.list_lesson_logs(&class_id, &date)?;
    Ok(json!({ "lessonLogs": logs.iter().map(lesson_json).collect::<Vec<_>>() }))
}

fn lessons_upsert(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_str(params, "date")?;
    let period = get_required_i64(params, "period")?;
    let progress = get_optional_str(params, "progress")?.unwrap_or_default();
    let note = get_optional_str(params, "note")?.unwrap_or_default();
    let saved = records.upsert_lesson_log(&class_id, &date, period, &progress, &note)?;
    Ok(json!({ "lessonLog": lesson_json(&saved.log), "created": saved.created }))
}

fn lessons_by_date(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let date = get_required_str(params, "date")?;
    let day = records.lesson_logs_by_date(&date)?;
    let rows: Vec<Value> = day
        .rows
        .iter()
        .map(|row| {
            let mut v = lesson_json(&row.log);
            v["className"] = json!(row.label.class_name);
            v["subjectName"] = json!(row.label.subject_name);
            v
        })
        .collect();
    Ok(json!({ "date": day.date, "rows": rows }))
}

fn lessons_delete(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "lessonLogId")?;
    records.delete_lesson_log(&id)?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let f: fn(&Records, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "lessons.list" => lessons_list,
        "lessons.upsert" => lessons_upsert,
        "lessons.byDate" => lessons_by_date,
        "lessons.delete" => lessons_delete,
        _ => return None,
    };
    Some(with_records(state, req, f))
}
