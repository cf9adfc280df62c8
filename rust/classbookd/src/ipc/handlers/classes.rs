use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    class_json, get_optional_i64, get_optional_str, get_optional_term, get_required_i64,
    get_required_str, get_required_term, with_records,
};
use crate::ipc::types::{AppState, Records, Request};
use crate::model::ScheduleSlot;
use crate::records::ClassPatch;
use serde_json::{json, Value};

fn classes_list(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let year = get_required_i64(params, "year")?;
    let term = get_required_term(params, "term")?;
    let rows: Vec<Value> = records
        .list_classes(year, term)?
        .iter()
        .map(|row| {
            let mut v = class_json(&row.class);
            v["subjectName"] = json!(row.subject_name);
            v["studentCount"] = json!(row.student_count);
            v
        })
        .collect();
    Ok(json!({ "classes": rows }))
}

fn classes_create(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let class_name = get_required_str(params, "className")?;
    let year = get_required_i64(params, "year")?;
    let term = get_required_term(params, "term")?;
    let class = records.create_class(&subject_id, &class_name, year, term)?;
    Ok(json!({ "class": class_json(&class) }))
}

fn classes_update(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "classId")?;
    let patch = ClassPatch {
        subject_id: get_optional_str(params, "subjectId")?,
        class_name: get_optional_str(params, "className")?,
        year: get_optional_i64(params, "year")?,
        term: get_optional_term(params, "term")?,
    };
    let class = records.update_class(&id, patch)?;
    Ok(json!({ "class": class_json(&class) }))
}

fn classes_delete(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "classId")?;
    let counts = records.delete_class(&id)?;
    Ok(json!({
        "deleted": {
            "students": counts.students,
            "lessonLogs": counts.lesson_logs,
            "attendance": counts.attendance,
        }
    }))
}

/// Out-of-range numbers are passed through as 0 so the record layer drops
/// them along with the other invalid slots.
fn parse_slots(params: &Value) -> Result<Vec<ScheduleSlot>, HandlerErr> {
    let Some(items) = params.get("slots").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing slots"));
    };
    items
        .iter()
        .map(|item| {
            let weekday = get_required_i64(item, "weekday")?;
            let period = get_required_i64(item, "period")?;
            Ok(ScheduleSlot {
                weekday: u8::try_from(weekday).unwrap_or(0),
                period: u32::try_from(period).unwrap_or(0),
            })
        })
        .collect()
}

fn classes_schedule_set(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let id = get_required_str(params, "classId")?;
    let slots = parse_slots(params)?;
    let class = records.set_schedule(&id, &slots)?;
    Ok(json!({ "class": class_json(&class) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let f: fn(&Records, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "classes.list" => classes_list,
        "classes.create" => classes_create,
        "classes.update" => classes_update,
        "classes.delete" => classes_delete,
        "classes.schedule.set" => classes_schedule_set,
        _ => return None,
    };
    Some(with_records(state, req, f))
}
