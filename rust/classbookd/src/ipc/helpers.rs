//! Parameter readers and record views shared by the handlers.

use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Records, Request};
use crate::model::{ClassSection, Stored, Student, Term};
use serde_json::{json, Value};

/// Runs `f` against the open workspace and wraps the outcome in a response.
pub fn with_records(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&Records, &Value) -> Result<Value, HandlerErr>,
) -> Value {
    let Some(records) = state.records.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(records, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    get_optional_i64(params, key)?
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

/// Accepts `"1"`/`"2"` or the bare numbers.
pub fn get_optional_term(params: &Value, key: &str) -> Result<Option<Term>, HandlerErr> {
    let raw = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => String::new(),
    };
    Term::parse(&raw)
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be 1 or 2", key)))
}

pub fn get_required_term(params: &Value, key: &str) -> Result<Term, HandlerErr> {
    get_optional_term(params, key)?
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn class_json(class: &Stored<ClassSection>) -> Value {
    let c = &class.data;
    json!({
        "id": class.id,
        "subjectId": c.subject_id,
        "className": c.class_name,
        "year": c.year,
        "term": c.term.as_str(),
        "schedule": c.schedule.iter().map(|s| json!({
            "weekday": s.weekday,
            "period": s.period,
        })).collect::<Vec<_>>(),
        "createdAt": class.created_at,
        "updatedAt": class.updated_at,
    })
}

pub fn student_json(student: &Stored<Student>) -> Value {
    json!({
        "id": student.id,
        "classId": student.data.class_id,
        "studentNo": student.data.student_no,
        "studentName": student.data.student_name,
        "createdAt": student.created_at,
        "updatedAt": student.updated_at,
    })
}
