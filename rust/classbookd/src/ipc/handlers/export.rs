use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, with_records};
use crate::ipc::types::{AppState, Records, Request};
use serde_json::{json, Value};
use std::path::PathBuf;

fn export_workbook(records: &Records, params: &Value) -> Result<Value, HandlerErr> {
    let title = get_required_str(params, "title")?;
    let out_path = get_required_str(params, "outPath").map(PathBuf::from)?;
    let Some(items) = params.get("collections").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing collections"));
    };
    let collections = items
        .iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| HandlerErr::bad_params("collections must be strings"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let summary = records.export_workbook(&collections, &title, &out_path)?;
    Ok(json!({
        "exportId": summary.export_id,
        "outputPath": summary.output_path,
        "sheets": summary.sheets.iter().map(|s| json!({
            "collection": s.collection,
            "entry": s.entry,
            "rows": s.rows,
            "sha256": s.sha256,
        })).collect::<Vec<_>>(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "export.workbook" => Some(with_records(state, req, export_workbook)),
        _ => None,
    }
}
