use crate::blob::FsBlobStore;
use crate::config::AppConfig;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::with_records;
use crate::ipc::types::{AppState, Request};
use crate::records::RecordManager;
use crate::store::SqliteStore;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Opens (creating if needed) the workspace at `path` and makes it current.
/// The previous workspace stays selected when this fails.
pub fn open_workspace(state: &mut AppState, path: &Path) -> Result<PathBuf, HandlerErr> {
    std::fs::create_dir_all(path).map_err(|e| {
        HandlerErr::new(
            "workspace_open_failed",
            format!("failed to create {}: {}", path.to_string_lossy(), e),
        )
    })?;
    let config = match &state.config_override {
        Some(cfg) => cfg.clone(),
        None => AppConfig::for_workspace(path)
            .map_err(|e| HandlerErr::new("config_invalid", e.to_string()))?,
    };
    let store = SqliteStore::open(path)
        .map_err(|e| HandlerErr::new("db_open_failed", e.to_string()))?;
    let blobs = FsBlobStore::new(path, &config.uploads.public_base_url);

    state.records = Some(RecordManager::new(store, blobs, config));
    state.workspace = Some(path.to_path_buf());
    info!(workspace = %path.to_string_lossy(), "workspace opened");
    Ok(path.to_path_buf())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(path) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            warn!(workspace = %path.to_string_lossy(), error = %e, "workspace open failed");
            e.response(&req.id)
        }
    }
}

fn handle_system_check(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = state
        .workspace
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());
    with_records(state, req, |records, _| {
        let check = records.check();
        Ok(json!({
            "workspacePath": workspace,
            "storeOk": check.store_ok,
            "storeError": check.store_error,
            "blobsOk": check.blobs_ok,
            "blobsError": check.blobs_error,
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "system.check" => Some(handle_system_check(state, req)),
        _ => None,
    }
}
