use crate::blob::FsBlobStore;
use crate::config::AppConfig;
use crate::records::RecordManager;
use crate::store::SqliteStore;
use serde::Deserialize;
use std::path::PathBuf;

pub type Records = RecordManager<SqliteStore, FsBlobStore>;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub records: Option<Records>,
    /// Config given on the command line. Wins over the workspace file.
    pub config_override: Option<AppConfig>,
}
