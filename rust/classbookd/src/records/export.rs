use super::{required_text, RecordManager};
use crate::blob::BlobStore;
use crate::error::RecordError;
use crate::model::{ExportLog, EXPORTABLE_COLLECTIONS};
use crate::store::{Document, DocumentStore};
use anyhow::Context;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const WORKBOOK_FORMAT: &str = "classbook-workbook-v1";
const EMPTY_SHEET: &str = "(empty)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSummary {
    pub collection: String,
    pub entry: String,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub export_id: String,
    pub output_path: String,
    pub sheets: Vec<SheetSummary>,
}

struct Sheet {
    collection: String,
    entry: String,
    rows: usize,
    bytes: Vec<u8>,
}

impl<S: DocumentStore, B: BlobStore> RecordManager<S, B> {
    /// Writes the selected collections to a zip workbook, one CSV sheet per
    /// collection plus a manifest, and records the export.
    pub fn export_workbook(
        &self,
        collections: &[String],
        title: &str,
        out_path: &Path,
    ) -> Result<ExportSummary, RecordError> {
        let title = required_text("title", title)?;
        let mut selected: Vec<&str> = Vec::new();
        for raw in collections {
            let name = raw.trim();
            if !EXPORTABLE_COLLECTIONS.contains(&name) {
                return Err(RecordError::invalid(format!(
                    "unknown collection {:?}; expected one of {}",
                    name,
                    EXPORTABLE_COLLECTIONS.join(", ")
                )));
            }
            if !selected.contains(&name) {
                selected.push(name);
            }
        }
        if selected.is_empty() {
            return Err(RecordError::invalid("collections must not be empty"));
        }

        let mut sheets = Vec::with_capacity(selected.len());
        for collection in &selected {
            let docs = self.store.query(collection, &[])?;
            let bytes = render_sheet(&docs).map_err(RecordError::Export)?;
            sheets.push(Sheet {
                collection: collection.to_string(),
                entry: format!("sheets/{}.csv", collection),
                rows: docs.len(),
                bytes,
            });
        }
        let summaries = write_workbook(out_path, &title, &sheets).map_err(RecordError::Export)?;

        let output_path = out_path.to_string_lossy().to_string();
        let log = self.create(ExportLog {
            title,
            collections: selected.iter().map(|c| c.to_string()).collect(),
            output_path: output_path.clone(),
            sheet_count: summaries.len(),
        })?;
        info!(
            export_id = %log.id,
            path = %output_path,
            sheets = summaries.len(),
            "workbook exported"
        );
        Ok(ExportSummary {
            export_id: log.id,
            output_path,
            sheets: summaries,
        })
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn render_sheet(docs: &[Document]) -> anyhow::Result<Vec<u8>> {
    let mut out = csv::Writer::from_writer(Vec::new());
    if docs.is_empty() {
        out.write_record([EMPTY_SHEET])
            .context("failed to write empty sheet")?;
        return out.into_inner().context("failed to flush sheet");
    }

    let fields: BTreeSet<&str> = docs
        .iter()
        .flat_map(|d| d.fields.keys().map(String::as_str))
        .collect();
    let mut header = vec!["id"];
    header.extend(fields.iter().copied());
    header.extend(["created_at", "updated_at"]);
    out.write_record(&header)
        .context("failed to write sheet header")?;

    for doc in docs {
        let mut row = Vec::with_capacity(header.len());
        row.push(doc.id.clone());
        row.extend(fields.iter().map(|f| cell_text(doc.fields.get(*f))));
        row.push(doc.created_at.clone());
        row.push(doc.updated_at.clone());
        out.write_record(&row)
            .with_context(|| format!("failed to write row for {}", doc.id))?;
    }
    out.into_inner().context("failed to flush sheet")
}

fn partial_path(out_path: &Path) -> PathBuf {
    let mut name = out_path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    out_path.with_file_name(name)
}

/// Builds the zip at `<out_path>.partial` and renames it into place.
fn write_workbook(
    out_path: &Path,
    title: &str,
    sheets: &[Sheet],
) -> anyhow::Result<Vec<SheetSummary>> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let tmp = partial_path(out_path);
    let written = write_zip(&tmp, title, sheets).and_then(|summaries| {
        std::fs::rename(&tmp, out_path).with_context(|| {
            format!("failed to move workbook to {}", out_path.to_string_lossy())
        })?;
        Ok(summaries)
    });
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

fn write_zip(path: &Path, title: &str, sheets: &[Sheet]) -> anyhow::Result<Vec<SheetSummary>> {
    let out_file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.to_string_lossy()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut summaries = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        zip.start_file(sheet.entry.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", sheet.entry))?;
        zip.write_all(&sheet.bytes)
            .with_context(|| format!("failed to write entry {}", sheet.entry))?;
        let mut hasher = Sha256::new();
        hasher.update(&sheet.bytes);
        summaries.push(SheetSummary {
            collection: sheet.collection.clone(),
            entry: sheet.entry.clone(),
            rows: sheet.rows,
            sha256: format!("{:x}", hasher.finalize()),
        });
    }

    let sheet_list: Vec<Value> = summaries
        .iter()
        .map(|s| {
            json!({
                "collection": s.collection,
                "entry": s.entry,
                "rows": s.rows,
                "sha256": s.sha256,
            })
        })
        .collect();
    let manifest = json!({
        "format": WORKBOOK_FORMAT,
        "title": title,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": crate::store::now_ts(),
        "sheets": sheet_list,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;
    zip.finish().context("failed to finalize workbook")?;
    Ok(summaries)
}
