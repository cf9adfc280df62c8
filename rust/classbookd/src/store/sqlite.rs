use super::{now_ts, Document, DocumentStore, Fields, Filter, StoreError, WriteBatch, WriteOp};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "classbook.sqlite3";
pub const DEFAULT_MAX_BATCH_OPS: usize = 500;

/// Document store kept in a single SQLite table, one JSON body per row.
pub struct SqliteStore {
    conn: Connection,
    max_batch_ops: usize,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join(DB_FILE))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    pub fn with_max_batch_ops(mut self, max_batch_ops: usize) -> Self {
        self.max_batch_ops = max_batch_ops.max(1);
        self
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents(
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY(collection, id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
            [],
        )?;
        Ok(Self {
            conn,
            max_batch_ops: DEFAULT_MAX_BATCH_OPS,
        })
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode(
    (id, body, created_at, updated_at): (String, String, String, String),
) -> Result<Document, StoreError> {
    let fields: Fields = serde_json::from_str(&body)?;
    Ok(Document {
        id,
        fields,
        created_at,
        updated_at,
    })
}

// json_extract yields 1/0 for JSON booleans and INTEGER/REAL for numbers.
fn to_sql(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn merge_in(conn: &Connection, collection: &str, id: &str, fields: &Fields) -> Result<(), StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ? AND id = ?",
            (collection, id),
            |r| r.get(0),
        )
        .optional()?;
    let Some(body) = body else {
        return Err(StoreError::Missing {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    };
    let mut current: Fields = serde_json::from_str(&body)?;
    for (k, v) in fields {
        current.insert(k.clone(), v.clone());
    }
    conn.execute(
        "UPDATE documents SET body = ?, updated_at = ? WHERE collection = ? AND id = ?",
        (serde_json::to_string(&current)?, now_ts(), collection, id),
    )?;
    Ok(())
}

fn delete_in(conn: &Connection, collection: &str, id: &str) -> Result<bool, StoreError> {
    let n = conn.execute(
        "DELETE FROM documents WHERE collection = ? AND id = ?",
        (collection, id),
    )?;
    Ok(n > 0)
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, body, created_at, updated_at
                 FROM documents
                 WHERE collection = ? AND id = ?",
                (collection, id),
                row_to_document,
            )
            .optional()?;
        row.map(decode).transpose()
    }

    fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>, StoreError> {
        let mut sql = String::from(
            "SELECT id, body, created_at, updated_at FROM documents WHERE collection = ?",
        );
        let mut bind: Vec<SqlValue> = vec![SqlValue::Text(collection.to_string())];
        for f in filters {
            bind.push(SqlValue::Text(format!("$.{}", f.field)));
            if f.value.is_null() {
                sql.push_str(" AND json_extract(body, ?) IS NULL");
            } else {
                sql.push_str(" AND json_extract(body, ?) = ?");
                bind.push(to_sql(&f.value));
            }
        }
        sql.push_str(" ORDER BY rowid");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind.iter()), row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode).collect()
    }

    fn insert(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let ts = now_ts();
        self.conn.execute(
            "INSERT INTO documents(collection, id, body, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?)",
            (collection, &id, serde_json::to_string(&fields)?, &ts, &ts),
        )?;
        Ok(id)
    }

    fn merge(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        merge_in(&self.conn, collection, id, &fields)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        delete_in(&self.conn, collection, id)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.len() > self.max_batch_ops {
            return Err(StoreError::BatchTooLarge {
                ops: batch.len(),
                limit: self.max_batch_ops,
            });
        }
        if batch.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        for op in batch.ops() {
            match op {
                WriteOp::Merge {
                    collection,
                    id,
                    fields,
                } => merge_in(&tx, collection, id, fields)?,
                WriteOp::Delete { collection, id } => {
                    delete_in(&tx, collection, id)?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get::<_, i64>(0))?;
        Ok(())
    }
}
