//! Document store: string-keyed JSON documents per collection.
//!
//! Relationships are `DocRef` fields inside the bodies; there are no joins and
//! no referential integrity. Every write bumps a per-document version, which is
//! what `compare_and_set` checks.

use chrono::Utc;
use model::Collection;
use rusqlite::{params, types::Value as SqlValue, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{collection}/{id} not found")]
    NotFound { collection: Collection, id: String },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("{collection}/{id} kept changing underneath us ({attempts} attempts)")]
    Contention { collection: Collection, id: String, attempts: u32 },
    #[error("store lock poisoned")]
    Poisoned,
}

/// A stored body with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub id:      String,
    pub version: u64,
    pub body:    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl QueryOp {
    fn sql(&self) -> &'static str {
        match self {
            QueryOp::Eq => "=",
            QueryOp::Ne => "!=",
            QueryOp::Lt => "<",
            QueryOp::Le => "<=",
            QueryOp::Gt => ">",
            QueryOp::Ge => ">=",
        }
    }
}

impl fmt::Display for QueryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryOp::Eq => "==",
            other => other.sql(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// Written; carries the new version.
    Applied(u64),
    /// The document moved on (or appeared) since it was read.
    Conflict,
}

pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Versioned>, StoreError>;

    /// Full replace (or insert). Returns the new version.
    fn set(&self, collection: Collection, id: &str, body: &Value) -> Result<u64, StoreError>;

    /// Shallow merge of `partial`'s top-level keys into an existing object.
    fn update(&self, collection: Collection, id: &str, partial: &Value) -> Result<u64, StoreError>;

    /// `field` may be a dotted path, e.g. `club_ref.id`.
    fn query(&self, collection: Collection, field: &str, op: QueryOp, value: &Value) -> Result<Vec<Versioned>, StoreError>;

    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    /// `expected = None` means "must not exist yet".
    fn compare_and_set(
        &self,
        collection: Collection,
        id: &str,
        expected: Option<u64>,
        body: &Value,
    ) -> Result<CasOutcome, StoreError>;

    fn all(&self, collection: Collection) -> Result<Vec<Versioned>, StoreError>;

    fn count(&self, collection: Collection) -> Result<u64, StoreError>;
}

// ── Typed helpers ────────────────────────────────────────────────────────────

pub fn load<T, S>(store: &S, collection: Collection, id: &str) -> Result<Option<(T, u64)>, StoreError>
where
    T: DeserializeOwned,
    S: DocumentStore + ?Sized,
{
    match store.get(collection, id)? {
        Some(v) => Ok(Some((serde_json::from_value(v.body)?, v.version))),
        None => Ok(None),
    }
}

pub fn exists<S: DocumentStore + ?Sized>(store: &S, collection: Collection, id: &str) -> Result<bool, StoreError> {
    Ok(store.get(collection, id)?.is_some())
}

pub fn query_as<T, S>(
    store: &S,
    collection: Collection,
    field: &str,
    op: QueryOp,
    value: &Value,
) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
    S: DocumentStore + ?Sized,
{
    store
        .query(collection, field, op, value)?
        .into_iter()
        .map(|v| serde_json::from_value(v.body).map_err(StoreError::from))
        .collect()
}

pub fn save<T: Serialize, S: DocumentStore + ?Sized>(
    store: &S,
    collection: Collection,
    id: &str,
    doc: &T,
) -> Result<u64, StoreError> {
    store.set(collection, id, &serde_json::to_value(doc)?)
}

// ── SQLite ───────────────────────────────────────────────────────────────────

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_updated ON documents(collection, updated_at);
        "#,
    )?;
    Ok(())
}

fn read_one(conn: &Connection, collection: Collection, id: &str) -> Result<Option<Versioned>, StoreError> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT body, version FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    match row {
        Some((body, version)) => Ok(Some(Versioned {
            id:      id.to_string(),
            version: version as u64,
            body:    serde_json::from_str(&body)?,
        })),
        None => Ok(None),
    }
}

fn upsert(conn: &Connection, collection: Collection, id: &str, body: &Value) -> Result<u64, StoreError> {
    let version: i64 = conn.query_row(
        r#"
        INSERT INTO documents (collection, id, body, version, updated_at)
        VALUES (?1, ?2, ?3, 1, ?4)
        ON CONFLICT(collection, id) DO UPDATE SET
            body = excluded.body,
            version = documents.version + 1,
            updated_at = excluded.updated_at
        RETURNING version
        "#,
        params![collection.as_str(), id, serde_json::to_string(body)?, Utc::now().to_rfc3339()],
        |r| r.get(0),
    )?;
    Ok(version as u64)
}

/// `club_ref.id` -> `$.club_ref.id`
fn json_path(field: &str) -> Result<String, StoreError> {
    let ok = !field.is_empty()
        && field
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if !ok {
        return Err(StoreError::InvalidQuery(format!("bad field path {field:?}")));
    }
    Ok(format!("$.{field}"))
}

/// JSON scalar -> the SQL value `json_extract` would produce for it.
fn sql_scalar(value: &Value) -> Result<SqlValue, StoreError> {
    match value {
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => n
                .as_f64()
                .map(SqlValue::Real)
                .ok_or_else(|| StoreError::InvalidQuery(format!("unsupported number {n}"))),
        },
        Value::Null => Ok(SqlValue::Null),
        Value::Array(_) | Value::Object(_) => {
            Err(StoreError::InvalidQuery("only scalar values can be compared".into()))
        }
    }
}

fn collect_rows(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Versioned>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?)))?;
    let mut out = Vec::new();
    for row in rows {
        let (id, body, version) = row?;
        out.push(Versioned { id, version: version as u64, body: serde_json::from_str(&body)? });
    }
    Ok(out)
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Versioned>, StoreError> {
        read_one(&*self.conn()?, collection, id)
    }

    fn set(&self, collection: Collection, id: &str, body: &Value) -> Result<u64, StoreError> {
        upsert(&*self.conn()?, collection, id, body)
    }

    fn update(&self, collection: Collection, id: &str, partial: &Value) -> Result<u64, StoreError> {
        let Value::Object(patch) = partial else {
            return Err(StoreError::InvalidQuery("update expects a JSON object".into()));
        };
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current = read_one(&tx, collection, id)?
            .ok_or_else(|| StoreError::NotFound { collection, id: id.to_string() })?;
        let mut merged: Map<String, Value> = match current.body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (k, v) in patch {
            merged.insert(k.clone(), v.clone());
        }
        let version = upsert(&tx, collection, id, &Value::Object(merged))?;
        tx.commit()?;
        Ok(version)
    }

    fn query(&self, collection: Collection, field: &str, op: QueryOp, value: &Value) -> Result<Vec<Versioned>, StoreError> {
        let path = json_path(field)?;
        let conn = self.conn()?;
        if value.is_null() {
            let test = match op {
                QueryOp::Eq => "IS NULL",
                QueryOp::Ne => "IS NOT NULL",
                _ => return Err(StoreError::InvalidQuery(format!("{op} against null"))),
            };
            let sql = format!(
                "SELECT id, body, version FROM documents WHERE collection = ?1 AND json_extract(body, ?2) {test} ORDER BY id"
            );
            return collect_rows(&conn, &sql, &[&collection.as_str(), &path]);
        }
        let scalar = sql_scalar(value)?;
        let sql = format!(
            "SELECT id, body, version FROM documents WHERE collection = ?1 AND json_extract(body, ?2) {} ?3 ORDER BY id",
            op.sql()
        );
        collect_rows(&conn, &sql, &[&collection.as_str(), &path, &scalar])
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let n = self.conn()?.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
        )?;
        Ok(n > 0)
    }

    fn compare_and_set(
        &self,
        collection: Collection,
        id: &str,
        expected: Option<u64>,
        body: &Value,
    ) -> Result<CasOutcome, StoreError> {
        let conn = self.conn()?;
        let text = serde_json::to_string(body)?;
        let now = Utc::now().to_rfc3339();
        match expected {
            None => {
                let n = conn.execute(
                    r#"
                    INSERT INTO documents (collection, id, body, version, updated_at)
                    VALUES (?1, ?2, ?3, 1, ?4)
                    ON CONFLICT(collection, id) DO NOTHING
                    "#,
                    params![collection.as_str(), id, text, now],
                )?;
                Ok(if n == 1 { CasOutcome::Applied(1) } else { CasOutcome::Conflict })
            }
            Some(version) => {
                let n = conn.execute(
                    r#"
                    UPDATE documents SET body = ?3, version = version + 1, updated_at = ?4
                    WHERE collection = ?1 AND id = ?2 AND version = ?5
                    "#,
                    params![collection.as_str(), id, text, now, version as i64],
                )?;
                Ok(if n == 1 { CasOutcome::Applied(version + 1) } else { CasOutcome::Conflict })
            }
        }
    }

    fn all(&self, collection: Collection) -> Result<Vec<Versioned>, StoreError> {
        let conn = self.conn()?;
        collect_rows(
            &conn,
            "SELECT id, body, version FROM documents WHERE collection = ?1 ORDER BY id",
            &[&collection.as_str()],
        )
    }

    fn count(&self, collection: Collection) -> Result<u64, StoreError> {
        let n: i64 = self.conn()?.query_row(
            "SELECT COUNT(1) FROM documents WHERE collection = ?1",
            params![collection.as_str()],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }
}
