use rusqlite::{params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

use super::{
    apply_write, CollectionPath, Document, DocumentStore, Filter, StoreError, StoreResult,
    WriteOp, MAX_IN_QUERY,
};
use crate::db;

/// Documents kept as JSON bodies in a single `documents(collection, id)` table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> anyhow::Result<Self> {
        db::ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_db(workspace)?,
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn parse_body(path: &CollectionPath, id: &str, body: &str) -> StoreResult<Document> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Malformed {
            path: path.to_string(),
            id: id.to_string(),
            reason: "stored body is not an object".to_string(),
        }),
    }
}

fn to_sql_value(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn load(conn: &Connection, path: &CollectionPath, id: &str) -> StoreResult<Option<Document>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ? AND id = ?",
            (path.as_str(), id),
            |r| r.get(0),
        )
        .optional()?;
    body.map(|b| parse_body(path, id, &b)).transpose()
}

fn collect_rows(
    conn: &Connection,
    path: &CollectionPath,
    sql: &str,
    args: Vec<SqlValue>,
) -> StoreResult<Vec<(String, Document)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    rows.into_iter()
        .map(|(id, body)| {
            let doc = parse_body(path, &id, &body)?;
            Ok((id, doc))
        })
        .collect()
}

impl DocumentStore for SqliteStore {
    fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Document>> {
        load(&self.conn, path, id)
    }

    fn get_many(
        &self,
        path: &CollectionPath,
        ids: &[String],
    ) -> StoreResult<Vec<(String, Document)>> {
        if ids.len() > MAX_IN_QUERY {
            return Err(StoreError::InQueryTooLarge {
                len: ids.len(),
                max: MAX_IN_QUERY,
            });
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, body FROM documents WHERE collection = ? AND id IN ({}) ORDER BY id",
            placeholders
        );
        let mut args = vec![SqlValue::Text(path.to_string())];
        args.extend(ids.iter().map(|id| SqlValue::Text(id.clone())));
        collect_rows(&self.conn, path, &sql, args)
    }

    fn query(
        &self,
        path: &CollectionPath,
        filters: &[Filter],
    ) -> StoreResult<Vec<(String, Document)>> {
        let mut sql = String::from("SELECT id, body FROM documents WHERE collection = ?");
        let mut args = vec![SqlValue::Text(path.to_string())];
        for f in filters {
            let (field, op, value) = match f {
                Filter::Eq(field, value) => (field, "=", value),
                Filter::Gte(field, value) => (field, ">=", value),
                Filter::Lte(field, value) => (field, "<=", value),
            };
            args.push(SqlValue::Text(format!("$.{}", field)));
            if value.is_null() && op == "=" {
                sql.push_str(" AND json_extract(body, ?) IS NULL");
            } else {
                sql.push_str(&format!(" AND json_extract(body, ?) {} ?", op));
                args.push(to_sql_value(value));
            }
        }
        sql.push_str(" ORDER BY id");
        collect_rows(&self.conn, path, &sql, args)
    }

    fn run_atomic_batch(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        // Dropping the transaction on an early return rolls every prior op back.
        let tx = self.conn.unchecked_transaction()?;
        for op in ops {
            let (path, id) = op.target();
            let (path, id) = (path.clone(), id.to_string());
            let existing = load(&tx, &path, &id)?;
            let body = apply_write(existing, op)?;
            tx.execute(
                "INSERT INTO documents(collection, id, body, updated_at)
                 VALUES(?, ?, ?, ?)
                 ON CONFLICT(collection, id) DO UPDATE SET
                   body = excluded.body,
                   updated_at = excluded.updated_at",
                (
                    path.as_str(),
                    &id,
                    serde_json::to_string(&Value::Object(body))?,
                    &now,
                ),
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
