//! Document-store boundary.
//!
//! The core only talks to storage through [`DocumentStore`]: point reads, small id-list
//! reads, filtered queries and all-or-nothing write batches. Documents are open JSON
//! objects here; typed decoding happens in [`crate::model`].

mod sqlite;

pub use sqlite::SqliteStore;

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub type Document = Map<String, Value>;

/// Largest id list accepted by a single [`DocumentStore::get_many`] call.
pub const MAX_IN_QUERY: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn students() -> Self {
        Self::new("students")
    }

    pub fn student_semesters(student_id: &str) -> Self {
        Self(format!("students/{}/semesters", student_id))
    }

    pub fn groups() -> Self {
        Self::new("semesterGroups")
    }

    pub fn group_attendance(group_id: &str) -> Self {
        Self(format!("semesterGroups/{}/attendance", group_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Top-level fields in the patch overwrite, all other stored fields survive.
    Merge,
    Replace,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Upsert {
        path: CollectionPath,
        id: String,
        fields: Document,
        mode: WriteMode,
    },
    /// Merge into an existing document; fails with [`StoreError::NotFound`] when absent.
    Update {
        path: CollectionPath,
        id: String,
        fields: Document,
    },
    /// Set-union `values` into the array at `field`, creating the document if needed.
    ArrayUnion {
        path: CollectionPath,
        id: String,
        field: String,
        values: Vec<Value>,
    },
}

impl WriteOp {
    pub fn target(&self) -> (&CollectionPath, &str) {
        match self {
            WriteOp::Upsert { path, id, .. }
            | WriteOp::Update { path, id, .. }
            | WriteOp::ArrayUnion { path, id, .. } => (path, id.as_str()),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document {path}/{id} not found")]
    NotFound { path: String, id: String },

    #[error("id-list query of {len} ids exceeds the limit of {max}")]
    InQueryTooLarge { len: usize, max: usize },

    #[error("malformed document {path}/{id}: {reason}")]
    Malformed {
        path: String,
        id: String,
        reason: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait DocumentStore {
    fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Document>>;

    /// Fetch by id list. Missing ids are omitted from the result.
    fn get_many(&self, path: &CollectionPath, ids: &[String])
        -> StoreResult<Vec<(String, Document)>>;

    /// All documents of `path` matching every filter, ordered by id.
    fn query(&self, path: &CollectionPath, filters: &[Filter])
        -> StoreResult<Vec<(String, Document)>>;

    fn run_atomic_batch(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

    fn upsert(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Document,
        mode: WriteMode,
    ) -> StoreResult<()> {
        self.run_atomic_batch(vec![WriteOp::Upsert {
            path: path.clone(),
            id: id.to_string(),
            fields,
            mode,
        }])
    }
}

/// Applies one write to the current state of its target document and returns the new body.
pub fn apply_write(existing: Option<Document>, op: WriteOp) -> StoreResult<Document> {
    match op {
        WriteOp::Upsert { fields, mode, .. } => match (mode, existing) {
            (WriteMode::Merge, Some(mut doc)) => {
                merge_fields(&mut doc, fields);
                Ok(doc)
            }
            _ => Ok(fields),
        },
        WriteOp::Update { path, id, fields } => {
            let Some(mut doc) = existing else {
                return Err(StoreError::NotFound {
                    path: path.to_string(),
                    id,
                });
            };
            merge_fields(&mut doc, fields);
            Ok(doc)
        }
        WriteOp::ArrayUnion {
            path,
            id,
            field,
            values,
        } => {
            let mut doc = existing.unwrap_or_default();
            let slot = doc
                .entry(field.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let Some(items) = slot.as_array_mut() else {
                return Err(StoreError::Malformed {
                    path: path.to_string(),
                    id,
                    reason: format!("field {} is not an array", field),
                });
            };
            for v in values {
                if !items.contains(&v) {
                    items.push(v);
                }
            }
            Ok(doc)
        }
    }
}

fn merge_fields(base: &mut Document, patch: Document) {
    for (k, v) in patch {
        base.insert(k, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn merge_upsert_keeps_untouched_fields() {
        let op = WriteOp::Upsert {
            path: CollectionPath::groups(),
            id: "g".into(),
            fields: doc(json!({ "subjects": ["Maths"] })),
            mode: WriteMode::Merge,
        };
        let out = apply_write(Some(doc(json!({ "students": ["s1"], "subjects": [] }))), op)
            .expect("apply");
        assert_eq!(out.get("students"), Some(&json!(["s1"])));
        assert_eq!(out.get("subjects"), Some(&json!(["Maths"])));
    }

    #[test]
    fn replace_upsert_drops_old_fields() {
        let op = WriteOp::Upsert {
            path: CollectionPath::groups(),
            id: "g".into(),
            fields: doc(json!({ "a": 1 })),
            mode: WriteMode::Replace,
        };
        let out = apply_write(Some(doc(json!({ "b": 2 }))), op).expect("apply");
        assert_eq!(Value::Object(out), json!({ "a": 1 }));
    }

    #[test]
    fn update_requires_existing_document() {
        let op = WriteOp::Update {
            path: CollectionPath::students(),
            id: "missing".into(),
            fields: Document::new(),
        };
        assert!(matches!(
            apply_write(None, op),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn array_union_has_set_semantics() {
        let op = WriteOp::ArrayUnion {
            path: CollectionPath::groups(),
            id: "g".into(),
            field: "students".into(),
            values: vec![json!("s1"), json!("s2"), json!("s2")],
        };
        let out = apply_write(Some(doc(json!({ "students": ["s1"] }))), op).expect("apply");
        assert_eq!(out.get("students"), Some(&json!(["s1", "s2"])));
    }
}
