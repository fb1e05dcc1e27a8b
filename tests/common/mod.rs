#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use studenthub::catalog;
use studenthub::model::{CatalogKind, Principal, Role, StudentProfile};
use studenthub::provision::ProvisionRequest;
use studenthub::store::{
    CollectionPath, Document, DocumentStore, Filter, SqliteStore, StoreError, StoreResult,
    WriteOp,
};
use studenthub::students;

/// SQLite-backed store that can be told to fail specific calls.
pub struct FaultyStore {
    pub inner: SqliteStore,
    pub get_many_sizes: RefCell<Vec<usize>>,
    /// 1-based `get_many` call that fails with a transient error.
    pub fail_get_many_call: Cell<Option<usize>>,
    /// 1-based op index that gets swapped for a write the backend rejects.
    pub poison_batch_op: Cell<Option<usize>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().expect("in-memory store"),
            get_many_sizes: RefCell::new(Vec::new()),
            fail_get_many_call: Cell::new(None),
            poison_batch_op: Cell::new(None),
        }
    }
}

impl DocumentStore for FaultyStore {
    fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Document>> {
        self.inner.get(path, id)
    }

    fn get_many(&self, path: &CollectionPath, ids: &[String]) -> StoreResult<Vec<(String, Document)>> {
        self.get_many_sizes.borrow_mut().push(ids.len());
        let call = self.get_many_sizes.borrow().len();
        if self.fail_get_many_call.get() == Some(call) {
            return Err(StoreError::Unavailable("injected network fault".to_string()));
        }
        self.inner.get_many(path, ids)
    }

    fn query(&self, path: &CollectionPath, filters: &[Filter]) -> StoreResult<Vec<(String, Document)>> {
        self.inner.query(path, filters)
    }

    fn run_atomic_batch(&self, mut ops: Vec<WriteOp>) -> StoreResult<()> {
        if let Some(n) = self.poison_batch_op.get() {
            if n >= 1 && n <= ops.len() {
                // An update of a document that does not exist is rejected mid-transaction.
                ops[n - 1] = WriteOp::Update {
                    path: CollectionPath::new("faults"),
                    id: "injected".to_string(),
                    fields: Document::new(),
                };
            }
        }
        self.inner.run_atomic_batch(ops)
    }
}

pub fn admin() -> Principal {
    Principal::new("admin-1", Role::Admin)
}

pub fn teacher() -> Principal {
    Principal::new("teacher-1", Role::Teacher)
}

pub fn seed_catalog(store: &dyn DocumentStore) {
    let a = admin();
    catalog::upsert_entry(store, &a, CatalogKind::Degree, Some("d1"), "B.Tech", None)
        .expect("degree");
    catalog::upsert_entry(
        store,
        &a,
        CatalogKind::Stream,
        Some("s1"),
        "Computer Science",
        Some("d1"),
    )
    .expect("stream");
    catalog::upsert_entry(store, &a, CatalogKind::Batch, Some("b1"), "2022-26", None)
        .expect("batch");
    catalog::upsert_entry(store, &a, CatalogKind::Batch, Some("b2"), "2023-27", None)
        .expect("batch");
}

pub fn seed_student(store: &dyn DocumentStore, id: &str, name: &str, batch_id: &str) {
    students::upsert_student(
        store,
        &admin(),
        StudentProfile {
            id: id.to_string(),
            name: name.to_string(),
            reg_no: format!("REG-{}", id),
            email: None,
            degree_id: "d1".to_string(),
            stream_id: "s1".to_string(),
            batch_id: batch_id.to_string(),
        },
    )
    .expect("seed student");
}

/// Catalog plus `n` students `st01..` in batch b1.
pub fn seed_cohort(store: &dyn DocumentStore, n: usize) -> Vec<String> {
    seed_catalog(store);
    (1..=n)
        .map(|i| {
            let id = format!("st{:02}", i);
            seed_student(store, &id, &format!("Student {:02}", i), "b1");
            id
        })
        .collect()
}

pub fn provision_request(semester_no: u32) -> ProvisionRequest {
    ProvisionRequest {
        target_student_id: None,
        degree_id: "d1".to_string(),
        stream_id: "s1".to_string(),
        batch_id: "b1".to_string(),
        semester_no,
        section: "A".to_string(),
        subjects: vec!["Maths".to_string(), "Physics".to_string()],
        labs: vec!["Physics Lab".to_string()],
        room: "R-101".to_string(),
        sgpa: None,
    }
}

pub fn count_docs(store: &dyn DocumentStore, path: &CollectionPath) -> usize {
    store.query(path, &[]).expect("query").len()
}
