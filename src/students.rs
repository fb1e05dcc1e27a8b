use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{decode, encode, Principal, StudentProfile, StudentSemesterRecord};
use crate::store::{
    CollectionPath, Document, DocumentStore, Filter, StoreError, WriteMode, WriteOp,
};

pub fn get_student(store: &dyn DocumentStore, id: &str) -> CoreResult<Option<StudentProfile>> {
    let Some(doc) = store.get(&CollectionPath::students(), id)? else {
        return Ok(None);
    };
    Ok(Some(StudentProfile::from_document(id, doc)?))
}

/// Students whose placement matches every provided filter, ordered by id.
pub fn list_students(
    store: &dyn DocumentStore,
    degree_id: Option<&str>,
    stream_id: Option<&str>,
    batch_id: Option<&str>,
) -> CoreResult<Vec<StudentProfile>> {
    let mut filters = Vec::new();
    for (field, value) in [
        ("degreeId", degree_id),
        ("streamId", stream_id),
        ("batchId", batch_id),
    ] {
        if let Some(v) = value {
            filters.push(Filter::eq(field, v));
        }
    }
    let rows = store.query(&CollectionPath::students(), &filters)?;
    rows.into_iter()
        .map(|(id, doc)| StudentProfile::from_document(&id, doc).map_err(CoreError::from))
        .collect()
}

/// Cohort membership at this moment: all students on the exact (degree, stream, batch).
pub fn cohort_members(
    store: &dyn DocumentStore,
    degree_id: &str,
    stream_id: &str,
    batch_id: &str,
) -> CoreResult<Vec<StudentProfile>> {
    list_students(store, Some(degree_id), Some(stream_id), Some(batch_id))
}

/// Admin write of a full profile, placement fields included.
pub fn upsert_student(
    store: &dyn DocumentStore,
    principal: &Principal,
    mut profile: StudentProfile,
) -> CoreResult<StudentProfile> {
    principal.require_admin("students.upsert")?;
    if profile.name.trim().is_empty() {
        return Err(CoreError::InvalidInput("student name must not be blank".to_string()));
    }
    for (field, v) in [
        ("degreeId", &profile.degree_id),
        ("streamId", &profile.stream_id),
        ("batchId", &profile.batch_id),
    ] {
        if v.trim().is_empty() {
            return Err(CoreError::InvalidInput(format!("{} must not be blank", field)));
        }
    }
    if profile.id.trim().is_empty() {
        profile.id = Uuid::new_v4().to_string();
    }
    store.upsert(
        &CollectionPath::students(),
        &profile.id,
        encode(&profile)?,
        WriteMode::Merge,
    )?;
    info!(student_id = %profile.id, "student profile saved");
    Ok(profile)
}

/// Self-service edit of contact fields. Placement fields are never touched here.
pub fn update_contact(
    store: &dyn DocumentStore,
    principal: &Principal,
    student_id: &str,
    name: Option<&str>,
    email: Option<&str>,
) -> CoreResult<StudentProfile> {
    principal.require_self_or_staff(student_id, "students.updateContact")?;
    let mut patch = Document::new();
    if let Some(n) = name {
        if n.trim().is_empty() {
            return Err(CoreError::InvalidInput("student name must not be blank".to_string()));
        }
        patch.insert("name".to_string(), json!(n));
    }
    if let Some(e) = email {
        let v = if e.trim().is_empty() { Value::Null } else { json!(e.trim()) };
        patch.insert("email".to_string(), v);
    }
    store
        .run_atomic_batch(vec![WriteOp::Update {
            path: CollectionPath::students(),
            id: student_id.to_string(),
            fields: patch,
        }])
        .map_err(|e| match e {
            StoreError::NotFound { .. } => CoreError::NotFound {
                what: "student",
                id: student_id.to_string(),
            },
            other => other.into(),
        })?;
    get_student(store, student_id)?.ok_or_else(|| CoreError::NotFound {
        what: "student",
        id: student_id.to_string(),
    })
}

/// All semester records of one student, ordered by semester number.
pub fn semester_records(
    store: &dyn DocumentStore,
    student_id: &str,
) -> CoreResult<Vec<StudentSemesterRecord>> {
    let path = CollectionPath::student_semesters(student_id);
    let rows = store.query(&path, &[])?;
    let mut out = rows
        .into_iter()
        .map(|(id, doc)| decode::<StudentSemesterRecord>(&path, &id, doc))
        .collect::<Result<Vec<_>, _>>()?;
    out.sort_by_key(|r| r.semester_no);
    Ok(out)
}
