//! Cohort semester provisioning: one admin action fanned out to a shared group record
//! and a semester record on every matching student, committed as a single batch.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::catalog;
use crate::error::{CoreError, CoreResult};
use crate::ids::canonical_group_id;
use crate::model::{decode, encode, Principal, SemesterGroup, StudentSemesterRecord};
use crate::store::{CollectionPath, Document, DocumentStore, WriteMode, WriteOp};
use crate::students;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    /// The one student whose record receives `sgpa`.
    #[serde(default)]
    pub target_student_id: Option<String>,
    pub degree_id: String,
    pub stream_id: String,
    pub batch_id: String,
    pub semester_no: u32,
    pub section: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub labs: Vec<String>,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub sgpa: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionResult {
    pub group_id: String,
    pub students_affected: usize,
}

pub fn get_group(store: &dyn DocumentStore, group_id: &str) -> CoreResult<Option<SemesterGroup>> {
    let path = CollectionPath::groups();
    let Some(doc) = store.get(&path, group_id)? else {
        return Ok(None);
    };
    Ok(Some(decode(&path, group_id, doc)?))
}

pub fn require_group(store: &dyn DocumentStore, group_id: &str) -> CoreResult<SemesterGroup> {
    get_group(store, group_id)?.ok_or_else(|| CoreError::NotFound {
        what: "semester group",
        id: group_id.to_string(),
    })
}

fn validate(req: &ProvisionRequest) -> CoreResult<()> {
    if req.semester_no == 0 {
        return Err(CoreError::InvalidInput("semesterNo must be at least 1".to_string()));
    }
    if req.section.trim().is_empty() {
        return Err(CoreError::InvalidInput("section must not be blank".to_string()));
    }
    if let Some(sgpa) = req.sgpa {
        if !sgpa.is_finite() || !(0.0..=10.0).contains(&sgpa) {
            return Err(CoreError::InvalidInput(format!(
                "sgpa must be between 0 and 10, got {}",
                sgpa
            )));
        }
    }
    Ok(())
}

fn group_fields(req: &ProvisionRequest, group_id: &str, now: &str) -> Document {
    let mut fields = Document::new();
    fields.insert("groupId".into(), json!(group_id));
    fields.insert("degreeId".into(), json!(req.degree_id));
    fields.insert("streamId".into(), json!(req.stream_id));
    fields.insert("batchId".into(), json!(req.batch_id));
    fields.insert("semesterNo".into(), json!(req.semester_no));
    fields.insert("section".into(), json!(req.section));
    fields.insert("subjects".into(), json!(req.subjects));
    fields.insert("labs".into(), json!(req.labs));
    fields.insert("updatedAt".into(), json!(now));
    fields
}

pub fn provision_semester(
    store: &dyn DocumentStore,
    principal: &Principal,
    req: &ProvisionRequest,
) -> CoreResult<ProvisionResult> {
    if let Err(e) = principal.require_admin("semesters.provision") {
        warn!(principal = %principal.id, "provisioning refused");
        return Err(e);
    }
    validate(req)?;

    let names = catalog::resolve_cohort_names(store, &req.degree_id, &req.stream_id, &req.batch_id)?;
    let group_id = canonical_group_id(
        &names.degree,
        &names.stream,
        &names.batch,
        req.semester_no,
        &req.section,
    );

    let cohort = students::cohort_members(store, &req.degree_id, &req.stream_id, &req.batch_id)?;
    if cohort.is_empty() {
        warn!(group_id = %group_id, "no students match cohort, nothing written");
        return Err(CoreError::NoMatchingStudents {
            degree_id: req.degree_id.clone(),
            stream_id: req.stream_id.clone(),
            batch_id: req.batch_id.clone(),
        });
    }
    if req.sgpa.is_some() {
        match req.target_student_id.as_deref() {
            None => {
                return Err(CoreError::InvalidInput(
                    "sgpa requires targetStudentId".to_string(),
                ))
            }
            Some(target) if !cohort.iter().any(|s| s.id == target) => {
                warn!(group_id = %group_id, target = %target, "sgpa target is outside the cohort");
                return Err(CoreError::InvalidInput(format!(
                    "sgpa target {} is not in the cohort",
                    target
                )));
            }
            Some(_) => {}
        }
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut ops = Vec::with_capacity(cohort.len() + 2);
    ops.push(WriteOp::Upsert {
        path: CollectionPath::groups(),
        id: group_id.clone(),
        fields: group_fields(req, &group_id, &now),
        mode: WriteMode::Merge,
    });
    ops.push(WriteOp::ArrayUnion {
        path: CollectionPath::groups(),
        id: group_id.clone(),
        field: "students".to_string(),
        values: cohort.iter().map(|s| Value::String(s.id.clone())).collect(),
    });
    for student in &cohort {
        let is_target = req.target_student_id.as_deref() == Some(student.id.as_str());
        let record = StudentSemesterRecord {
            semester_no: req.semester_no,
            section: req.section.clone(),
            subjects: req.subjects.clone(),
            labs: req.labs.clone(),
            room: req.room.clone(),
            sgpa: if is_target { req.sgpa } else { None },
            group_id: group_id.clone(),
            updated_at: Some(now.clone()),
        };
        ops.push(WriteOp::Upsert {
            path: CollectionPath::student_semesters(&student.id),
            id: req.semester_no.to_string(),
            fields: encode(&record)?,
            mode: WriteMode::Merge,
        });
    }

    let op_count = ops.len();
    store.run_atomic_batch(ops).map_err(|source| {
        warn!(group_id = %group_id, ops = op_count, error = %source, "provisioning batch rejected");
        CoreError::AtomicCommitFailure { source }
    })?;

    info!(
        group_id = %group_id,
        students = cohort.len(),
        semester = req.semester_no,
        "semester provisioned"
    );
    Ok(ProvisionResult {
        group_id,
        students_affected: cohort.len(),
    })
}
