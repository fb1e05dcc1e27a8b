use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::model::{Principal, StudentSemesterRecord};
use crate::store::DocumentStore;
use crate::students;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResults {
    pub student_id: String,
    pub semesters: Vec<StudentSemesterRecord>,
    pub cgpa: Option<f64>,
}

/// Plain mean of the semesters that have an SGPA; `None` when none do.
pub fn cgpa(records: &[StudentSemesterRecord]) -> Option<f64> {
    let graded: Vec<f64> = records.iter().filter_map(|r| r.sgpa).collect();
    if graded.is_empty() {
        return None;
    }
    Some(graded.iter().sum::<f64>() / graded.len() as f64)
}

pub fn student_results(
    store: &dyn DocumentStore,
    principal: &Principal,
    student_id: &str,
) -> CoreResult<StudentResults> {
    principal.require_self_or_staff(student_id, "results.student")?;
    if students::get_student(store, student_id)?.is_none() {
        return Err(CoreError::NotFound {
            what: "student",
            id: student_id.to_string(),
        });
    }
    let semesters = students::semester_records(store, student_id)?;
    Ok(StudentResults {
        student_id: student_id.to_string(),
        cgpa: cgpa(&semesters),
        semesters,
    })
}
