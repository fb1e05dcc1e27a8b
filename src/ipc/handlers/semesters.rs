use crate::error::CoreError;
use crate::grades;
use crate::ipc::helpers::{get_list_field, get_optional_str, get_required_str, with_store, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::provision::{self, ProvisionRequest};
use crate::store::StoreError;
use serde_json::json;

fn parse_provision_request(params: &serde_json::Value) -> Result<ProvisionRequest, HandlerErr> {
    let semester_no = params
        .get("semesterNo")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing semesterNo"))?;
    let semester_no = u32::try_from(semester_no)
        .map_err(|_| HandlerErr::bad_params("semesterNo out of range"))?;
    let sgpa = match params.get("sgpa") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| HandlerErr::bad_params("sgpa must be a number or null"))?,
        ),
    };
    Ok(ProvisionRequest {
        target_student_id: get_optional_str(params, "targetStudentId").map(|s| s.to_string()),
        degree_id: get_required_str(params, "degreeId")?,
        stream_id: get_required_str(params, "streamId")?,
        batch_id: get_required_str(params, "batchId")?,
        semester_no,
        section: get_required_str(params, "section")?,
        subjects: get_list_field(params, "subjects")?,
        labs: get_list_field(params, "labs")?,
        room: get_optional_str(params, "room").unwrap_or("").trim().to_string(),
        sgpa,
    })
}

fn handle_semesters_provision(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        let request = parse_provision_request(&req.params)?;
        let result = provision::provision_semester(store, principal, &request)?;
        Ok(json!({
            "groupId": result.group_id,
            "studentsAffected": result.students_affected
        }))
    })
}

fn handle_semesters_group_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        principal.require_staff("semesters.groupOpen")?;
        let group_id = get_required_str(&req.params, "groupId")?;
        let group = provision::require_group(store, &group_id)?;
        serde_json::to_value(&group).map_err(|e| HandlerErr::from(CoreError::from(StoreError::from(e))))
    })
}

fn handle_results_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        let student_id = get_required_str(&req.params, "studentId")?;
        let results = grades::student_results(store, principal, &student_id)?;
        let semesters: Vec<serde_json::Value> = results
            .semesters
            .iter()
            .map(|r| {
                json!({
                    "semesterNo": r.semester_no,
                    "section": r.section,
                    "groupId": r.group_id,
                    "subjects": r.subjects,
                    "labs": r.labs,
                    "room": r.room,
                    "sgpa": r.sgpa
                })
            })
            .collect();
        Ok(json!({
            "studentId": results.student_id,
            "semesters": semesters,
            "cgpa": results.cgpa
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "semesters.provision" => Some(handle_semesters_provision(state, req)),
        "semesters.groupOpen" => Some(handle_semesters_group_open(state, req)),
        "results.student" => Some(handle_results_student(state, req)),
        _ => None,
    }
}
