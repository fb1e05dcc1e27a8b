use crate::error::CoreError;
use crate::ipc::helpers::{get_optional_str, get_required_str, with_store, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentProfile;
use crate::students;
use serde_json::json;

fn profile_json(p: &StudentProfile) -> serde_json::Value {
    json!({
        "id": p.id,
        "name": p.name,
        "regNo": p.reg_no,
        "email": p.email,
        "degreeId": p.degree_id,
        "streamId": p.stream_id,
        "batchId": p.batch_id
    })
}

fn handle_students_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        let p = &req.params;
        let profile = StudentProfile {
            id: get_optional_str(p, "studentId").unwrap_or("").to_string(),
            name: get_required_str(p, "name")?,
            reg_no: get_optional_str(p, "regNo").unwrap_or("").to_string(),
            email: get_optional_str(p, "email").map(|s| s.to_string()),
            degree_id: get_required_str(p, "degreeId")?,
            stream_id: get_required_str(p, "streamId")?,
            batch_id: get_required_str(p, "batchId")?,
        };
        let saved = students::upsert_student(store, principal, profile)?;
        Ok(json!({ "studentId": saved.id }))
    })
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        let student_id = get_required_str(&req.params, "studentId")?;
        principal.require_self_or_staff(&student_id, "students.get")?;
        let Some(profile) = students::get_student(store, &student_id)? else {
            return Err(CoreError::NotFound {
                what: "student",
                id: student_id,
            }
            .into());
        };
        Ok(profile_json(&profile))
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        principal.require_staff("students.list")?;
        let p = &req.params;
        let rows = students::list_students(
            store,
            get_optional_str(p, "degreeId"),
            get_optional_str(p, "streamId"),
            get_optional_str(p, "batchId"),
        )?;
        let students_json: Vec<serde_json::Value> = rows.iter().map(profile_json).collect();
        Ok(json!({ "students": students_json }))
    })
}

fn handle_students_update_contact(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        let p = &req.params;
        let student_id = get_required_str(p, "studentId")?;
        let name = get_optional_str(p, "name");
        let email = get_optional_str(p, "email");
        if name.is_none() && email.is_none() {
            return Err(HandlerErr::bad_params("nothing to update: pass name and/or email"));
        }
        let profile = students::update_contact(store, principal, &student_id, name, email)?;
        Ok(profile_json(&profile))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.upsert" => Some(handle_students_upsert(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.updateContact" => Some(handle_students_update_contact(state, req)),
        _ => None,
    }
}
