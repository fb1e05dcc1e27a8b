use crate::attendance::{self, round_percentage};
use crate::ipc::handlers::setup::{fetch_chunk_size, percent_decimals};
use crate::ipc::helpers::{get_list_field, get_optional_str, get_required_str, with_store};
use crate::ipc::types::{AppState, Request};
use crate::provision;
use serde_json::json;

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        let p = &req.params;
        let group_id = get_required_str(p, "groupId")?;
        let date = get_required_str(p, "date")?;
        let subject = get_optional_str(p, "subject").unwrap_or("").trim().to_string();
        let present = get_list_field(p, "presentIds")?;
        let session =
            attendance::mark_attendance(store, principal, &group_id, &date, &subject, &present)?;
        Ok(json!({
            "date": session.date,
            "subject": session.subject,
            "presentCount": session.present.len(),
            "absentCount": session.absent.len()
        }))
    })
}

fn handle_attendance_group_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let chunk_size = fetch_chunk_size(state);
    let decimals = percent_decimals(state);
    with_store(state, req, |store, principal| {
        let group_id = get_required_str(&req.params, "groupId")?;
        let mut student_ids = get_list_field(&req.params, "studentIds")?;
        if student_ids.is_empty() {
            principal.require_staff("attendance.groupSummary")?;
            student_ids = provision::require_group(store, &group_id)?.students;
        }
        let rows =
            attendance::compute_attendance(store, principal, &group_id, &student_ids, chunk_size)?;
        let rows_json: Vec<serde_json::Value> = rows
            .iter()
            .map(|r| {
                json!({
                    "studentId": r.student_id,
                    "displayName": r.display_name,
                    "attended": r.attended,
                    "total": r.total,
                    "percentage": round_percentage(r.percentage, decimals)
                })
            })
            .collect();
        Ok(json!({ "groupId": group_id, "rows": rows_json }))
    })
}

fn handle_attendance_student_overall(state: &mut AppState, req: &Request) -> serde_json::Value {
    let decimals = percent_decimals(state);
    with_store(state, req, |store, principal| {
        let student_id = get_required_str(&req.params, "studentId")?;
        let overall = attendance::student_overall(store, principal, &student_id)?;
        let semesters: Vec<serde_json::Value> = overall
            .semesters
            .iter()
            .map(|s| {
                json!({
                    "semesterNo": s.semester_no,
                    "groupId": s.group_id,
                    "attended": s.attended,
                    "total": s.total,
                    "percentage": round_percentage(s.percentage, decimals)
                })
            })
            .collect();
        Ok(json!({
            "studentId": overall.student_id,
            "attended": overall.attended,
            "total": overall.total,
            "percentage": round_percentage(overall.percentage, decimals),
            "semesters": semesters
        }))
    })
}

fn handle_attendance_sessions(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store, principal| {
        principal.require_staff("attendance.sessions")?;
        let p = &req.params;
        let group_id = get_required_str(p, "groupId")?;
        let sessions = attendance::list_sessions(
            store,
            &group_id,
            get_optional_str(p, "from"),
            get_optional_str(p, "to"),
        )?;
        let sessions_json: Vec<serde_json::Value> = sessions
            .iter()
            .map(|s| {
                json!({
                    "date": s.date,
                    "subject": s.subject,
                    "present": s.present,
                    "absent": s.absent,
                    "markedBy": s.marked_by,
                    "timestamp": s.timestamp
                })
            })
            .collect();
        Ok(json!({ "groupId": group_id, "sessions": sessions_json }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "attendance.groupSummary" => Some(handle_attendance_group_summary(state, req)),
        "attendance.studentOverall" => Some(handle_attendance_student_overall(state, req)),
        "attendance.sessions" => Some(handle_attendance_sessions(state, req)),
        _ => None,
    }
}
