//! Attendance sessions (one record per group and date) and the reductions over them.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::fetch::fetch_many_by_id;
use crate::model::{decode, encode, AttendanceSession, Principal, StudentProfile};
use crate::provision::require_group;
use crate::store::{CollectionPath, DocumentStore, Filter, WriteMode};
use crate::students;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Tally {
    pub attended: usize,
    pub total: usize,
}

impl Tally {
    /// 0 when there are no sessions.
    pub fn percentage(self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * (self.attended as f64) / (self.total as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub student_id: String,
    pub display_name: String,
    pub attended: usize,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterAttendance {
    pub semester_no: u32,
    pub group_id: String,
    pub attended: usize,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallAttendance {
    pub student_id: String,
    pub attended: usize,
    pub total: usize,
    pub percentage: f64,
    pub semesters: Vec<SemesterAttendance>,
}

pub fn round_percentage(x: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (x * factor).round() / factor
}

/// Per-student tallies over `sessions`, in the order of `student_ids`.
pub fn aggregate(sessions: &[AttendanceSession], student_ids: &[String]) -> Vec<(String, Tally)> {
    let total = sessions.len();
    student_ids
        .iter()
        .map(|id| {
            let attended = sessions
                .iter()
                .filter(|s| s.present.iter().any(|p| p == id))
                .count();
            (id.clone(), Tally { attended, total })
        })
        .collect()
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Sessions of a group, optionally limited to an inclusive `YYYY-MM-DD` range, by date.
pub fn list_sessions(
    store: &dyn DocumentStore,
    group_id: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> CoreResult<Vec<AttendanceSession>> {
    let path = CollectionPath::group_attendance(group_id);
    let mut filters = Vec::new();
    if let Some(f) = from {
        filters.push(Filter::Gte("date".to_string(), json!(parse_date(f)?.to_string())));
    }
    if let Some(t) = to {
        filters.push(Filter::Lte("date".to_string(), json!(parse_date(t)?.to_string())));
    }
    let rows = store.query(&path, &filters)?;
    let mut out = rows
        .into_iter()
        .map(|(id, doc)| decode::<AttendanceSession>(&path, &id, doc))
        .collect::<Result<Vec<_>, _>>()?;
    out.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(out)
}

fn parse_date(raw: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidInput(format!("date must be YYYY-MM-DD, got {:?}", raw)))
}

/// Records who was present on `date`. Everyone else in the group is stored as absent.
///
/// The date is the record key, so a second write on the same day overwrites the
/// presence lists and subject of the first.
pub fn mark_attendance(
    store: &dyn DocumentStore,
    principal: &Principal,
    group_id: &str,
    date: &str,
    subject: &str,
    present: &[String],
) -> CoreResult<AttendanceSession> {
    principal.require_staff("attendance.mark")?;
    let date = parse_date(date)?.to_string();
    let group = require_group(store, group_id)?;

    let members: HashSet<&str> = group.students.iter().map(|s| s.as_str()).collect();
    let present = dedup(present);
    let unknown: Vec<String> = present
        .iter()
        .filter(|id| !members.contains(id.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        warn!(group_id = %group_id, unknown = unknown.len(), "attendance lists non-members");
        return Err(CoreError::UnknownStudents {
            group_id: group_id.to_string(),
            student_ids: unknown,
        });
    }
    let present_set: HashSet<&str> = present.iter().map(|s| s.as_str()).collect();
    let absent: Vec<String> = group
        .students
        .iter()
        .filter(|id| !present_set.contains(id.as_str()))
        .cloned()
        .collect();

    let session = AttendanceSession {
        date: date.clone(),
        subject: subject.to_string(),
        present,
        absent,
        marked_by: principal.id.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    store.upsert(
        &CollectionPath::group_attendance(group_id),
        &date,
        encode(&session)?,
        WriteMode::Merge,
    )?;
    info!(
        group_id = %group_id,
        date = %date,
        present = session.present.len(),
        absent = session.absent.len(),
        "attendance marked"
    );
    Ok(session)
}

/// Attendance of `student_ids` in one group, sorted by display name (ignoring case) then id.
pub fn compute_attendance(
    store: &dyn DocumentStore,
    principal: &Principal,
    group_id: &str,
    student_ids: &[String],
    chunk_size: usize,
) -> CoreResult<Vec<AttendanceRow>> {
    principal.require_staff("attendance.groupSummary")?;
    require_group(store, group_id)?;
    let sessions = list_sessions(store, group_id, None, None)?;
    let ids = dedup(student_ids);
    let tallies = aggregate(&sessions, &ids);

    let profiles = fetch_many_by_id(store, &CollectionPath::students(), &ids, chunk_size)?;
    let mut rows = Vec::with_capacity(tallies.len());
    for (student_id, tally) in tallies {
        let display_name = match profiles.get(&student_id) {
            Some(doc) => StudentProfile::from_document(&student_id, doc.clone())?.name,
            None => student_id.clone(),
        };
        rows.push(AttendanceRow {
            student_id,
            display_name,
            attended: tally.attended,
            total: tally.total,
            percentage: tally.percentage(),
        });
    }
    rows.sort_by_cached_key(|r| {
        (
            r.display_name.to_lowercase(),
            r.display_name.clone(),
            r.student_id.clone(),
        )
    });
    Ok(rows)
}

/// One blended percentage across all of a student's semesters.
///
/// Semesters whose group has no sessions yet are listed but add nothing to either side
/// of the ratio.
pub fn student_overall(
    store: &dyn DocumentStore,
    principal: &Principal,
    student_id: &str,
) -> CoreResult<OverallAttendance> {
    principal.require_self_or_staff(student_id, "attendance.studentOverall")?;
    if students::get_student(store, student_id)?.is_none() {
        return Err(CoreError::NotFound {
            what: "student",
            id: student_id.to_string(),
        });
    }

    let mut blended = Tally::default();
    let mut semesters = Vec::new();
    let id = student_id.to_string();
    for record in students::semester_records(store, student_id)? {
        let sessions = list_sessions(store, &record.group_id, None, None)?;
        let tally = aggregate(&sessions, std::slice::from_ref(&id))
            .pop()
            .map(|(_, t)| t)
            .unwrap_or_default();
        if tally.total > 0 {
            blended.attended += tally.attended;
            blended.total += tally.total;
        }
        semesters.push(SemesterAttendance {
            semester_no: record.semester_no,
            group_id: record.group_id,
            attended: tally.attended,
            total: tally.total,
            percentage: tally.percentage(),
        });
    }

    Ok(OverallAttendance {
        student_id: id,
        attended: blended.attended,
        total: blended.total,
        percentage: blended.percentage(),
        semesters,
    })
}
