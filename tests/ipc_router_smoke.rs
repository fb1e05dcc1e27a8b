use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_hubd() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_hubd");
    let mut child = Command::new(exe)
        .env_remove("HUBD_WORKSPACE")
        .env_remove("HUBD_FETCH_CHUNK_SIZE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn hubd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("hubd-router-smoke");
    let admin = json!({ "id": "admin-1", "role": "admin" });
    let teacher = json!({ "id": "teacher-1", "role": "teacher" });

    let (mut child, mut stdin, mut reader) = spawn_hubd();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("workspacePath").is_some_and(|v| v.is_null()));

    let early = request(
        &mut stdin,
        &mut reader,
        "2",
        "catalog.list",
        json!({ "principal": admin, "kind": "degree" }),
    );
    assert_eq!(error_code(&early), "no_workspace");

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (i, (kind, id, name)) in [
        ("degree", "d1", "B.Tech"),
        ("stream", "s1", "Computer Science"),
        ("batch", "b1", "2022-26"),
    ]
    .iter()
    .enumerate()
    {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("cat-{}", i),
            "catalog.upsert",
            json!({ "principal": admin, "kind": kind, "id": id, "name": name }),
        );
    }
    let degrees = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "catalog.list",
        json!({ "principal": teacher, "kind": "degree" }),
    );
    assert_eq!(degrees["entries"][0]["name"], "B.Tech");

    for (id, name) in [("st01", "Asha"), ("st02", "Bilal")] {
        let saved = request_ok(
            &mut stdin,
            &mut reader,
            &format!("stu-{}", id),
            "students.upsert",
            json!({
                "principal": admin,
                "studentId": id,
                "name": name,
                "regNo": format!("REG-{}", id),
                "degreeId": "d1",
                "streamId": "s1",
                "batchId": "b1"
            }),
        );
        assert_eq!(saved["studentId"], id);
    }

    let refused = request(
        &mut stdin,
        &mut reader,
        "5",
        "semesters.provision",
        json!({
            "principal": teacher,
            "degreeId": "d1",
            "streamId": "s1",
            "batchId": "b1",
            "semesterNo": 1,
            "section": "A"
        }),
    );
    assert_eq!(error_code(&refused), "permission_denied");

    let provisioned = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "semesters.provision",
        json!({
            "principal": admin,
            "targetStudentId": "st01",
            "sgpa": 8.25,
            "degreeId": "d1",
            "streamId": "s1",
            "batchId": "b1",
            "semesterNo": 1,
            "section": "A",
            "subjects": "Maths, Physics,, ",
            "labs": ["Physics Lab"],
            "room": "R-101"
        }),
    );
    let group_id = provisioned["groupId"].as_str().expect("groupId").to_string();
    assert_eq!(group_id, "B.Tech_Computer_Science_2022-26_sem1_A");
    assert_eq!(provisioned["studentsAffected"], 2);

    let group = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "semesters.groupOpen",
        json!({ "principal": teacher, "groupId": group_id }),
    );
    assert_eq!(group["subjects"], json!(["Maths", "Physics"]));
    assert_eq!(group["students"], json!(["st01", "st02"]));

    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "attendance.mark",
        json!({
            "principal": teacher,
            "groupId": group_id,
            "date": "2024-03-01",
            "subject": "Maths",
            "presentIds": ["st01"]
        }),
    );
    assert_eq!(marked["presentCount"], 1);
    assert_eq!(marked["absentCount"], 1);
    request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.mark",
        json!({
            "principal": teacher,
            "groupId": group_id,
            "date": "2024-03-02",
            "subject": "Physics",
            "presentIds": "st01, st02"
        }),
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "attendance.groupSummary",
        json!({ "principal": teacher, "groupId": group_id }),
    );
    let rows = summary["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["displayName"], "Asha");
    assert_eq!(rows[0]["percentage"], 100.0);
    assert_eq!(rows[1]["displayName"], "Bilal");
    assert_eq!(rows[1]["attended"], 1);
    assert_eq!(rows[1]["total"], 2);
    assert_eq!(rows[1]["percentage"], 50.0);

    let student = json!({ "id": "st02", "role": "student" });
    let overall = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "attendance.studentOverall",
        json!({ "principal": student, "studentId": "st02" }),
    );
    assert_eq!(overall["total"], 2);
    assert_eq!(overall["semesters"][0]["semesterNo"], 1);

    let peek = request(
        &mut stdin,
        &mut reader,
        "12",
        "attendance.studentOverall",
        json!({ "principal": student, "studentId": "st01" }),
    );
    assert_eq!(error_code(&peek), "permission_denied");

    let results = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "results.student",
        json!({ "principal": teacher, "studentId": "st01" }),
    );
    assert_eq!(results["cgpa"], 8.25);
    assert_eq!(results["semesters"][0]["sgpa"], 8.25);

    let sessions = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "attendance.sessions",
        json!({ "principal": teacher, "groupId": group_id, "from": "2024-03-02" }),
    );
    assert_eq!(sessions["sessions"].as_array().map(|a| a.len()), Some(1));

    let setup = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "setup.get",
        json!({ "principal": teacher }),
    );
    assert_eq!(setup["fetch"]["chunkSize"], 30);
    assert_eq!(setup["attendance"]["percentDecimals"], 1);

    let too_big = request(
        &mut stdin,
        &mut reader,
        "16",
        "setup.update",
        json!({ "principal": admin, "section": "fetch", "patch": { "chunkSize": 31 } }),
    );
    assert_eq!(error_code(&too_big), "bad_params");
    request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "setup.update",
        json!({ "principal": admin, "section": "fetch", "patch": { "chunkSize": 1 } }),
    );
    let setup = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "setup.get",
        json!({ "principal": admin }),
    );
    assert_eq!(setup["fetch"]["chunkSize"], 1);
    let fetch_only = request_ok(
        &mut stdin,
        &mut reader,
        "18a",
        "setup.get",
        json!({ "principal": admin, "section": "fetch" }),
    );
    assert_eq!(fetch_only, json!({ "chunkSize": 1 }));

    let contact = request_ok(
        &mut stdin,
        &mut reader,
        "18b",
        "students.updateContact",
        json!({ "principal": student, "studentId": "st02", "email": "bilal@example.edu" }),
    );
    assert_eq!(contact["email"], "bilal@example.edu");
    assert_eq!(contact["batchId"], "b1");

    // Single-id chunks still resolve every display name.
    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "attendance.groupSummary",
        json!({ "principal": teacher, "groupId": group_id, "studentIds": ["st02", "st01"] }),
    );
    assert_eq!(summary["rows"][0]["displayName"], "Asha");
    assert_eq!(summary["rows"][1]["displayName"], "Bilal");

    let anonymous = request(
        &mut stdin,
        &mut reader,
        "20",
        "students.list",
        json!({}),
    );
    assert_eq!(error_code(&anonymous), "permission_denied");

    let unknown = request(&mut stdin, &mut reader, "21", "grades.export", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_lines_get_an_idless_error() {
    let (mut child, mut stdin, mut reader) = spawn_hubd();
    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value["ok"], false);
    assert_eq!(error_code(&value), "bad_json");
    assert!(value.get("id").is_none());

    // The loop keeps serving after a bad line.
    request_ok(&mut stdin, &mut reader, "after", "health", json!({}));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unusable_workspace_reports_store_error() {
    let dir = temp_dir("hubd-bad-workspace");
    let blocker = dir.join("not-a-dir");
    std::fs::write(&blocker, b"plain file").expect("write blocker");

    let (mut child, mut stdin, mut reader) = spawn_hubd();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": blocker.to_string_lossy() }),
    );
    assert_eq!(resp["ok"], false);
    assert_eq!(error_code(&resp), "store_error");

    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert!(health["workspacePath"].is_null());

    drop(stdin);
    let _ = child.wait();
}
