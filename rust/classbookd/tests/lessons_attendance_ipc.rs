mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, seed_class, spawn_sidecar, str_field, temp_dir};

#[test]
fn lesson_upserts_are_idempotent_per_class_date_period() {
    let workspace = temp_dir("classbook-lessons");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_, class_id) = seed_class(&mut stdin, &mut reader, &workspace, "1-3");

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "lessons.upsert",
        json!({ "classId": class_id, "date": "2025-03-04", "period": 2, "progress": "ch1" }),
    );
    assert_eq!(first["created"], true);
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lessons.upsert",
        json!({ "classId": class_id, "date": "2025-03-04", "period": 2, "progress": "ch2", "note": "quiz" }),
    );
    assert_eq!(second["created"], false);
    assert_eq!(second["lessonLog"]["id"], first["lessonLog"]["id"]);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.list",
        json!({ "classId": class_id, "date": "2025-03-04" }),
    );
    let logs = listed["lessonLogs"].as_array().expect("logs");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["progress"], "ch2");
    assert_eq!(logs[0]["note"], "quiz");

    let by_date = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lessons.byDate",
        json!({ "date": "2025-3-4" }),
    );
    assert_eq!(by_date["date"], "2025-03-04");
    assert_eq!(by_date["rows"][0]["className"], "1-3");
    assert_eq!(by_date["rows"][0]["subjectName"], "Math");

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "lessons.upsert",
        json!({ "classId": class_id, "date": "2025-02-30", "period": 1 }),
        "bad_params",
    );
    let log_id = str_field(&first, &["lessonLog", "id"]);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "lessons.delete",
        json!({ "lessonLogId": log_id }),
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "lessons.delete",
        json!({ "lessonLogId": log_id }),
        "not_found",
    );
}

#[test]
fn attendance_uses_the_configured_labels() {
    let workspace = temp_dir("classbook-attendance");
    std::fs::write(
        workspace.join("classbookd.toml"),
        "[attendance]\nlabels = \"korean\"\n",
    )
    .expect("write config");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_, class_id) = seed_class(&mut stdin, &mut reader, &workspace, "1-3");
    let kim = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "students.create",
        json!({ "classId": class_id, "studentNo": "001", "studentName": "Kim" }),
    );
    let kim_id = str_field(&kim, &["student", "id"]);
    let lee = request_ok(
        &mut stdin,
        &mut reader,
        "s2",
        "students.create",
        json!({ "classId": class_id, "studentNo": "002", "studentName": "Lee" }),
    );
    let lee_id = str_field(&lee, &["student", "id"]);

    let sheet = request_ok(
        &mut stdin,
        &mut reader,
        "sheet",
        "attendance.sheet",
        json!({ "classId": class_id, "date": "2025-03-04", "period": 1 }),
    );
    assert_eq!(sheet["statuses"], json!(["출석", "결석", "지각", "공결"]));
    assert_eq!(sheet["rows"][0]["status"], "출석");
    assert!(sheet["rows"][0]["recordId"].is_null());

    for (i, status) in ["late", "A", "결석"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("u{}", i),
            "attendance.upsert",
            json!({
                "classId": class_id,
                "date": "2025-03-04",
                "period": 1,
                "studentId": kim_id,
                "status": status,
                "remark": "bus",
            }),
        );
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "save",
        "attendance.save",
        json!({
            "classId": class_id,
            "date": "2025-03-04",
            "period": 2,
            "entries": [
                { "studentId": kim_id, "status": "present" },
                { "studentId": lee_id, "status": "absent" },
            ],
            "applyAll": "지각",
        }),
    );

    let day = request_ok(
        &mut stdin,
        &mut reader,
        "day",
        "attendance.byDate",
        json!({ "date": "2025-03-04" }),
    );
    let rows = day["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["studentNo"], "001");
    assert_eq!(rows[0]["status"], "결석");
    assert_eq!(rows[0]["remark"], "bus");
    assert_eq!(rows[1]["period"], 2);
    assert_eq!(rows[2]["studentName"], "Lee");
    assert_eq!(day["counts"]["결석"], 1);
    assert_eq!(day["counts"]["지각"], 2);
    assert_eq!(day["counts"]["출석"], 0);

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "bad-status",
        "attendance.upsert",
        json!({
            "classId": class_id,
            "date": "2025-03-04",
            "period": 1,
            "studentId": kim_id,
            "status": "sick",
        }),
        "bad_params",
    );

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "students.delete",
        json!({ "studentId": kim_id }),
    );
    assert_eq!(removed["attendanceRemoved"], 2);
}
