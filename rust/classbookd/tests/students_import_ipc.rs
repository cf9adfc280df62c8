mod test_support;

use serde_json::json;
use test_support::{
    fixture_path, request_err, request_ok, seed_class, spawn_sidecar, temp_dir,
};

fn roster(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    class_id: &str,
) -> Vec<(String, String)> {
    let listed = request_ok(stdin, reader, "roster", "students.list", json!({ "classId": class_id }));
    listed["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| {
            (
                s["studentNo"].as_str().unwrap_or_default().to_string(),
                s["studentName"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[test]
fn repeated_numbers_in_one_file_follow_the_policy() {
    let workspace = temp_dir("classbook-import-dupes");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (subject_id, upsert_class) = seed_class(&mut stdin, &mut reader, &workspace, "1-1");
    let skip_class = request_ok(
        &mut stdin,
        &mut reader,
        "c2",
        "classes.create",
        json!({ "subjectId": subject_id, "className": "1-2", "year": 2025, "term": "1" }),
    )["class"]["id"]
        .as_str()
        .expect("class id")
        .to_string();
    let path = fixture_path("csv/roster_duplicates.csv");

    let upsert = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "students.import",
        json!({ "classId": upsert_class, "path": path.to_string_lossy() }),
    );
    assert_eq!(upsert["policy"], "upsert");
    assert_eq!(upsert["created"], 2);
    assert_eq!(upsert["updated"], 1);
    assert_eq!(upsert["duplicatesInBatch"], 1);
    assert_eq!(
        roster(&mut stdin, &mut reader, &upsert_class),
        vec![
            ("001".to_string(), "Park".to_string()),
            ("002".to_string(), "Lee".to_string())
        ]
    );

    let skip = request_ok(
        &mut stdin,
        &mut reader,
        "i2",
        "students.import",
        json!({ "classId": skip_class, "path": path.to_string_lossy(), "policy": "skip" }),
    );
    assert_eq!(skip["created"], 2);
    assert_eq!(skip["skipped"], 1);
    assert_eq!(
        roster(&mut stdin, &mut reader, &skip_class),
        vec![
            ("001".to_string(), "Kim".to_string()),
            ("002".to_string(), "Lee".to_string())
        ]
    );
}

#[test]
fn blank_rows_are_rejected_and_encodings_are_detected() {
    let workspace = temp_dir("classbook-import-encodings");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_, class_id) = seed_class(&mut stdin, &mut reader, &workspace, "2-1");

    let bom = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "students.import",
        json!({
            "classId": class_id,
            "path": fixture_path("csv/roster_bom_blank_rows.csv").to_string_lossy(),
        }),
    );
    assert_eq!(bom["created"], 2);
    assert_eq!(bom["rejected"], 2);
    assert_eq!(bom["rejectedLines"], json!([3, 4]));

    let cp949 = request_ok(
        &mut stdin,
        &mut reader,
        "i2",
        "students.import",
        json!({
            "classId": class_id,
            "path": fixture_path("csv/roster_cp949.csv").to_string_lossy(),
        }),
    );
    assert_eq!(cp949["created"], 2);
    let names: Vec<String> = roster(&mut stdin, &mut reader, &class_id)
        .into_iter()
        .map(|(_, name)| name)
        .collect();
    assert_eq!(names, vec!["Choi", "Jung", "홍길동", "김철수"]);
}

#[test]
fn bad_headers_and_unknown_policies_write_nothing() {
    let workspace = temp_dir("classbook-import-bad");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_, class_id) = seed_class(&mut stdin, &mut reader, &workspace, "3-1");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "i1",
        "students.import",
        json!({
            "classId": class_id,
            "path": fixture_path("csv/roster_bad_header.csv").to_string_lossy(),
        }),
        "invalid_csv",
    );
    assert_eq!(error["details"]["found"], json!(["번호", "이름", "반"]));

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "i2",
        "students.import",
        json!({
            "classId": class_id,
            "path": fixture_path("csv/roster_duplicates.csv").to_string_lossy(),
            "policy": "merge",
        }),
        "bad_params",
    );
    assert!(roster(&mut stdin, &mut reader, &class_id).is_empty());
}

#[test]
fn inline_rows_and_template() {
    let workspace = temp_dir("classbook-import-inline");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (_, class_id) = seed_class(&mut stdin, &mut reader, &workspace, "4-1");

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "i1",
        "students.import",
        json!({
            "classId": class_id,
            "rows": [
                { "studentNo": "7", "studentName": "Han" },
                { "studentNo": "", "studentName": "Nobody" },
            ],
        }),
    );
    assert_eq!(summary["created"], 1);
    assert_eq!(summary["rejectedLines"], json!([2]));

    let template = request_ok(&mut stdin, &mut reader, "t", "students.csvTemplate", json!({}));
    assert_eq!(template["fileName"], "students_template.csv");
    assert!(template["csv"]
        .as_str()
        .expect("csv")
        .starts_with("학번,성명\n"));
}
