mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{request, request_err_code, request_ok, spawn_sidecar, str_field, temp_dir};

fn assert_routed(resp: &serde_json::Value, method: &str) {
    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = resp
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(code, "not_implemented", "unexpected unknown method for {}", method);
    }
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("coursed-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    let code = request_err_code(&mut stdin, &mut reader, "2", "courses.list", json!({}));
    assert_eq!(code, "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let course_id = str_field(
        &request_ok(&mut stdin, &mut reader, "4", "courses.create", json!({ "title": "Smoke" })),
        "courseId",
    );
    let chapter_id = str_field(
        &request_ok(
            &mut stdin,
            &mut reader,
            "5",
            "chapters.create",
            json!({ "courseId": course_id, "title": "One" }),
        ),
        "chapterId",
    );

    let calls = vec![
        ("setup.get", json!({})),
        ("setup.update", json!({ "section": "structure", "patch": {} })),
        ("courses.list", json!({})),
        ("courses.get", json!({ "courseId": course_id })),
        ("chapters.rename", json!({ "chapterId": chapter_id, "title": "Uno" })),
        ("lessons.create", json!({ "chapterId": chapter_id, "title": "First" })),
        ("structure.open", json!({ "courseId": course_id })),
        ("structure.get", json!({ "courseId": course_id })),
        ("structure.toggle", json!({ "courseId": course_id, "chapterId": chapter_id })),
        (
            "structure.dragEnd",
            json!({
                "courseId": course_id,
                "event": { "type": "chapterDrag", "activeId": chapter_id, "over": null }
            }),
        ),
        ("structure.renameChapter", json!({ "courseId": course_id, "chapterId": chapter_id, "title": "One" })),
        ("structure.createChapter", json!({ "courseId": course_id, "title": "Two" })),
        ("structure.deleteLesson", json!({ "courseId": course_id, "lessonId": "missing" })),
        ("structure.deleteChapter", json!({ "courseId": course_id, "chapterId": "missing" })),
        ("structure.close", json!({ "courseId": course_id })),
        ("lessons.delete", json!({ "lessonId": "missing" })),
        ("chapters.delete", json!({ "chapterId": chapter_id })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("s{}", i), method, params);
        assert_routed(&resp, method);
    }

    let code = request_err_code(&mut stdin, &mut reader, "6", "structure.teleport", json!({}));
    assert_eq!(code, "not_implemented");

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let resp: serde_json::Value = serde_json::from_str(line.trim()).expect("parse");
    assert_eq!(resp.pointer("/error/code").and_then(|v| v.as_str()), Some("bad_json"));

    let health = request_ok(&mut stdin, &mut reader, "7", "health", json!({}));
    assert_eq!(health.get("openSessions").and_then(|v| v.as_u64()), Some(0));

    drop(stdin);
    let _ = child.wait();
}
