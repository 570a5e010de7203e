mod test_support;

use serde_json::json;
use test_support::{request_err_code, request_ok, spawn_sidecar, str_field, temp_dir, tree_chapters};

#[test]
fn session_rename_create_delete_toggle_roundtrip() {
    let workspace = temp_dir("coursed-structure-mutations");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let course = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.create",
        json!({ "title": "Databases" }),
    );
    let course_id = str_field(&course, "courseId");
    let chapter = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "chapters.create",
        json!({ "courseId": course_id, "title": "Relational model" }),
    );
    let chapter_id = str_field(&chapter, "chapterId");
    for i in 0..3 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("lesson-{}", i),
            "lessons.create",
            json!({ "chapterId": chapter_id, "title": format!("Part {}", i), "description": "notes" }),
        );
    }

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "4",
        "structure.renameChapter",
        json!({ "courseId": course_id, "chapterId": chapter_id, "title": "x" }),
    );
    assert_eq!(code, "no_session");

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "structure.open",
        json!({ "courseId": course_id }),
    );
    assert_eq!(str_field(&opened, "title"), "Databases");
    assert_eq!(
        opened.pointer("/tree/chapters/0/expanded").and_then(|v| v.as_bool()),
        Some(true)
    );

    let blank = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "structure.renameChapter",
        json!({ "courseId": course_id, "chapterId": chapter_id, "title": "   " }),
    );
    assert_eq!(str_field(&blank, "outcome"), "invalid");
    assert_eq!(
        blank.pointer("/notifications/0/message").and_then(|v| v.as_str()),
        Some("Chapter title is required")
    );
    assert_eq!(
        blank.pointer("/tree/chapters/0/title").and_then(|v| v.as_str()),
        Some("Relational model")
    );

    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "structure.renameChapter",
        json!({ "courseId": course_id, "chapterId": chapter_id, "title": "  Relations " }),
    );
    assert_eq!(str_field(&renamed, "outcome"), "applied");
    let persisted = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "courses.get",
        json!({ "courseId": course_id }),
    );
    assert_eq!(
        persisted.pointer("/course/chapters/0/title").and_then(|v| v.as_str()),
        Some("Relations")
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "structure.createChapter",
        json!({ "courseId": course_id, "title": "Indexes" }),
    );
    assert_eq!(str_field(&created, "outcome"), "applied");
    let new_id = str_field(&created, "chapterId");
    assert_eq!(
        tree_chapters(&created),
        vec![(chapter_id.clone(), 1), (new_id.clone(), 2)]
    );
    let persisted = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "courses.get",
        json!({ "courseId": course_id }),
    );
    assert_eq!(
        persisted.pointer("/course/chapters/1/id").and_then(|v| v.as_str()),
        Some(new_id.as_str())
    );

    let toggled = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "structure.toggle",
        json!({ "courseId": course_id, "chapterId": new_id }),
    );
    assert_eq!(toggled.get("expanded").and_then(|v| v.as_bool()), Some(false));
    assert!(toggled
        .get("notifications")
        .and_then(|v| v.as_array())
        .map(|a| a.is_empty())
        .unwrap_or(false));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "structure.deleteChapter",
        json!({ "courseId": course_id, "chapterId": chapter_id }),
    );
    assert_eq!(str_field(&deleted, "outcome"), "applied");
    assert_eq!(
        deleted.pointer("/notifications/0/message").and_then(|v| v.as_str()),
        Some("Chapter and 3 lesson(s) deleted successfully")
    );
    assert_eq!(tree_chapters(&deleted), vec![(new_id.clone(), 1)]);

    let missing = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "structure.deleteLesson",
        json!({ "courseId": course_id, "lessonId": "does-not-exist" }),
    );
    assert_eq!(str_field(&missing, "outcome"), "notFound");

    let closed = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "structure.close",
        json!({ "courseId": course_id }),
    );
    assert_eq!(closed.get("closed").and_then(|v| v.as_bool()), Some(true));
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "15",
        "structure.get",
        json!({ "courseId": course_id }),
    );
    assert_eq!(code, "no_session");
}

#[test]
fn session_delete_lesson_renumbers_persisted_positions() {
    let workspace = temp_dir("coursed-structure-delete-lesson");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let course_id = str_field(
        &request_ok(&mut stdin, &mut reader, "2", "courses.create", json!({ "title": "Go" })),
        "courseId",
    );
    let chapter_id = str_field(
        &request_ok(
            &mut stdin,
            &mut reader,
            "3",
            "chapters.create",
            json!({ "courseId": course_id, "title": "Syntax" }),
        ),
        "chapterId",
    );
    let mut lesson_ids = Vec::new();
    for i in 0..3 {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("l{}", i),
            "lessons.create",
            json!({ "chapterId": chapter_id, "title": format!("L{}", i) }),
        );
        lesson_ids.push(str_field(&created, "lessonId"));
    }
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "structure.open",
        json!({ "courseId": course_id }),
    );
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "structure.deleteLesson",
        json!({ "courseId": course_id, "lessonId": lesson_ids[0] }),
    );
    assert_eq!(str_field(&deleted, "outcome"), "applied");

    let persisted = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "courses.get",
        json!({ "courseId": course_id }),
    );
    let lessons = persisted
        .pointer("/course/chapters/0/lessons")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let got: Vec<(String, i64)> = lessons
        .iter()
        .map(|l| (str_field(l, "id"), l.get("position").and_then(|v| v.as_i64()).unwrap_or(-1)))
        .collect();
    assert_eq!(got, vec![(lesson_ids[1].clone(), 1), (lesson_ids[2].clone(), 2)]);
}
