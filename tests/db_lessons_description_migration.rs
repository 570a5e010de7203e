mod test_support;

use rusqlite::Connection;
use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

#[test]
fn workspace_without_lesson_descriptions_is_migrated() {
    let workspace = temp_dir("coursed-migration");
    {
        let conn = Connection::open(workspace.join("coursed.sqlite3")).expect("open");
        conn.execute_batch(
            "CREATE TABLE courses(id TEXT PRIMARY KEY, title TEXT NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
             CREATE TABLE chapters(id TEXT PRIMARY KEY, course_id TEXT NOT NULL, title TEXT NOT NULL, position INTEGER NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
             CREATE TABLE lessons(id TEXT PRIMARY KEY, chapter_id TEXT NOT NULL, title TEXT NOT NULL, position INTEGER NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
             INSERT INTO courses VALUES('c1', 'Legacy', 't', 't');
             INSERT INTO chapters VALUES('ch1', 'c1', 'Only chapter', 4, 't', 't');
             INSERT INTO lessons VALUES('l2', 'ch1', 'Second', 9, 't', 't');
             INSERT INTO lessons VALUES('l1', 'ch1', 'First', 3, 't', 't');",
        )
        .expect("seed legacy schema");
    }

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
        "courses.get",
        json!({ "courseId": "c1" }),
    );
    assert_eq!(
        course.pointer("/course/chapters/0/lessons/0/description").and_then(|v| v.as_str()),
        Some("")
    );

    // Gapped persisted positions are normalized in the session tree.
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "structure.open",
        json!({ "courseId": "c1" }),
    );
    assert_eq!(
        opened.pointer("/tree/chapters/0/position").and_then(|v| v.as_i64()),
        Some(1)
    );
    assert_eq!(
        opened.pointer("/tree/chapters/0/lessons/0/id").and_then(|v| v.as_str()),
        Some("l1")
    );
    assert_eq!(
        opened.pointer("/tree/chapters/0/lessons/1/position").and_then(|v| v.as_i64()),
        Some(2)
    );
}
