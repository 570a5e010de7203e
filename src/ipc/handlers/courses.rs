//! Direct persisted CRUD for courses, chapters and lessons. These write
//! straight to the database; open editing sessions pick the changes up when
//! they are reopened.

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::load_session_options;
use crate::ipc::helpers::{db_conn, optional_str, required_raw_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::structure::StructureError;
use serde_json::json;

/// `entity` names the record in validation messages ("Course", "Lesson").
fn validated_title(state: &AppState, req: &Request, entity: &str) -> Result<String, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let raw = required_raw_str(req, "title")?;
    let rules = load_session_options(conn)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?
        .title_rules;
    rules.validate(&raw).map_err(|e| {
        let message = match e {
            StructureError::EmptyTitle => format!("{} title is required", entity),
            StructureError::TitleTooLong { max } => {
                format!("{} title must be at most {} characters", entity, max)
            }
            other => other.to_string(),
        };
        err(&req.id, "bad_params", message, None)
    })
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let title = match validated_title(state, req, "Course") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match db::insert_course(conn, &title) {
        Ok(course_id) => ok(&req.id, json!({ "courseId": course_id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match db::list_courses(conn) {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::load_course(conn, &course_id) {
        Ok(Some(course)) => ok(&req.id, json!({ "course": course })),
        Ok(None) => err(&req.id, "not_found", "Course not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_chapters_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let title = match validated_title(state, req, "Chapter") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::course_exists(conn, &course_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "Course not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    match db::insert_chapter(conn, &course_id, None, &title) {
        Ok((chapter_id, position)) => ok(
            &req.id,
            json!({ "chapterId": chapter_id, "position": position }),
        ),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_chapters_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let title = match validated_title(state, req, "Chapter") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let chapter_id = match required_str(req, "chapterId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::rename_chapter(conn, &chapter_id, &title) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_chapters_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let chapter_id = match required_str(req, "chapterId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::delete_chapter(conn, &chapter_id) {
        Ok(lessons_deleted) => ok(&req.id, json!({ "lessonsDeleted": lessons_deleted })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_lessons_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let title = match validated_title(state, req, "Lesson") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = match optional_str(req, "description") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let chapter_id = match required_str(req, "chapterId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::insert_lesson(conn, &chapter_id, &title, description.trim()) {
        Ok((lesson_id, position)) => ok(
            &req.id,
            json!({ "lessonId": lesson_id, "position": position }),
        ),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_lessons_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::delete_lesson(conn, &lesson_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.get" => Some(handle_courses_get(state, req)),
        "chapters.create" => Some(handle_chapters_create(state, req)),
        "chapters.rename" => Some(handle_chapters_rename(state, req)),
        "chapters.delete" => Some(handle_chapters_delete(state, req)),
        "lessons.create" => Some(handle_lessons_create(state, req)),
        "lessons.delete" => Some(handle_lessons_delete(state, req)),
        _ => None,
    }
}
