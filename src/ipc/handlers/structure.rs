use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::load_session_options;
use crate::ipc::helpers::{db_conn, required_raw_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteCourseStore;
use crate::structure::{
    CollectingSink, DragEvent, EditorSession, NoticeKind, NotificationSink, Outcome,
    PendingReconciliation, PersistCall, StructureError,
};
use serde_json::json;
use tracing::info;

fn session_view(session: &EditorSession) -> serde_json::Value {
    json!({
        "courseId": session.course_id(),
        "chapters": session.tree().chapters(),
    })
}

fn outcome_response(
    req: &Request,
    outcome: Outcome,
    session: &EditorSession,
    sink: CollectingSink,
    extra: Option<(&str, serde_json::Value)>,
) -> serde_json::Value {
    let mut result = json!({
        "outcome": outcome,
        "tree": session_view(session),
        "notifications": sink.into_notices(),
    });
    if let Some((key, value)) = extra {
        result[key] = value;
    }
    ok(&req.id, result)
}

/// Runs `f` against the open session for `courseId` with a store over the
/// workspace database.
fn with_session<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&mut EditorSession, &SqliteCourseStore<'_>, &mut CollectingSink) -> (Outcome, Option<(&'static str, serde_json::Value)>),
{
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let AppState { db, sessions, .. } = state;
    let Some(conn) = db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(session) = sessions.get_mut(&course_id) else {
        return err(
            &req.id,
            "no_session",
            "open the course structure first",
            Some(json!({ "courseId": course_id })),
        );
    };
    let store = SqliteCourseStore::new(conn);
    let mut sink = CollectingSink::new();
    let (outcome, extra) = f(session, &store, &mut sink);
    outcome_response(req, outcome, session, sink, extra)
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course = match db::load_course(conn, &course_id) {
        Ok(Some(c)) => c,
        Ok(None) => return err(&req.id, "not_found", "Course not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let options = match load_session_options(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let session = EditorSession::open(course.id.clone(), &course.chapters, options);
    let view = session_view(&session);
    info!(course_id = %course_id, chapters = course.chapters.len(), "structure session opened");
    state.sessions.insert(course_id, session);
    ok(&req.id, json!({ "title": course.title, "tree": view }))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.sessions.get(&course_id) {
        Some(session) => ok(
            &req.id,
            json!({ "tree": session_view(session), "pending": session.pending_count() }),
        ),
        None => err(&req.id, "no_session", "open the course structure first", None),
    }
}

fn handle_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let closed = state.sessions.remove(&course_id).is_some();
    ok(&req.id, json!({ "closed": closed }))
}

fn handle_drag_end(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("event") else {
        return err(&req.id, "bad_params", "missing event", None);
    };
    let event: DragEvent = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("event: {}", e), None),
    };
    with_session(state, req, |session, store, sink| {
        (session.handle_drag(&event, store, sink), None)
    })
}

fn handle_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let chapter_id = match required_str(req, "chapterId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_session(state, req, |session, _store, sink| {
        match session.toggle_expanded(&chapter_id) {
            Ok(expanded) => (Outcome::Applied, Some(("expanded", json!(expanded)))),
            Err(e) => {
                sink.notify(NoticeKind::Error, &e.to_string());
                (Outcome::NotFound, None)
            }
        }
    })
}

fn handle_rename_chapter(state: &mut AppState, req: &Request) -> serde_json::Value {
    let chapter_id = match required_str(req, "chapterId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_raw_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_session(state, req, |session, store, sink| {
        let begun = session.begin_rename_chapter(&chapter_id, &title).map(Some);
        (session.commit(begun, store, sink), None)
    })
}

fn created_chapter_id(pending: &Result<PendingReconciliation, StructureError>) -> Option<String> {
    match pending.as_ref().map(|p| p.call()) {
        Ok(PersistCall::CreateChapter { chapter_id, .. }) => Some(chapter_id.clone()),
        _ => None,
    }
}

fn handle_create_chapter(state: &mut AppState, req: &Request) -> serde_json::Value {
    let title = match required_raw_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_session(state, req, |session, store, sink| {
        let begun = session.begin_create_chapter(&title);
        let chapter_id = created_chapter_id(&begun);
        let outcome = session.commit(begun.map(Some), store, sink);
        match (outcome, chapter_id) {
            (Outcome::Applied, Some(id)) => (outcome, Some(("chapterId", json!(id)))),
            _ => (outcome, None),
        }
    })
}

fn handle_delete_chapter(state: &mut AppState, req: &Request) -> serde_json::Value {
    let chapter_id = match required_str(req, "chapterId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_session(state, req, |session, store, sink| {
        let begun = session.begin_delete_chapter(&chapter_id).map(Some);
        (session.commit(begun, store, sink), None)
    })
}

fn handle_delete_lesson(state: &mut AppState, req: &Request) -> serde_json::Value {
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_session(state, req, |session, store, sink| {
        let begun = session.begin_delete_lesson(&lesson_id).map(Some);
        (session.commit(begun, store, sink), None)
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "structure.open" => Some(handle_open(state, req)),
        "structure.get" => Some(handle_get(state, req)),
        "structure.close" => Some(handle_close(state, req)),
        "structure.dragEnd" => Some(handle_drag_end(state, req)),
        "structure.toggle" => Some(handle_toggle(state, req)),
        "structure.renameChapter" => Some(handle_rename_chapter(state, req)),
        "structure.createChapter" => Some(handle_create_chapter(state, req)),
        "structure.deleteChapter" => Some(handle_delete_chapter(state, req)),
        "structure.deleteLesson" => Some(handle_delete_lesson(state, req)),
        _ => None,
    }
}
