use rusqlite::Connection;
use tracing::{error, info};

use crate::db;
use crate::structure::{ActionResult, CourseStore, LessonPosition};

/// Persistence service backed by the workspace database.
pub struct SqliteCourseStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCourseStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn finish(action: &str, outcome: anyhow::Result<String>, failure_prefix: &str) -> ActionResult {
    match outcome {
        Ok(message) => {
            info!(action, "{}", message);
            ActionResult::success(message)
        }
        Err(e) => {
            error!(action, error = %e, "store call failed");
            ActionResult::error(format!("{}: {}", failure_prefix, e))
        }
    }
}

impl CourseStore for SqliteCourseStore<'_> {
    fn update_chapter_positions(&self, course_id: &str, ordered_chapter_ids: &[String]) -> ActionResult {
        finish(
            "update_chapter_positions",
            db::update_chapter_positions(self.conn, course_id, ordered_chapter_ids)
                .map(|_| "Chapters reordered successfully".to_string()),
            "Failed to reorder chapters",
        )
    }

    fn update_lesson_positions(&self, chapter_id: &str, positions: &[LessonPosition]) -> ActionResult {
        finish(
            "update_lesson_positions",
            db::update_lesson_positions(self.conn, chapter_id, positions)
                .map(|_| "Lessons reordered successfully".to_string()),
            "Failed to reorder lessons",
        )
    }

    fn create_chapter(&self, course_id: &str, chapter_id: &str, title: &str) -> ActionResult {
        finish(
            "create_chapter",
            db::insert_chapter(self.conn, course_id, Some(chapter_id), title)
                .map(|_| "Chapter created successfully".to_string()),
            "Failed to create chapter",
        )
    }

    fn rename_chapter(&self, chapter_id: &str, title: &str) -> ActionResult {
        finish(
            "rename_chapter",
            db::rename_chapter(self.conn, chapter_id, title)
                .map(|_| "Chapter updated successfully".to_string()),
            "Failed to update chapter",
        )
    }

    fn delete_chapter(&self, chapter_id: &str) -> ActionResult {
        finish(
            "delete_chapter",
            db::delete_chapter(self.conn, chapter_id)
                .map(|n| format!("Chapter and {} lesson(s) deleted successfully", n)),
            "Failed to delete chapter",
        )
    }

    fn delete_lesson(&self, lesson_id: &str) -> ActionResult {
        finish(
            "delete_lesson",
            db::delete_lesson(self.conn, lesson_id).map(|_| "Lesson deleted successfully".to_string()),
            "Failed to delete lesson",
        )
    }
}
