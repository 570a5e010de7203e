use serde::{Deserialize, Serialize};

use super::tree::LessonPosition;

/// Outcome reported by the persistence service for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ActionResult {
    Success { message: String },
    Error { message: String },
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message } | Self::Error { message } => message,
        }
    }
}

/// Durable storage for course structure. Every method is atomic across its
/// batch: either all rows change or none do.
pub trait CourseStore {
    fn update_chapter_positions(&self, course_id: &str, ordered_chapter_ids: &[String]) -> ActionResult;
    fn update_lesson_positions(&self, chapter_id: &str, positions: &[LessonPosition]) -> ActionResult;
    fn create_chapter(&self, course_id: &str, chapter_id: &str, title: &str) -> ActionResult;
    fn rename_chapter(&self, chapter_id: &str, title: &str) -> ActionResult;
    fn delete_chapter(&self, chapter_id: &str) -> ActionResult;
    fn delete_lesson(&self, lesson_id: &str) -> ActionResult;
}

/// A single persistence call derived from one local mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum PersistCall {
    #[serde(rename_all = "camelCase")]
    UpdateChapterPositions {
        course_id: String,
        chapter_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateLessonPositions {
        chapter_id: String,
        positions: Vec<LessonPosition>,
    },
    #[serde(rename_all = "camelCase")]
    CreateChapter {
        course_id: String,
        chapter_id: String,
        title: String,
    },
    #[serde(rename_all = "camelCase")]
    RenameChapter { chapter_id: String, title: String },
    #[serde(rename_all = "camelCase")]
    DeleteChapter { chapter_id: String },
    #[serde(rename_all = "camelCase")]
    DeleteLesson { lesson_id: String },
}

impl PersistCall {
    pub fn dispatch(&self, store: &dyn CourseStore) -> ActionResult {
        match self {
            Self::UpdateChapterPositions {
                course_id,
                chapter_ids,
            } => store.update_chapter_positions(course_id, chapter_ids),
            Self::UpdateLessonPositions {
                chapter_id,
                positions,
            } => store.update_lesson_positions(chapter_id, positions),
            Self::CreateChapter {
                course_id,
                chapter_id,
                title,
            } => store.create_chapter(course_id, chapter_id, title),
            Self::RenameChapter { chapter_id, title } => store.rename_chapter(chapter_id, title),
            Self::DeleteChapter { chapter_id } => store.delete_chapter(chapter_id),
            Self::DeleteLesson { lesson_id } => store.delete_lesson(lesson_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateChapterPositions { .. } => "update_chapter_positions",
            Self::UpdateLessonPositions { .. } => "update_lesson_positions",
            Self::CreateChapter { .. } => "create_chapter",
            Self::RenameChapter { .. } => "rename_chapter",
            Self::DeleteChapter { .. } => "delete_chapter",
            Self::DeleteLesson { .. } => "delete_lesson",
        }
    }
}
