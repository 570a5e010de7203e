use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ItemKind, id: String },

    #[error("Lesson move between different chapters is not allowed ({lesson_id}: {from_chapter_id} -> {to_chapter_id})")]
    CrossParentMoveRejected {
        lesson_id: String,
        from_chapter_id: String,
        to_chapter_id: String,
    },

    #[error("Chapter title is required")]
    EmptyTitle,

    #[error("Chapter title must be at most {max} characters")]
    TitleTooLong { max: usize },

    #[error("{kind} already exists: {id}")]
    DuplicateId { kind: ItemKind, id: String },

    #[error("{message}")]
    PersistenceFailure { message: String },
}

impl StructureError {
    pub fn chapter_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: ItemKind::Chapter,
            id: id.to_string(),
        }
    }

    pub fn lesson_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: ItemKind::Lesson,
            id: id.to_string(),
        }
    }

    /// Stable code used in IPC responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::CrossParentMoveRejected { .. } => "cross_parent_move_rejected",
            Self::EmptyTitle => "empty_title",
            Self::TitleTooLong { .. } => "title_too_long",
            Self::DuplicateId { .. } => "duplicate_id",
            Self::PersistenceFailure { .. } => "persistence_failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Chapter,
    Lesson,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chapter => f.write_str("Chapter"),
            Self::Lesson => f.write_str("Lesson"),
        }
    }
}
