use serde::Deserialize;

/// What the pointer was released over.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DropTarget {
    #[serde(rename_all = "camelCase")]
    Chapter { id: String },
    #[serde(rename_all = "camelCase")]
    Lesson { id: String, chapter_id: String },
}

/// Drag-end event from the editor, tagged by the kind of item being dragged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DragEvent {
    #[serde(rename_all = "camelCase")]
    ChapterDrag {
        active_id: String,
        #[serde(default)]
        over: Option<DropTarget>,
    },
    #[serde(rename_all = "camelCase")]
    LessonDrag {
        active_id: String,
        chapter_id: String,
        #[serde(default)]
        over: Option<DropTarget>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    NoOp,
    ChapterMove {
        active_id: String,
        target_id: String,
    },
    LessonMove {
        active_id: String,
        target_id: String,
    },
    RejectedCrossChapterMove {
        lesson_id: String,
        from_chapter_id: String,
        to_chapter_id: String,
    },
}

impl DragEvent {
    pub fn active_id(&self) -> &str {
        match self {
            Self::ChapterDrag { active_id, .. } | Self::LessonDrag { active_id, .. } => active_id,
        }
    }
}

impl DropTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::Chapter { id } | Self::Lesson { id, .. } => id,
        }
    }
}

/// Decides what a drag-end means. Pure: never touches the tree, so ids are
/// checked for existence only when the resulting move is applied.
pub fn interpret(event: &DragEvent) -> DragOutcome {
    let over = match event {
        DragEvent::ChapterDrag { over, .. } | DragEvent::LessonDrag { over, .. } => over,
    };
    let Some(over) = over else {
        return DragOutcome::NoOp;
    };
    if over.id() == event.active_id() {
        return DragOutcome::NoOp;
    }

    match (event, over) {
        (DragEvent::ChapterDrag { active_id, .. }, DropTarget::Chapter { id }) => {
            DragOutcome::ChapterMove {
                active_id: active_id.clone(),
                target_id: id.clone(),
            }
        }
        // Dropping a chapter on a lesson reorders relative to the lesson's chapter.
        (DragEvent::ChapterDrag { active_id, .. }, DropTarget::Lesson { chapter_id, .. }) => {
            if chapter_id == active_id {
                DragOutcome::NoOp
            } else {
                DragOutcome::ChapterMove {
                    active_id: active_id.clone(),
                    target_id: chapter_id.clone(),
                }
            }
        }
        (
            DragEvent::LessonDrag {
                active_id,
                chapter_id,
                ..
            },
            DropTarget::Lesson {
                id,
                chapter_id: over_chapter_id,
            },
        ) => {
            if chapter_id == over_chapter_id {
                DragOutcome::LessonMove {
                    active_id: active_id.clone(),
                    target_id: id.clone(),
                }
            } else {
                DragOutcome::RejectedCrossChapterMove {
                    lesson_id: active_id.clone(),
                    from_chapter_id: chapter_id.clone(),
                    to_chapter_id: over_chapter_id.clone(),
                }
            }
        }
        (DragEvent::LessonDrag { .. }, DropTarget::Chapter { .. }) => DragOutcome::NoOp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chapter_target(id: &str) -> Option<DropTarget> {
        Some(DropTarget::Chapter { id: id.into() })
    }

    fn lesson_target(id: &str, chapter_id: &str) -> Option<DropTarget> {
        Some(DropTarget::Lesson {
            id: id.into(),
            chapter_id: chapter_id.into(),
        })
    }

    fn chapter_drag(active: &str, over: Option<DropTarget>) -> DragEvent {
        DragEvent::ChapterDrag {
            active_id: active.into(),
            over,
        }
    }

    fn lesson_drag(active: &str, chapter: &str, over: Option<DropTarget>) -> DragEvent {
        DragEvent::LessonDrag {
            active_id: active.into(),
            chapter_id: chapter.into(),
            over,
        }
    }

    #[test]
    fn chapter_on_chapter_moves() {
        assert_eq!(
            interpret(&chapter_drag("A", chapter_target("C"))),
            DragOutcome::ChapterMove {
                active_id: "A".into(),
                target_id: "C".into()
            }
        );
    }

    #[test]
    fn chapter_on_lesson_targets_owning_chapter() {
        assert_eq!(
            interpret(&chapter_drag("A", lesson_target("M1", "B"))),
            DragOutcome::ChapterMove {
                active_id: "A".into(),
                target_id: "B".into()
            }
        );
    }

    #[test]
    fn chapter_on_own_lesson_is_noop() {
        assert_eq!(
            interpret(&chapter_drag("A", lesson_target("L1", "A"))),
            DragOutcome::NoOp
        );
    }

    #[test]
    fn lesson_on_sibling_moves() {
        assert_eq!(
            interpret(&lesson_drag("L1", "A", lesson_target("L3", "A"))),
            DragOutcome::LessonMove {
                active_id: "L1".into(),
                target_id: "L3".into()
            }
        );
    }

    #[test]
    fn lesson_on_foreign_lesson_is_rejected() {
        assert_eq!(
            interpret(&lesson_drag("L1", "A", lesson_target("M1", "B"))),
            DragOutcome::RejectedCrossChapterMove {
                lesson_id: "L1".into(),
                from_chapter_id: "A".into(),
                to_chapter_id: "B".into()
            }
        );
    }

    #[test]
    fn lesson_on_chapter_header_is_noop() {
        assert_eq!(
            interpret(&lesson_drag("L1", "A", chapter_target("A"))),
            DragOutcome::NoOp
        );
        assert_eq!(
            interpret(&lesson_drag("L1", "A", chapter_target("B"))),
            DragOutcome::NoOp
        );
    }

    #[test]
    fn dropped_outside_is_noop() {
        assert_eq!(interpret(&chapter_drag("A", None)), DragOutcome::NoOp);
        assert_eq!(interpret(&lesson_drag("L1", "A", None)), DragOutcome::NoOp);
    }

    #[test]
    fn dropped_on_itself_is_noop_for_any_role() {
        assert_eq!(interpret(&chapter_drag("A", chapter_target("A"))), DragOutcome::NoOp);
        assert_eq!(
            interpret(&lesson_drag("L1", "A", lesson_target("L1", "A"))),
            DragOutcome::NoOp
        );
        // Same id reported under a different role still counts as itself.
        assert_eq!(
            interpret(&lesson_drag("X", "A", chapter_target("X"))),
            DragOutcome::NoOp
        );
    }

    #[test]
    fn deserializes_tagged_payload() {
        let event: DragEvent = serde_json::from_value(json!({
            "type": "lessonDrag",
            "activeId": "L1",
            "chapterId": "A",
            "over": { "type": "lesson", "id": "L2", "chapterId": "A" }
        }))
        .expect("parse");
        assert_eq!(event, lesson_drag("L1", "A", lesson_target("L2", "A")));

        let event: DragEvent = serde_json::from_value(json!({
            "type": "chapterDrag",
            "activeId": "A"
        }))
        .expect("parse");
        assert_eq!(event, chapter_drag("A", None));
    }

    #[test]
    fn rejects_untyped_payload() {
        let parsed = serde_json::from_value::<DragEvent>(json!({ "activeId": "A" }));
        assert!(parsed.is_err());
    }
}
