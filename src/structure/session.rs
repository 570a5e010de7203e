//! Editing session for one course: optimistic local apply followed by
//! reconciliation with the persistence service.
//!
//! Every structural mutation is a two-phase commit. `begin_*` validates and
//! applies the change to the tree, captures what is needed to undo it, and
//! returns a [`PendingReconciliation`] carrying exactly one [`PersistCall`].
//! [`EditorSession::settle`] consumes that value together with the store's
//! answer. Pending values may be settled in any order.
//!
//! Each pending value is stamped with a sequence number and registered as the
//! latest mutation of its [`Scope`]. A failed reconciliation only restores the
//! captured order or title when nothing newer was issued for that scope, so a
//! slow failure can never clobber a later move. Inverse structural undos
//! (dropping an optimistically created chapter, re-inserting a deleted item)
//! always apply.
//!
//! The session also tracks the last order each parent is known to have in
//! storage. The store appends items missing from a position batch, so a
//! re-inserted item, or one that a restored order does not mention, is put
//! back after its stored predecessor. Settling everything therefore leaves
//! the tree in the stored order.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::drag::{interpret, DragEvent, DragOutcome};
use super::error::StructureError;
use super::notify::{NoticeKind, NotificationSink};
use super::persist::{ActionResult, CourseStore, PersistCall};
use super::tree::{Chapter, CourseTree, Lesson, LessonPosition, TitleRules};
use crate::db::ChapterRecord;

/// Part of the tree a mutation's undo data covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    ChapterOrder,
    LessonOrder(String),
    ChapterTitle(String),
    ChapterItem(String),
    LessonItem(String),
}

#[derive(Debug, Clone)]
enum Undo {
    ChapterOrder(Vec<String>),
    LessonOrder { chapter_id: String, order: Vec<String> },
    Title { chapter_id: String, title: String },
    DropChapter { chapter_id: String },
    RestoreChapter { index: usize, chapter: Chapter },
    RestoreLesson { chapter_id: String, index: usize, lesson: Lesson },
}

impl Undo {
    /// Structural undos repair the item set and must run even when stale.
    fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DropChapter { .. } | Self::RestoreChapter { .. } | Self::RestoreLesson { .. }
        )
    }
}

#[derive(Debug)]
#[must_use = "a pending reconciliation must be settled"]
pub struct PendingReconciliation {
    seq: u64,
    scope: Scope,
    call: PersistCall,
    undo: Undo,
}

impl PendingReconciliation {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn call(&self) -> &PersistCall {
        &self.call
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Committed { message: String },
    RolledBack { error: StructureError },
    /// Failed, but a newer mutation owns the scope, so local state was kept.
    Superseded { error: StructureError },
}

/// Result of one user action as reported back to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Applied,
    RolledBack,
    Superseded,
    Noop,
    Rejected,
    NotFound,
    Invalid,
}

impl Outcome {
    fn from_error(err: &StructureError) -> Self {
        match err {
            StructureError::NotFound { .. } => Self::NotFound,
            StructureError::CrossParentMoveRejected { .. } => Self::Rejected,
            StructureError::EmptyTitle
            | StructureError::TitleTooLong { .. }
            | StructureError::DuplicateId { .. } => Self::Invalid,
            StructureError::PersistenceFailure { .. } => Self::RolledBack,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub title_rules: TitleRules,
    pub expand_chapters: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            title_rules: TitleRules::default(),
            expand_chapters: true,
        }
    }
}

#[derive(Debug)]
pub struct EditorSession {
    course_id: String,
    tree: CourseTree,
    options: SessionOptions,
    next_seq: u64,
    latest: HashMap<Scope, u64>,
    in_flight: HashSet<u64>,
    /// Last order known to be stored, keyed by `ChapterOrder` and `LessonOrder`.
    stored: HashMap<Scope, Vec<String>>,
}

impl EditorSession {
    pub fn open(course_id: impl Into<String>, chapters: &[ChapterRecord], options: SessionOptions) -> Self {
        let tree = CourseTree::from_snapshot(chapters, options.expand_chapters);
        let mut stored = HashMap::new();
        stored.insert(Scope::ChapterOrder, tree.chapter_order());
        for chapter in tree.chapters() {
            stored.insert(
                Scope::LessonOrder(chapter.id.clone()),
                chapter.lessons.iter().map(|l| l.id.clone()).collect(),
            );
        }
        Self {
            course_id: course_id.into(),
            tree,
            options,
            next_seq: 1,
            latest: HashMap::new(),
            in_flight: HashSet::new(),
            stored,
        }
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn tree(&self) -> &CourseTree {
        &self.tree
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// View-state only; never produces a persistence call.
    pub fn toggle_expanded(&mut self, chapter_id: &str) -> Result<bool, StructureError> {
        self.tree.toggle_expanded(chapter_id)
    }

    fn stamp(&mut self, scope: Scope, call: PersistCall, undo: Undo) -> PendingReconciliation {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.latest.insert(scope.clone(), seq);
        self.in_flight.insert(seq);
        debug!(seq, ?scope, call = call.name(), "mutation applied locally");
        PendingReconciliation {
            seq,
            scope,
            call,
            undo,
        }
    }

    /// Applies an interpreted drag. `Ok(None)` means nothing changed and no
    /// call is needed.
    pub fn begin_drag(&mut self, outcome: &DragOutcome) -> Result<Option<PendingReconciliation>, StructureError> {
        match outcome {
            DragOutcome::NoOp => Ok(None),
            DragOutcome::ChapterMove {
                active_id,
                target_id,
            } => self.begin_chapter_move(active_id, target_id).map(Some),
            DragOutcome::LessonMove {
                active_id,
                target_id,
            } => self.begin_lesson_move(active_id, target_id).map(Some),
            DragOutcome::RejectedCrossChapterMove {
                lesson_id,
                from_chapter_id,
                to_chapter_id,
            } => Err(StructureError::CrossParentMoveRejected {
                lesson_id: lesson_id.clone(),
                from_chapter_id: from_chapter_id.clone(),
                to_chapter_id: to_chapter_id.clone(),
            }),
        }
    }

    pub fn begin_chapter_move(&mut self, chapter_id: &str, target_id: &str) -> Result<PendingReconciliation, StructureError> {
        let before = self.tree.chapter_order();
        self.tree.move_chapter(chapter_id, target_id)?;
        let call = PersistCall::UpdateChapterPositions {
            course_id: self.course_id.clone(),
            chapter_ids: self.tree.chapter_order(),
        };
        Ok(self.stamp(Scope::ChapterOrder, call, Undo::ChapterOrder(before)))
    }

    pub fn begin_lesson_move(&mut self, lesson_id: &str, target_id: &str) -> Result<PendingReconciliation, StructureError> {
        let chapter_id = self
            .tree
            .lesson_parent(lesson_id)
            .ok_or_else(|| StructureError::lesson_not_found(lesson_id))?
            .to_string();
        let before = self
            .tree
            .lesson_order(&chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(&chapter_id))?;
        self.tree.move_lesson(lesson_id, target_id)?;
        let positions = self
            .tree
            .lesson_positions(&chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(&chapter_id))?;
        let call = PersistCall::UpdateLessonPositions {
            chapter_id: chapter_id.clone(),
            positions,
        };
        Ok(self.stamp(
            Scope::LessonOrder(chapter_id.clone()),
            call,
            Undo::LessonOrder {
                chapter_id,
                order: before,
            },
        ))
    }

    pub fn begin_rename_chapter(&mut self, chapter_id: &str, title: &str) -> Result<PendingReconciliation, StructureError> {
        let previous = self
            .tree
            .rename_chapter(chapter_id, title, &self.options.title_rules)?;
        let applied = self
            .tree
            .chapter(chapter_id)
            .map(|c| c.title.clone())
            .unwrap_or_default();
        let call = PersistCall::RenameChapter {
            chapter_id: chapter_id.to_string(),
            title: applied,
        };
        Ok(self.stamp(
            Scope::ChapterTitle(chapter_id.to_string()),
            call,
            Undo::Title {
                chapter_id: chapter_id.to_string(),
                title: previous,
            },
        ))
    }

    /// Adds a chapter at the end with a fresh id that the store will reuse.
    pub fn begin_create_chapter(&mut self, title: &str) -> Result<PendingReconciliation, StructureError> {
        let title = self.options.title_rules.validate(title)?;
        let chapter_id = Uuid::new_v4().to_string();
        self.tree.insert_chapter(Chapter::new(
            chapter_id.clone(),
            title.clone(),
            self.options.expand_chapters,
        ))?;
        let call = PersistCall::CreateChapter {
            course_id: self.course_id.clone(),
            chapter_id: chapter_id.clone(),
            title,
        };
        Ok(self.stamp(
            Scope::ChapterItem(chapter_id.clone()),
            call,
            Undo::DropChapter { chapter_id },
        ))
    }

    pub fn begin_delete_chapter(&mut self, chapter_id: &str) -> Result<PendingReconciliation, StructureError> {
        let (index, chapter) = self.tree.remove_chapter(chapter_id)?;
        let call = PersistCall::DeleteChapter {
            chapter_id: chapter_id.to_string(),
        };
        Ok(self.stamp(
            Scope::ChapterItem(chapter_id.to_string()),
            call,
            Undo::RestoreChapter { index, chapter },
        ))
    }

    pub fn begin_delete_lesson(&mut self, lesson_id: &str) -> Result<PendingReconciliation, StructureError> {
        let chapter_id = self
            .tree
            .lesson_parent(lesson_id)
            .ok_or_else(|| StructureError::lesson_not_found(lesson_id))?
            .to_string();
        let (index, lesson) = self.tree.remove_lesson(lesson_id)?;
        let call = PersistCall::DeleteLesson {
            lesson_id: lesson_id.to_string(),
        };
        Ok(self.stamp(
            Scope::LessonItem(lesson_id.to_string()),
            call,
            Undo::RestoreLesson {
                chapter_id,
                index,
                lesson,
            },
        ))
    }

    /// Applies the store's answer for a pending mutation.
    pub fn settle(
        &mut self,
        pending: PendingReconciliation,
        result: &ActionResult,
        sink: &mut dyn NotificationSink,
    ) -> Settlement {
        let PendingReconciliation {
            seq,
            scope,
            call,
            undo,
        } = pending;
        self.in_flight.remove(&seq);
        let is_latest = self.latest.get(&scope) == Some(&seq);
        if is_latest {
            self.latest.remove(&scope);
        }

        if let ActionResult::Success { message } = result {
            info!(seq, call = call.name(), "reconciled");
            self.record_stored(&call);
            if is_latest {
                self.adopt_stored_order(&call);
            }
            sink.notify(NoticeKind::Success, message);
            return Settlement::Committed {
                message: message.clone(),
            };
        }

        let error = StructureError::PersistenceFailure {
            message: result.message().to_string(),
        };
        sink.notify(NoticeKind::Error, result.message());

        if !is_latest && !undo.is_structural() {
            warn!(seq, ?scope, call = call.name(), "stale failure, newer mutation kept");
            return Settlement::Superseded { error };
        }

        warn!(seq, ?scope, call = call.name(), reason = result.message(), "rolling back");
        if let Err(e) = self.undo(undo) {
            // The item the undo targets is already gone locally.
            debug!(seq, error = %e, "rollback target missing");
        }
        Settlement::RolledBack { error }
    }

    fn undo(&mut self, undo: Undo) -> Result<(), StructureError> {
        match undo {
            Undo::ChapterOrder(order) => {
                self.tree.restore_chapter_order(&order);
                self.place_unlisted(&Scope::ChapterOrder, &order)
            }
            Undo::LessonOrder { chapter_id, order } => {
                self.tree.restore_lesson_order(&chapter_id, &order)?;
                self.place_unlisted(&Scope::LessonOrder(chapter_id), &order)
            }
            Undo::Title { chapter_id, title } => self.tree.set_chapter_title(&chapter_id, title),
            Undo::DropChapter { chapter_id } => self.tree.remove_chapter(&chapter_id).map(|_| ()),
            Undo::RestoreChapter { index, chapter } => {
                let chapter_id = chapter.id.clone();
                self.tree.restore_chapter(index, chapter)?;
                let others = without(self.tree.chapter_order(), &chapter_id);
                self.place_unlisted(&Scope::ChapterOrder, &others)
            }
            Undo::RestoreLesson {
                chapter_id,
                index,
                lesson,
            } => {
                let lesson_id = lesson.id.clone();
                self.tree.restore_lesson(&chapter_id, index, lesson)?;
                let others = self
                    .tree
                    .lesson_order(&chapter_id)
                    .map(|order| without(order, &lesson_id))
                    .unwrap_or_default();
                self.place_unlisted(&Scope::LessonOrder(chapter_id), &others)
            }
        }
    }

    /// Folds a committed call into the stored orders, using the store's rule
    /// for position batches: listed ids first, the rest after in stored order.
    fn record_stored(&mut self, call: &PersistCall) {
        match call {
            PersistCall::UpdateChapterPositions { chapter_ids, .. } => {
                merge_batch(self.stored.entry(Scope::ChapterOrder).or_default(), chapter_ids);
            }
            PersistCall::UpdateLessonPositions { chapter_id, positions } => {
                merge_batch(
                    self.stored.entry(Scope::LessonOrder(chapter_id.clone())).or_default(),
                    &batch_order(positions),
                );
            }
            PersistCall::CreateChapter { chapter_id, .. } => {
                self.stored
                    .entry(Scope::ChapterOrder)
                    .or_default()
                    .push(chapter_id.clone());
                self.stored.insert(Scope::LessonOrder(chapter_id.clone()), Vec::new());
            }
            PersistCall::RenameChapter { .. } => {}
            PersistCall::DeleteChapter { chapter_id } => {
                if let Some(order) = self.stored.get_mut(&Scope::ChapterOrder) {
                    order.retain(|id| id != chapter_id);
                }
                self.stored.remove(&Scope::LessonOrder(chapter_id.clone()));
            }
            PersistCall::DeleteLesson { lesson_id } => {
                for (scope, order) in self.stored.iter_mut() {
                    if matches!(scope, Scope::LessonOrder(_)) {
                        order.retain(|id| id != lesson_id);
                    }
                }
            }
        }
    }

    /// Brings the tree in line with a committed position batch that is still
    /// the newest order for its scope.
    fn adopt_stored_order(&mut self, call: &PersistCall) {
        let adopted = match call {
            PersistCall::UpdateChapterPositions { chapter_ids, .. } => {
                self.tree.restore_chapter_order(chapter_ids);
                self.place_unlisted(&Scope::ChapterOrder, chapter_ids)
            }
            PersistCall::UpdateLessonPositions { chapter_id, positions } => {
                let order = batch_order(positions);
                self.tree
                    .restore_lesson_order(chapter_id, &order)
                    .and_then(|_| self.place_unlisted(&Scope::LessonOrder(chapter_id.clone()), &order))
            }
            _ => Ok(()),
        };
        if let Err(e) = adopted {
            debug!(error = %e, call = call.name(), "committed order no longer applies");
        }
    }

    /// Puts every item of `scope` that `listed` leaves out right after its
    /// nearest stored predecessor still present in the tree.
    fn place_unlisted(&mut self, scope: &Scope, listed: &[String]) -> Result<(), StructureError> {
        let Some(stored) = self.stored.get(scope).cloned() else {
            return Ok(());
        };
        for (idx, id) in stored.iter().enumerate() {
            if listed.contains(id) || !self.in_scope(scope, id) {
                continue;
            }
            let predecessor = stored[..idx]
                .iter()
                .rev()
                .find(|p| self.in_scope(scope, p))
                .cloned();
            match scope {
                Scope::ChapterOrder => self.tree.place_chapter_after(id, predecessor.as_deref())?,
                Scope::LessonOrder(chapter_id) => {
                    self.tree
                        .place_lesson_after(chapter_id, id, predecessor.as_deref())?
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn in_scope(&self, scope: &Scope, id: &str) -> bool {
        match scope {
            Scope::ChapterOrder => self.tree.chapter(id).is_some(),
            Scope::LessonOrder(chapter_id) => self.tree.lesson_parent(id) == Some(chapter_id.as_str()),
            _ => false,
        }
    }

    /// Issues the pending call against `store` and settles it right away.
    pub fn reconcile(
        &mut self,
        pending: PendingReconciliation,
        store: &dyn CourseStore,
        sink: &mut dyn NotificationSink,
    ) -> Settlement {
        debug!(seq = pending.seq(), scope = ?pending.scope(), "dispatching to store");
        let result = pending.call().dispatch(store);
        self.settle(pending, &result, sink)
    }

    /// Runs a `begin_*` result to completion and reports the outcome.
    /// Local validation failures are surfaced through the sink.
    pub fn commit(
        &mut self,
        begun: Result<Option<PendingReconciliation>, StructureError>,
        store: &dyn CourseStore,
        sink: &mut dyn NotificationSink,
    ) -> Outcome {
        match begun {
            Ok(None) => Outcome::Noop,
            Ok(Some(pending)) => match self.reconcile(pending, store, sink) {
                Settlement::Committed { .. } => Outcome::Applied,
                Settlement::RolledBack { .. } => Outcome::RolledBack,
                Settlement::Superseded { .. } => Outcome::Superseded,
            },
            Err(e) => {
                debug!(error = %e, code = e.code(), "mutation refused locally");
                sink.notify(NoticeKind::Error, &e.to_string());
                Outcome::from_error(&e)
            }
        }
    }

    pub fn handle_drag(
        &mut self,
        event: &DragEvent,
        store: &dyn CourseStore,
        sink: &mut dyn NotificationSink,
    ) -> Outcome {
        let outcome = interpret(event);
        let begun = self.begin_drag(&outcome);
        self.commit(begun, store, sink)
    }
}

fn without(mut ids: Vec<String>, id: &str) -> Vec<String> {
    ids.retain(|other| other != id);
    ids
}

fn batch_order(positions: &[LessonPosition]) -> Vec<String> {
    let mut sorted: Vec<&LessonPosition> = positions.iter().collect();
    sorted.sort_by_key(|p| p.position);
    sorted.into_iter().map(|p| p.id.clone()).collect()
}

fn merge_batch(stored: &mut Vec<String>, batch: &[String]) {
    let mut merged: Vec<String> = Vec::with_capacity(stored.len());
    for id in batch {
        if stored.contains(id) && !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    for id in stored.iter() {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    *stored = merged;
}
