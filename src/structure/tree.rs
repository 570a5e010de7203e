//! In-memory ordered two-level course structure.
//!
//! Every operation validates before it mutates, so a failed call leaves the
//! tree exactly as it was. Positions are always renumbered densely from 1.

use serde::{Deserialize, Serialize};

use super::error::StructureError;
use crate::db::ChapterRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub position: i64,
    pub chapter_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub position: i64,
    pub lessons: Vec<Lesson>,
    pub expanded: bool,
}

impl Chapter {
    pub fn new(id: impl Into<String>, title: impl Into<String>, expanded: bool) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            position: 0,
            lessons: Vec::new(),
            expanded,
        }
    }

    fn lesson_index(&self, lesson_id: &str) -> Option<usize> {
        self.lessons.iter().position(|l| l.id == lesson_id)
    }

    fn renumber_lessons(&mut self) {
        for (idx, lesson) in self.lessons.iter_mut().enumerate() {
            lesson.position = idx as i64 + 1;
            lesson.chapter_id = self.id.clone();
        }
    }
}

/// Lesson id with the position it should be persisted at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonPosition {
    pub id: String,
    pub position: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct TitleRules {
    pub max_len: usize,
}

impl Default for TitleRules {
    fn default() -> Self {
        Self { max_len: 200 }
    }
}

impl TitleRules {
    /// Returns the trimmed title or the validation failure.
    pub fn validate(&self, title: &str) -> Result<String, StructureError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(StructureError::EmptyTitle);
        }
        if trimmed.chars().count() > self.max_len {
            return Err(StructureError::TitleTooLong { max: self.max_len });
        }
        Ok(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTree {
    chapters: Vec<Chapter>,
}

impl CourseTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(chapters: &[ChapterRecord], expanded: bool) -> Self {
        let mut tree = Self::new();
        tree.load_snapshot(chapters, expanded);
        tree
    }

    /// Replaces the whole tree with a persisted snapshot. Source positions
    /// only decide order; gaps and duplicates are normalized away.
    pub fn load_snapshot(&mut self, chapters: &[ChapterRecord], expanded: bool) {
        let mut sorted: Vec<&ChapterRecord> = chapters.iter().collect();
        sorted.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));

        self.chapters = sorted
            .into_iter()
            .map(|record| {
                let mut lessons: Vec<_> = record.lessons.iter().collect();
                lessons.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
                let mut chapter = Chapter::new(record.id.clone(), record.title.clone(), expanded);
                chapter.lessons = lessons
                    .into_iter()
                    .map(|l| Lesson {
                        id: l.id.clone(),
                        title: l.title.clone(),
                        position: 0,
                        chapter_id: record.id.clone(),
                    })
                    .collect();
                chapter.renumber_lessons();
                chapter
            })
            .collect();
        self.renumber_chapters();
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, chapter_id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == chapter_id)
    }

    pub fn lesson(&self, lesson_id: &str) -> Option<&Lesson> {
        self.chapters
            .iter()
            .flat_map(|c| c.lessons.iter())
            .find(|l| l.id == lesson_id)
    }

    /// Id of the chapter that owns `lesson_id`.
    pub fn lesson_parent(&self, lesson_id: &str) -> Option<&str> {
        self.lesson(lesson_id).map(|l| l.chapter_id.as_str())
    }

    pub fn chapter_order(&self) -> Vec<String> {
        self.chapters.iter().map(|c| c.id.clone()).collect()
    }

    pub fn lesson_order(&self, chapter_id: &str) -> Option<Vec<String>> {
        self.chapter(chapter_id)
            .map(|c| c.lessons.iter().map(|l| l.id.clone()).collect())
    }

    pub fn lesson_positions(&self, chapter_id: &str) -> Option<Vec<LessonPosition>> {
        self.chapter(chapter_id).map(|c| {
            c.lessons
                .iter()
                .map(|l| LessonPosition {
                    id: l.id.clone(),
                    position: l.position,
                })
                .collect()
        })
    }

    fn chapter_index(&self, chapter_id: &str) -> Option<usize> {
        self.chapters.iter().position(|c| c.id == chapter_id)
    }

    fn chapter_mut(&mut self, chapter_id: &str) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.id == chapter_id)
    }

    fn renumber_chapters(&mut self) {
        for (idx, chapter) in self.chapters.iter_mut().enumerate() {
            chapter.position = idx as i64 + 1;
        }
    }

    /// Moves `chapter_id` to the index currently held by `target_chapter_id`.
    pub fn move_chapter(&mut self, chapter_id: &str, target_chapter_id: &str) -> Result<(), StructureError> {
        let from = self
            .chapter_index(chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(chapter_id))?;
        let to = self
            .chapter_index(target_chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(target_chapter_id))?;
        array_move(&mut self.chapters, from, to);
        self.renumber_chapters();
        Ok(())
    }

    /// Moves a lesson to the index held by `target_lesson_id` within the same
    /// chapter. Lessons never change chapter.
    pub fn move_lesson(&mut self, lesson_id: &str, target_lesson_id: &str) -> Result<(), StructureError> {
        let parent = self
            .lesson_parent(lesson_id)
            .ok_or_else(|| StructureError::lesson_not_found(lesson_id))?
            .to_string();
        let target_parent = self
            .lesson_parent(target_lesson_id)
            .ok_or_else(|| StructureError::lesson_not_found(target_lesson_id))?;
        if parent != target_parent {
            return Err(StructureError::CrossParentMoveRejected {
                lesson_id: lesson_id.to_string(),
                from_chapter_id: parent,
                to_chapter_id: target_parent.to_string(),
            });
        }

        let chapter = self
            .chapter_mut(&parent)
            .ok_or_else(|| StructureError::chapter_not_found(&parent))?;
        let from = chapter
            .lesson_index(lesson_id)
            .ok_or_else(|| StructureError::lesson_not_found(lesson_id))?;
        let to = chapter
            .lesson_index(target_lesson_id)
            .ok_or_else(|| StructureError::lesson_not_found(target_lesson_id))?;
        array_move(&mut chapter.lessons, from, to);
        chapter.renumber_lessons();
        Ok(())
    }

    /// Renames a chapter and returns the title it replaced.
    pub fn rename_chapter(
        &mut self,
        chapter_id: &str,
        title: &str,
        rules: &TitleRules,
    ) -> Result<String, StructureError> {
        let title = rules.validate(title)?;
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(chapter_id))?;
        Ok(std::mem::replace(&mut chapter.title, title))
    }

    /// Flips view state and returns the new value.
    pub fn toggle_expanded(&mut self, chapter_id: &str) -> Result<bool, StructureError> {
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(chapter_id))?;
        chapter.expanded = !chapter.expanded;
        Ok(chapter.expanded)
    }

    /// Appends a chapter as the last position.
    pub fn insert_chapter(&mut self, chapter: Chapter) -> Result<(), StructureError> {
        if self.chapter_index(&chapter.id).is_some() {
            return Err(StructureError::DuplicateId {
                kind: super::error::ItemKind::Chapter,
                id: chapter.id,
            });
        }
        let mut chapter = chapter;
        chapter.renumber_lessons();
        self.chapters.push(chapter);
        self.renumber_chapters();
        Ok(())
    }

    /// Removes a chapter with its lessons; returns it with its former index.
    pub fn remove_chapter(&mut self, chapter_id: &str) -> Result<(usize, Chapter), StructureError> {
        let idx = self
            .chapter_index(chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(chapter_id))?;
        let removed = self.chapters.remove(idx);
        self.renumber_chapters();
        Ok((idx, removed))
    }

    pub fn remove_lesson(&mut self, lesson_id: &str) -> Result<(usize, Lesson), StructureError> {
        let parent = self
            .lesson_parent(lesson_id)
            .ok_or_else(|| StructureError::lesson_not_found(lesson_id))?
            .to_string();
        let chapter = self
            .chapter_mut(&parent)
            .ok_or_else(|| StructureError::chapter_not_found(&parent))?;
        let idx = chapter
            .lesson_index(lesson_id)
            .ok_or_else(|| StructureError::lesson_not_found(lesson_id))?;
        let removed = chapter.lessons.remove(idx);
        chapter.renumber_lessons();
        Ok((idx, removed))
    }

    pub fn restore_chapter(&mut self, index: usize, chapter: Chapter) -> Result<(), StructureError> {
        if self.chapter_index(&chapter.id).is_some() {
            return Err(StructureError::DuplicateId {
                kind: super::error::ItemKind::Chapter,
                id: chapter.id,
            });
        }
        let idx = index.min(self.chapters.len());
        self.chapters.insert(idx, chapter);
        self.renumber_chapters();
        Ok(())
    }

    pub fn restore_lesson(&mut self, chapter_id: &str, index: usize, lesson: Lesson) -> Result<(), StructureError> {
        if self.lesson(&lesson.id).is_some() {
            return Err(StructureError::DuplicateId {
                kind: super::error::ItemKind::Lesson,
                id: lesson.id,
            });
        }
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(chapter_id))?;
        let idx = index.min(chapter.lessons.len());
        chapter.lessons.insert(idx, lesson);
        chapter.renumber_lessons();
        Ok(())
    }

    /// Moves a chapter to directly after `predecessor`, or to the front when
    /// there is none.
    pub fn place_chapter_after(&mut self, chapter_id: &str, predecessor: Option<&str>) -> Result<(), StructureError> {
        let from = self
            .chapter_index(chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(chapter_id))?;
        let to = match predecessor {
            Some(p) => {
                let idx = self
                    .chapter_index(p)
                    .ok_or_else(|| StructureError::chapter_not_found(p))?;
                if idx < from { idx + 1 } else { idx }
            }
            None => 0,
        };
        array_move(&mut self.chapters, from, to);
        self.renumber_chapters();
        Ok(())
    }

    pub fn place_lesson_after(
        &mut self,
        chapter_id: &str,
        lesson_id: &str,
        predecessor: Option<&str>,
    ) -> Result<(), StructureError> {
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(chapter_id))?;
        let from = chapter
            .lesson_index(lesson_id)
            .ok_or_else(|| StructureError::lesson_not_found(lesson_id))?;
        let to = match predecessor {
            Some(p) => {
                let idx = chapter
                    .lesson_index(p)
                    .ok_or_else(|| StructureError::lesson_not_found(p))?;
                if idx < from { idx + 1 } else { idx }
            }
            None => 0,
        };
        array_move(&mut chapter.lessons, from, to);
        chapter.renumber_lessons();
        Ok(())
    }

    /// Reorders chapters to a previously captured id order.
    pub fn restore_chapter_order(&mut self, order: &[String]) {
        reorder_by_ids(&mut self.chapters, order, |c| c.id.as_str());
        self.renumber_chapters();
    }

    pub fn restore_lesson_order(&mut self, chapter_id: &str, order: &[String]) -> Result<(), StructureError> {
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(chapter_id))?;
        reorder_by_ids(&mut chapter.lessons, order, |l| l.id.as_str());
        chapter.renumber_lessons();
        Ok(())
    }

    pub fn set_chapter_title(&mut self, chapter_id: &str, title: String) -> Result<(), StructureError> {
        let chapter = self
            .chapter_mut(chapter_id)
            .ok_or_else(|| StructureError::chapter_not_found(chapter_id))?;
        chapter.title = title;
        Ok(())
    }
}

/// Remove-then-insert list move.
fn array_move<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from == to {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}

/// Items named in `order` come first in that order; the rest keep their
/// relative order after them. Unknown ids are ignored.
fn reorder_by_ids<T>(items: &mut Vec<T>, order: &[String], id_of: impl Fn(&T) -> &str) {
    let mut remaining: Vec<Option<T>> = std::mem::take(items).into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(remaining.len());
    for id in order {
        if let Some(slot) = remaining
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|item| id_of(item) == id.as_str()))
        {
            if let Some(item) = slot.take() {
                out.push(item);
            }
        }
    }
    out.extend(remaining.into_iter().flatten());
    *items = out;
}
