use anyhow::{anyhow, bail};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::structure::LessonPosition;

pub const DB_FILE_NAME: &str = "coursed.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chapters(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_chapters_course_position ON chapters(course_id, position)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons(
            id TEXT PRIMARY KEY,
            chapter_id TEXT NOT NULL,
            title TEXT NOT NULL,
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(chapter_id) REFERENCES chapters(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_chapter_position ON lessons(chapter_id, position)",
        [],
    )?;

    // Workspaces created before lesson descriptions existed lack the column.
    ensure_lessons_description(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_lessons_description(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "lessons", "description")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE lessons ADD COLUMN description TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        params![key, serde_json::to_string(value)?],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub chapter_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: String,
    pub title: String,
    pub chapters: Vec<ChapterRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub id: String,
    pub title: String,
    pub position: i64,
    pub lessons: Vec<LessonRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub position: i64,
}

pub fn insert_course(conn: &Connection, title: &str) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let ts = now_ts();
    conn.execute(
        "INSERT INTO courses(id, title, created_at, updated_at) VALUES(?, ?, ?, ?)",
        params![id, title, ts, ts],
    )?;
    Ok(id)
}

pub fn list_courses(conn: &Connection) -> anyhow::Result<Vec<CourseSummary>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.title, (SELECT COUNT(*) FROM chapters ch WHERE ch.course_id = c.id)
         FROM courses c
         ORDER BY c.created_at, c.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(CourseSummary {
                id: r.get(0)?,
                title: r.get(1)?,
                chapter_count: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn course_exists(conn: &Connection, course_id: &str) -> anyhow::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |_r| Ok(()))
        .optional()?
        .is_some())
}

/// Persisted snapshot of a course with chapters and lessons ordered by position.
pub fn load_course(conn: &Connection, course_id: &str) -> anyhow::Result<Option<CourseRecord>> {
    let title: Option<String> = conn
        .query_row("SELECT title FROM courses WHERE id = ?", [course_id], |r| r.get(0))
        .optional()?;
    let Some(title) = title else {
        return Ok(None);
    };

    let mut chapter_stmt = conn.prepare(
        "SELECT id, title, position FROM chapters WHERE course_id = ? ORDER BY position, id",
    )?;
    let mut chapters = chapter_stmt
        .query_map([course_id], |r| {
            Ok(ChapterRecord {
                id: r.get(0)?,
                title: r.get(1)?,
                position: r.get(2)?,
                lessons: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut lesson_stmt = conn.prepare(
        "SELECT id, title, description, position FROM lessons WHERE chapter_id = ? ORDER BY position, id",
    )?;
    for chapter in chapters.iter_mut() {
        chapter.lessons = lesson_stmt
            .query_map([&chapter.id], |r| {
                Ok(LessonRecord {
                    id: r.get(0)?,
                    title: r.get(1)?,
                    description: r.get(2)?,
                    position: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
    }

    Ok(Some(CourseRecord {
        id: course_id.to_string(),
        title,
        chapters,
    }))
}

fn next_position(conn: &Connection, table: &str, parent_column: &str, parent_id: &str) -> anyhow::Result<i64> {
    let sql = format!(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM {} WHERE {} = ?",
        table, parent_column
    );
    let next: i64 = conn.query_row(&sql, [parent_id], |r| r.get(0))?;
    Ok(next.max(1))
}

/// Inserts a chapter at the end of the course. A caller-supplied id lets an
/// editing session create the row it already shows optimistically.
pub fn insert_chapter(
    conn: &Connection,
    course_id: &str,
    chapter_id: Option<&str>,
    title: &str,
) -> anyhow::Result<(String, i64)> {
    if !course_exists(conn, course_id)? {
        bail!("Course not found");
    }
    let id = chapter_id
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let position = next_position(conn, "chapters", "course_id", course_id)?;
    let ts = now_ts();
    conn.execute(
        "INSERT INTO chapters(id, course_id, title, position, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![id, course_id, title, position, ts, ts],
    )?;
    Ok((id, position))
}

pub fn insert_lesson(
    conn: &Connection,
    chapter_id: &str,
    title: &str,
    description: &str,
) -> anyhow::Result<(String, i64)> {
    let exists = conn
        .query_row("SELECT 1 FROM chapters WHERE id = ?", [chapter_id], |_r| Ok(()))
        .optional()?
        .is_some();
    if !exists {
        bail!("Chapter not found");
    }
    let id = Uuid::new_v4().to_string();
    let position = next_position(conn, "lessons", "chapter_id", chapter_id)?;
    let ts = now_ts();
    conn.execute(
        "INSERT INTO lessons(id, chapter_id, title, description, position, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![id, chapter_id, title, description, position, ts, ts],
    )?;
    Ok((id, position))
}

pub fn rename_chapter(conn: &Connection, chapter_id: &str, title: &str) -> anyhow::Result<()> {
    let changed = conn.execute(
        "UPDATE chapters SET title = ?, updated_at = ? WHERE id = ?",
        params![title, now_ts(), chapter_id],
    )?;
    if changed == 0 {
        bail!("Chapter not found");
    }
    Ok(())
}

/// Deletes a chapter and its lessons, closing the gap it leaves in the
/// course's chapter positions. Returns the number of lessons removed.
pub fn delete_chapter(conn: &Connection, chapter_id: &str) -> anyhow::Result<usize> {
    let course_id: Option<String> = conn
        .query_row(
            "SELECT course_id FROM chapters WHERE id = ?",
            [chapter_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(course_id) = course_id else {
        bail!("Chapter not found");
    };
    let lesson_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM lessons WHERE chapter_id = ?",
        [chapter_id],
        |r| r.get(0),
    )?;

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM chapters WHERE id = ?", [chapter_id])?;
    renumber(&tx, "chapters", "course_id", &course_id)?;
    tx.commit()?;
    Ok(lesson_count.max(0) as usize)
}

pub fn delete_lesson(conn: &Connection, lesson_id: &str) -> anyhow::Result<()> {
    let chapter_id: Option<String> = conn
        .query_row(
            "SELECT chapter_id FROM lessons WHERE id = ?",
            [lesson_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(chapter_id) = chapter_id else {
        bail!("Lesson not found");
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM lessons WHERE id = ?", [lesson_id])?;
    renumber(&tx, "lessons", "chapter_id", &chapter_id)?;
    tx.commit()?;
    Ok(())
}

fn renumber(conn: &Connection, table: &str, parent_column: &str, parent_id: &str) -> anyhow::Result<()> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ? ORDER BY position, id",
        table, parent_column
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([parent_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let update = format!("UPDATE {} SET position = ?, updated_at = ? WHERE id = ?", table);
    let ts = now_ts();
    for (idx, id) in ids.iter().enumerate() {
        conn.execute(&update, params![idx as i64 + 1, ts, id])?;
    }
    Ok(())
}

fn existing_order(conn: &Connection, table: &str, parent_column: &str, parent_id: &str) -> anyhow::Result<Vec<String>> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ? ORDER BY position, id",
        table, parent_column
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([parent_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Writes chapter positions 1..N in the given order inside one transaction.
/// Chapters of the course missing from `ordered_ids` keep their relative order
/// after the provided ones. Any id that does not belong to the course, or that
/// appears twice, aborts the whole batch.
pub fn update_chapter_positions(
    conn: &Connection,
    course_id: &str,
    ordered_ids: &[String],
) -> anyhow::Result<()> {
    if !course_exists(conn, course_id)? {
        bail!("Course not found");
    }
    let existing = existing_order(conn, "chapters", "course_id", course_id)?;
    let existing_set: HashSet<&str> = existing.iter().map(|s| s.as_str()).collect();
    let mut seen = HashSet::new();
    let mut final_order: Vec<String> = Vec::new();
    for id in ordered_ids {
        if !existing_set.contains(id.as_str()) {
            bail!("chapter id not found for course: {}", id);
        }
        if !seen.insert(id.clone()) {
            bail!("duplicate chapter id in batch: {}", id);
        }
        final_order.push(id.clone());
    }
    for id in existing {
        if !seen.contains(&id) {
            final_order.push(id);
        }
    }

    let tx = conn.unchecked_transaction()?;
    let ts = now_ts();
    for (idx, id) in final_order.iter().enumerate() {
        tx.execute(
            "UPDATE chapters SET position = ?, updated_at = ? WHERE course_id = ? AND id = ?",
            params![idx as i64 + 1, ts, course_id, id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Applies explicit lesson positions for one chapter inside one transaction.
/// Lessons of the chapter that are not part of the batch are placed after the
/// batch in their current order so positions stay dense.
pub fn update_lesson_positions(
    conn: &Connection,
    chapter_id: &str,
    positions: &[LessonPosition],
) -> anyhow::Result<()> {
    if positions.is_empty() {
        bail!("No lessons provided for reordering");
    }
    let existing = existing_order(conn, "lessons", "chapter_id", chapter_id)?;
    let existing_set: HashSet<&str> = existing.iter().map(|s| s.as_str()).collect();
    let mut seen_ids = HashSet::new();
    let mut seen_positions = HashSet::new();
    for p in positions {
        if !existing_set.contains(p.id.as_str()) {
            bail!("lesson id not found for chapter: {}", p.id);
        }
        if p.position < 1 {
            bail!("lesson position must be >= 1: {}", p.id);
        }
        if !seen_ids.insert(p.id.as_str()) {
            return Err(anyhow!("duplicate lesson id in batch: {}", p.id));
        }
        if !seen_positions.insert(p.position) {
            return Err(anyhow!("duplicate lesson position in batch: {}", p.position));
        }
    }

    let mut ordered: Vec<&LessonPosition> = positions.iter().collect();
    ordered.sort_by_key(|p| p.position);
    let mut final_order: Vec<&str> = ordered.iter().map(|p| p.id.as_str()).collect();
    for id in &existing {
        if !seen_ids.contains(id.as_str()) {
            final_order.push(id.as_str());
        }
    }

    let tx = conn.unchecked_transaction()?;
    let ts = now_ts();
    for (idx, id) in final_order.iter().enumerate() {
        tx.execute(
            "UPDATE lessons SET position = ?, updated_at = ? WHERE chapter_id = ? AND id = ?",
            params![idx as i64 + 1, ts, chapter_id, id],
        )?;
    }
    tx.commit()?;
    Ok(())
}
