use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use super::categories::{category_belongs_to, ensure_categories_owned};
use super::query::NoteFilter;
use super::{datetime_at, timestamp, utc_now, Database, Result};
use crate::content::{note_slug, sanitize_html};
use crate::models::*;

const NOTE_COLUMNS: &str =
    "n.id, n.title, n.slug, n.content, n.user_id, n.is_pinned, n.created_at, n.updated_at";

/// What a [`CategoryFilter`] narrows the list to once ownership is checked.
enum CategoryScope {
    All,
    Category(i64),
    /// Invalid or foreign category: the answer is empty without querying notes.
    Nothing,
}

impl Database {
    // ============================================================
    // Listing
    // ============================================================

    /// One page of the caller's unpinned notes.
    pub fn list_notes(&self, user_id: i64, query: &NoteListQuery) -> Result<NotePage> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let category_id = match category_scope(&conn, user_id, query.category)? {
            CategoryScope::All => None,
            CategoryScope::Category(id) => Some(id),
            CategoryScope::Nothing => {
                return Ok(NotePage {
                    notes: Vec::new(),
                    meta: PageMeta::empty(query.page, query.limit),
                })
            }
        };

        let filter = NoteFilter::for_owner(user_id, false)
            .search(query.search.as_deref())
            .in_category(category_id);

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM notes n WHERE {}", filter.where_sql()),
            params_from_iter(filter.params()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes n WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            filter.where_sql(),
            query.sort_by.order_clause(),
        );
        let mut params = filter.params().to_vec();
        params.push(Value::Integer(i64::from(query.limit)));
        params.push(Value::Integer(query.offset() as i64));

        let mut stmt = conn.prepare(&sql)?;
        let notes = stmt
            .query_map(params_from_iter(params.iter()), note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NotePage {
            notes: with_categories(&conn, notes)?,
            meta: PageMeta::new(total as u64, query.page, query.limit),
        })
    }

    /// All of the caller's pinned notes, most recently updated first.
    pub fn list_pinned_notes(
        &self,
        user_id: i64,
        category: CategoryFilter,
    ) -> Result<Vec<NoteWithCategories>> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let category_id = match category_scope(&conn, user_id, category)? {
            CategoryScope::All => None,
            CategoryScope::Category(id) => Some(id),
            CategoryScope::Nothing => return Ok(Vec::new()),
        };

        let filter = NoteFilter::for_owner(user_id, true).in_category(category_id);
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes n WHERE {} ORDER BY {}",
            filter.where_sql(),
            SortBy::UpdatedAt.order_clause(),
        );

        let mut stmt = conn.prepare(&sql)?;
        let notes = stmt
            .query_map(params_from_iter(filter.params()), note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        with_categories(&conn, notes)
    }

    pub fn get_note_by_slug(&self, user_id: i64, slug: &str) -> Result<Option<NoteWithCategories>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let Some(note) = find_owned_note(&conn, user_id, slug)? else {
            return Ok(None);
        };
        let categories = categories_of(&conn, note.id)?;
        Ok(Some(NoteWithCategories { note, categories }))
    }

    // ============================================================
    // Mutation
    // ============================================================

    /// Insert a note and its category links in one transaction.
    ///
    /// Fails with [`DbError::UnknownCategories`](super::DbError::UnknownCategories)
    /// without writing anything if a category is not owned by `user_id`.
    pub fn create_note(&self, user_id: i64, input: CreateNoteInput) -> Result<NoteWithCategories> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let now = utc_now();
        let title = input.title.trim().to_string();
        let content = sanitize_html(&input.content);
        let is_pinned = input.is_pinned.unwrap_or(false);
        let category_ids = dedup_ids(input.category_ids.unwrap_or_default());

        let tx = conn.transaction()?;
        ensure_categories_owned(&tx, user_id, &category_ids)?;

        let slug = unique_slug(&tx, note_slug(&title, now))?;
        tx.execute(
            "INSERT INTO notes (title, slug, content, user_id, is_pinned, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                &title,
                &slug,
                &content,
                user_id,
                is_pinned,
                timestamp(now),
                timestamp(now),
            ),
        )?;
        let id = tx.last_insert_rowid();
        insert_note_categories(&tx, id, &category_ids)?;
        let categories = categories_of(&tx, id)?;
        tx.commit()?;

        tracing::debug!(note_id = id, %slug, "created note");

        Ok(NoteWithCategories {
            note: Note {
                id,
                title,
                slug,
                content,
                user_id,
                is_pinned,
                created_at: now,
                updated_at: now,
            },
            categories,
        })
    }

    /// Apply a partial update. A present `category_ids` replaces every link.
    pub fn update_note(
        &self,
        user_id: i64,
        slug: &str,
        input: UpdateNoteInput,
    ) -> Result<Option<NoteWithCategories>> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let Some(existing) = find_owned_note(&tx, user_id, slug)? else {
            return Ok(None);
        };

        let now = utc_now();
        let note = Note {
            title: input
                .title
                .map(|t| t.trim().to_string())
                .unwrap_or(existing.title),
            content: input
                .content
                .as_deref()
                .map(sanitize_html)
                .unwrap_or(existing.content),
            is_pinned: input.is_pinned.unwrap_or(existing.is_pinned),
            updated_at: now,
            ..existing
        };

        tx.execute(
            "UPDATE notes SET title = ?, content = ?, is_pinned = ?, updated_at = ? WHERE id = ?",
            (
                &note.title,
                &note.content,
                note.is_pinned,
                timestamp(now),
                note.id,
            ),
        )?;

        if let Some(ids) = input.category_ids {
            let ids = dedup_ids(ids);
            ensure_categories_owned(&tx, user_id, &ids)?;
            tx.execute("DELETE FROM note_categories WHERE note_id = ?", [note.id])?;
            insert_note_categories(&tx, note.id, &ids)?;
        }

        let categories = categories_of(&tx, note.id)?;
        tx.commit()?;

        Ok(Some(NoteWithCategories { note, categories }))
    }

    pub fn delete_note(&self, user_id: i64, slug: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM notes WHERE slug = ? AND user_id = ?",
            (slug, user_id),
        )?;
        Ok(rows > 0)
    }

    /// Flip the pin of an owned note. `updated_at` is left alone so pinning
    /// does not reorder the main list.
    pub fn toggle_pin(&self, user_id: i64, note_id: i64) -> Result<Option<PinToggle>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let is_pinned = conn
            .query_row(
                "UPDATE notes SET is_pinned = NOT is_pinned
                 WHERE id = ? AND user_id = ?
                 RETURNING is_pinned",
                (note_id, user_id),
                |row| row.get::<_, bool>(0),
            )
            .optional()?;
        Ok(is_pinned.map(|is_pinned| PinToggle { is_pinned }))
    }
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        user_id: row.get(4)?,
        is_pinned: row.get(5)?,
        created_at: datetime_at(row, 6)?,
        updated_at: datetime_at(row, 7)?,
    })
}

fn find_owned_note(conn: &Connection, user_id: i64, slug: &str) -> Result<Option<Note>> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes n WHERE n.slug = ? AND n.user_id = ?"),
            (slug, user_id),
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

fn category_scope(
    conn: &Connection,
    user_id: i64,
    filter: CategoryFilter,
) -> Result<CategoryScope> {
    Ok(match filter {
        CategoryFilter::Any => CategoryScope::All,
        CategoryFilter::Invalid => CategoryScope::Nothing,
        CategoryFilter::Only(id) => {
            if category_belongs_to(conn, user_id, id)? {
                CategoryScope::Category(id)
            } else {
                CategoryScope::Nothing
            }
        }
    })
}

/// Append `-2`, `-3`, ... until the slug is free.
fn unique_slug(conn: &Connection, base: String) -> Result<String> {
    let taken = |slug: &str| -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM notes WHERE slug = ?)",
            [slug],
            |row| row.get(0),
        )
    };

    if !taken(&base)? {
        return Ok(base);
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn insert_note_categories(conn: &Connection, note_id: i64, category_ids: &[i64]) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT INTO note_categories (note_id, category_id) VALUES (?, ?)")?;
    for category_id in category_ids {
        stmt.execute((note_id, category_id))?;
    }
    Ok(())
}

fn dedup_ids(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn categories_of(conn: &Connection, note_id: i64) -> Result<Vec<CategorySummary>> {
    Ok(load_categories(conn, &[note_id])?
        .remove(&note_id)
        .unwrap_or_default())
}

/// Categories of every note in `note_ids`, keyed by note, each list ordered by name.
fn load_categories(
    conn: &Connection,
    note_ids: &[i64],
) -> Result<HashMap<i64, Vec<CategorySummary>>> {
    let mut by_note: HashMap<i64, Vec<CategorySummary>> = HashMap::new();
    if note_ids.is_empty() {
        return Ok(by_note);
    }

    let placeholders = vec!["?"; note_ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT nc.note_id, c.id, c.name, c.theme
         FROM note_categories nc
         JOIN categories c ON c.id = nc.category_id
         WHERE nc.note_id IN ({placeholders})
         ORDER BY c.name COLLATE NOCASE, c.id"
    ))?;
    let mut rows = stmt.query(params_from_iter(note_ids))?;
    while let Some(row) = rows.next()? {
        by_note
            .entry(row.get(0)?)
            .or_default()
            .push(CategorySummary {
                id: row.get(1)?,
                name: row.get(2)?,
                theme: row.get(3)?,
            });
    }
    Ok(by_note)
}

fn with_categories(conn: &Connection, notes: Vec<Note>) -> Result<Vec<NoteWithCategories>> {
    let ids: Vec<i64> = notes.iter().map(|n| n.id).collect();
    let mut by_note = load_categories(conn, &ids)?;
    Ok(notes
        .into_iter()
        .map(|note| NoteWithCategories {
            categories: by_note.remove(&note.id).unwrap_or_default(),
            note,
        })
        .collect())
}
