use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use super::error::is_unique_violation;
use super::{datetime_at, timestamp, utc_now, Database, DbError, Result};
use crate::models::*;

const CATEGORY_COLUMNS: &str = "c.id, c.name, c.theme, c.user_id, c.created_at";

impl Database {
    /// The caller's categories ordered by name, each with its note count.
    pub fn list_categories(&self, user_id: i64) -> Result<Vec<CategoryWithCount>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS}, COUNT(nc.note_id)
             FROM categories c
             LEFT JOIN note_categories nc ON nc.category_id = c.id
             WHERE c.user_id = ?
             GROUP BY c.id
             ORDER BY c.name COLLATE NOCASE, c.id"
        ))?;

        let categories = stmt
            .query_map([user_id], |row| {
                Ok(CategoryWithCount {
                    category: category_from_row(row)?,
                    note_count: row.get::<_, i64>(5)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    pub fn get_category(&self, user_id: i64, id: i64) -> Result<Option<Category>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        find_owned_category(&conn, user_id, id)
    }

    pub fn create_category(&self, user_id: i64, input: CreateCategoryInput) -> Result<Category> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = utc_now();
        let name = input.name.trim().to_string();
        let theme = input.theme.unwrap_or_else(|| DEFAULT_THEME.to_string());

        conn.execute(
            "INSERT INTO categories (name, theme, user_id, created_at) VALUES (?, ?, ?, ?)",
            (&name, &theme, user_id, timestamp(now)),
        )
        .map_err(duplicate_name)?;

        Ok(Category {
            id: conn.last_insert_rowid(),
            name,
            theme,
            user_id,
            created_at: now,
        })
    }

    pub fn update_category(
        &self,
        user_id: i64,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Option<Category>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let Some(existing) = find_owned_category(&conn, user_id, id)? else {
            return Ok(None);
        };

        let category = Category {
            name: input
                .name
                .map(|n| n.trim().to_string())
                .unwrap_or(existing.name),
            theme: input.theme.unwrap_or(existing.theme),
            ..existing
        };

        conn.execute(
            "UPDATE categories SET name = ?, theme = ? WHERE id = ?",
            (&category.name, &category.theme, category.id),
        )
        .map_err(duplicate_name)?;

        Ok(Some(category))
    }

    /// Delete an owned category. Its note links go with it; the notes stay.
    pub fn delete_category(&self, user_id: i64, id: i64) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM categories WHERE id = ? AND user_id = ?",
            (id, user_id),
        )?;
        Ok(rows > 0)
    }
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        theme: row.get(2)?,
        user_id: row.get(3)?,
        created_at: datetime_at(row, 4)?,
    })
}

fn duplicate_name(err: rusqlite::Error) -> DbError {
    if is_unique_violation(&err) {
        DbError::DuplicateCategory
    } else {
        err.into()
    }
}

fn find_owned_category(conn: &Connection, user_id: i64, id: i64) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = ? AND c.user_id = ?"),
            (id, user_id),
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

pub(super) fn category_belongs_to(conn: &Connection, user_id: i64, id: i64) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ? AND user_id = ?)",
        (id, user_id),
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Fail with [`DbError::UnknownCategories`] unless every id is owned by `user_id`.
/// `ids` must be free of duplicates.
pub(super) fn ensure_categories_owned(conn: &Connection, user_id: i64, ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT id FROM categories WHERE user_id = ? AND id IN ({placeholders})"
    ))?;
    let params = std::iter::once(&user_id).chain(ids.iter());
    let owned = stmt
        .query_map(params_from_iter(params), |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let unknown: Vec<i64> = ids.iter().copied().filter(|id| !owned.contains(id)).collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(DbError::UnknownCategories(unknown))
    }
}
