//! Composition of the WHERE clause shared by the notes list, pinned list and
//! their count queries.

use rusqlite::types::Value;

/// Escape character used in every LIKE pattern built here.
const LIKE_ESCAPE: char = '\\';

/// Escape `%`, `_` and the escape character itself so `term` matches literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// AND-joined predicates over `notes n` with their positional parameters.
#[derive(Debug, Default)]
pub(crate) struct NoteFilter {
    clauses: Vec<&'static str>,
    params: Vec<Value>,
}

impl NoteFilter {
    pub fn for_owner(user_id: i64, pinned: bool) -> Self {
        let mut filter = Self::default();
        filter.push("n.user_id = ?", [Value::Integer(user_id)]);
        filter.push("n.is_pinned = ?", [Value::Integer(i64::from(pinned))]);
        filter
    }

    /// Substring match on title or content. SQLite's LIKE already folds ASCII case.
    pub fn search(mut self, term: Option<&str>) -> Self {
        if let Some(term) = term.filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", escape_like(term));
            self.push(
                "(n.title LIKE ? ESCAPE '\\' OR n.content LIKE ? ESCAPE '\\')",
                [Value::Text(pattern.clone()), Value::Text(pattern)],
            );
        }
        self
    }

    pub fn in_category(mut self, category_id: Option<i64>) -> Self {
        if let Some(id) = category_id {
            self.push(
                "EXISTS (SELECT 1 FROM note_categories nc WHERE nc.note_id = n.id AND nc.category_id = ?)",
                [Value::Integer(id)],
            );
        }
        self
    }

    fn push(&mut self, clause: &'static str, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause);
        self.params.extend(params);
    }

    pub fn where_sql(&self) -> String {
        self.clauses.join(" AND ")
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}
