//! Text helpers applied to notes on write: slug generation and HTML sanitization.

use chrono::{DateTime, Utc};

/// Fallback base when a title slugifies to nothing.
const EMPTY_SLUG_BASE: &str = "note";

/// Generate a URL-safe slug from a title.
///
/// Non-ASCII letters are transliterated (`é` becomes `e`); anything that is
/// not alphanumeric becomes a single hyphen, trimmed from both ends.
pub fn slugify(title: &str) -> String {
    slug::slugify(title)
}

/// Build the slug for a note created at `at`: `<slugified-title>-YYYYMMDDHHMMSS`.
pub fn note_slug(title: &str, at: DateTime<Utc>) -> String {
    let base = slugify(title);
    let base = if base.is_empty() {
        EMPTY_SLUG_BASE
    } else {
        &base
    };
    format!("{}-{}", base, at.format("%Y%m%d%H%M%S"))
}

/// Strip everything but an allow-list of formatting markup from note HTML.
///
/// Scripts and styles are dropped with their contents, event handler
/// attributes and `javascript:` URLs are removed.
pub fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}
