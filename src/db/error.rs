use thiserror::Error;

/// Errors raised by [`Database`](super::Database) operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to apply migration {version}: {name}")]
    Migration {
        version: &'static str,
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not determine data directory")]
    NoDataDir,

    /// Some of the requested categories do not exist or belong to another user.
    #[error("unknown category ids: {0:?}")]
    UnknownCategories(Vec<i64>),

    #[error("email is already registered")]
    EmailTaken,

    #[error("a category with this name already exists")]
    DuplicateCategory,
}

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// True when the error is a SQLite UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
