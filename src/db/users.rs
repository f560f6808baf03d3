use chrono::Duration;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::error::is_unique_violation;
use super::{datetime_at, timestamp, utc_now, Database, DbError, Result};
use crate::models::*;

impl Database {
    // ============================================================
    // Users
    // ============================================================

    /// Insert a user. `email` is stored lowercased; `password_hash` must already
    /// be a PHC string.
    pub fn create_user(&self, email: &str, name: &str, password_hash: &str) -> Result<User> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = utc_now();
        let email = email.trim().to_lowercase();
        let name = name.trim().to_string();

        conn.execute(
            "INSERT INTO users (email, name, password_hash, created_at) VALUES (?, ?, ?, ?)",
            (&email, &name, password_hash, timestamp(now)),
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::EmailTaken
            } else {
                e.into()
            }
        })?;

        Ok(User {
            id: conn.last_insert_rowid(),
            email,
            name,
            created_at: now,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                "SELECT id, email, name, created_at FROM users WHERE id = ?",
                [id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// The user with this email and their stored password hash.
    pub fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let found = conn
            .query_row(
                "SELECT id, email, name, created_at, password_hash FROM users WHERE email = ?",
                [email.trim().to_lowercase()],
                |row| Ok((user_from_row(row)?, row.get(4)?)),
            )
            .optional()?;
        Ok(found)
    }

    // ============================================================
    // Auth sessions
    // ============================================================

    pub fn create_auth_session(&self, user_id: i64, ttl: Duration) -> Result<AuthSession> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = utc_now();
        let session = AuthSession {
            token: Uuid::new_v4().simple().to_string(),
            user_id,
            created_at: now,
            expires_at: now + ttl,
        };

        conn.execute(
            "INSERT INTO auth_sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
            (
                &session.token,
                session.user_id,
                timestamp(session.created_at),
                timestamp(session.expires_at),
            ),
        )?;

        Ok(session)
    }

    /// Resolve a bearer token to its user. Expired sessions are deleted and
    /// treated as missing.
    pub fn find_session_user(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let found = conn
            .query_row(
                "SELECT u.id, u.email, u.name, u.created_at, s.expires_at
                 FROM auth_sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?",
                [token],
                |row| Ok((user_from_row(row)?, datetime_at(row, 4)?)),
            )
            .optional()?;

        match found {
            Some((user, expires_at)) if expires_at > utc_now() => Ok(Some(user)),
            Some(_) => {
                conn.execute("DELETE FROM auth_sessions WHERE token = ?", [token])?;
                tracing::debug!("Removed expired session");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn delete_auth_session(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM auth_sessions WHERE token = ?", [token])?;
        Ok(rows > 0)
    }

    /// Drop every session whose expiry has passed. Returns how many were removed.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM auth_sessions WHERE expires_at <= ?",
            [timestamp(utc_now())],
        )?;
        Ok(rows)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        created_at: datetime_at(row, 3)?,
    })
}
