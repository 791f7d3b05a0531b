use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use warbler_types::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL};

use crate::models::{MessageRow, NewUser, ProfileUpdate, UserRow, UserStats};
use crate::{Database, DbError, Result};

const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.password, u.image_url, u.header_image_url, u.bio, u.location";

const MESSAGE_COLUMNS: &str = "m.id, m.text, m.timestamp, m.user_id, u.username, u.image_url";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, image_url)
                 VALUES (?1, ?2, ?3, COALESCE(?4, ?5))",
                rusqlite::params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.image_url,
                    DEFAULT_IMAGE_URL,
                ],
            )
            .map_err(unique_violation)?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.username = ?1", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.email = ?1", email))
    }

    /// All users, or those whose username contains `q` (ASCII case-insensitive).
    pub fn search_users(&self, q: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| match q {
            Some(q) => {
                let pattern = format!("%{}%", escape_like(q));
                query_users(
                    conn,
                    &format!(
                        "SELECT {USER_COLUMNS} FROM users u
                         WHERE u.username LIKE ?1 ESCAPE '\\'
                         ORDER BY u.username"
                    ),
                    rusqlite::params![pattern],
                )
            }
            None => query_users(
                conn,
                &format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.username"),
                [],
            ),
        })
    }

    pub fn update_profile(&self, id: i64, update: &ProfileUpdate<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users
                 SET username = ?2, email = ?3,
                     image_url = COALESCE(?4, ?5),
                     header_image_url = COALESCE(?6, ?7),
                     bio = ?8, location = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    update.username,
                    update.email,
                    update.image_url,
                    DEFAULT_IMAGE_URL,
                    update.header_image_url,
                    DEFAULT_HEADER_IMAGE_URL,
                    update.bio,
                    update.location,
                ],
            )
            .map_err(unique_violation)?;
            Ok(())
        })
    }

    /// Deletes the user along with their messages, likes and follow edges.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    pub fn user_stats(&self, id: i64) -> Result<UserStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_following_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?1),
                    (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
                [id],
                |row| {
                    Ok(UserStats {
                        messages: row.get(0)?,
                        following: row.get(1)?,
                        followers: row.get(2)?,
                        likes: row.get(3)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    // -- Follows --

    /// Returns false when the edge already existed or points at the follower.
    pub fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO follows (user_being_followed_id, user_following_id)
                 VALUES (?1, ?2)",
                [followed_id, follower_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM follows
                 WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                [followed_id, follower_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM follows
                     WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                    [followed_id, follower_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Users that `id` follows.
    pub fn following(&self, id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS} FROM users u
                     JOIN follows f ON f.user_being_followed_id = u.id
                     WHERE f.user_following_id = ?1
                     ORDER BY u.username"
                ),
                [id],
            )
        })
    }

    /// Users following `id`.
    pub fn followers(&self, id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS} FROM users u
                     JOIN follows f ON f.user_following_id = u.id
                     WHERE f.user_being_followed_id = ?1
                     ORDER BY u.username"
                ),
                [id],
            )
        })
    }

    // -- Messages --

    pub fn insert_message(&self, user_id: i64, text: &str) -> Result<i64> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (text, timestamp, user_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![text, timestamp, user_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages m
                         JOIN users u ON u.id = m.user_id
                         WHERE m.id = ?1"
                    ),
                    [id],
                    message_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    pub fn messages_by_user(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m
                     JOIN users u ON u.id = m.user_id
                     WHERE m.user_id = ?1
                     ORDER BY m.timestamp DESC, m.id DESC
                     LIMIT ?2"
                ),
                rusqlite::params![user_id, limit],
            )
        })
    }

    /// Messages by `user_id` and everyone they follow, newest first.
    pub fn timeline(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m
                     JOIN users u ON u.id = m.user_id
                     WHERE m.user_id = ?1
                        OR m.user_id IN (
                            SELECT user_being_followed_id FROM follows
                            WHERE user_following_id = ?1)
                     ORDER BY m.timestamp DESC, m.id DESC
                     LIMIT ?2"
                ),
                rusqlite::params![user_id, limit],
            )
        })
    }

    // -- Likes --

    /// Toggle a like: removes if it exists, inserts if not.
    /// Returns true when the like was added.
    pub fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM likes WHERE user_id = ?1 AND message_id = ?2",
                    [user_id, message_id],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(like_id) = existing {
                conn.execute("DELETE FROM likes WHERE id = ?1", [like_id])?;
                Ok(false)
            } else {
                conn.execute(
                    "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                    [user_id, message_id],
                )?;
                Ok(true)
            }
        })
    }

    pub fn like_count(&self, message_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM likes WHERE message_id = ?1",
                [message_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    pub fn liked_message_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<rusqlite::Result<HashSet<i64>>>()?;
            Ok(ids)
        })
    }

    pub fn liked_messages(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages m
                     JOIN users u ON u.id = m.user_id
                     JOIN likes l ON l.message_id = m.id
                     WHERE l.user_id = ?1
                     ORDER BY m.timestamp DESC, m.id DESC
                     LIMIT ?2"
                ),
                rusqlite::params![user_id, limit],
            )
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        location: row.get(7)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        timestamp: row.get(2)?,
        user_id: row.get(3)?,
        username: row.get(4)?,
        image_url: row.get(5)?,
    })
}

fn query_user(conn: &Connection, filter: &str, value: impl rusqlite::ToSql) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE {filter}"),
            [value],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_users(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn query_messages(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Maps a UNIQUE failure on a users column to `DbError::Conflict`.
fn unique_violation(err: rusqlite::Error) -> DbError {
    if let rusqlite::Error::SqliteFailure(e, Some(msg)) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return DbError::Conflict("username");
            }
            if msg.contains("users.email") {
                return DbError::Conflict("email");
            }
        }
    }
    err.into()
}

fn escape_like(q: &str) -> String {
    let mut out = String::with_capacity(q.len());
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
