use crate::db::db::Db;
use crate::libs::messages::Message;
use crate::msg_bail_anyhow;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const UPSERT_USER: &str = "INSERT INTO users (user_id, username, api_key) VALUES (?1, ?2, ?3)
    ON CONFLICT(user_id) DO UPDATE SET
        username = excluded.username,
        api_key = excluded.api_key,
        updated_at = CURRENT_TIMESTAMP";
const SELECT_USER: &str = "SELECT user_id, username, api_key FROM users WHERE user_id = ?1";
const SELECT_ALL_USERS: &str = "SELECT user_id, username, api_key FROM users ORDER BY username";
const DELETE_USER: &str = "DELETE FROM users WHERE user_id = ?1";

/// A Habitica account known locally, with its API token encrypted.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub encrypted_api_token: Vec<u8>,
}

impl UserRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            username: row.get(1)?,
            encrypted_api_token: row.get(2)?,
        })
    }
}

pub struct Users {
    conn: Connection,
}

impl Users {
    pub fn new() -> Result<Self> {
        Ok(Self::with_db(Db::new()?))
    }

    pub fn with_db(db: Db) -> Self {
        Self { conn: db.conn }
    }

    /// Inserts the user or updates the existing row with the same `user_id`.
    pub fn upsert(&mut self, user: &UserRecord) -> Result<()> {
        self.conn.execute(UPSERT_USER, params![user.user_id, user.username, user.encrypted_api_token])?;
        Ok(())
    }

    pub fn get(&mut self, user_id: &str) -> Result<Option<UserRecord>> {
        self.conn
            .query_row(SELECT_USER, params![user_id], UserRecord::from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn list(&mut self) -> Result<Vec<UserRecord>> {
        let mut stmt = self.conn.prepare(SELECT_ALL_USERS)?;
        let users = stmt.query_map([], UserRecord::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Deletes the user together with their tags.
    pub fn delete(&mut self, user_id: &str) -> Result<()> {
        let affected = self.conn.execute(DELETE_USER, params![user_id])?;
        if affected == 0 {
            msg_bail_anyhow!(Message::UserNotFound(user_id.to_string()));
        }
        Ok(())
    }
}
