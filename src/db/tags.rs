use crate::db::db::Db;
use crate::libs::messages::Message;
use crate::msg_error_anyhow;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const UPSERT_TAG: &str = "INSERT INTO tags (tag_id, owner, text) VALUES (?1, ?2, ?3)
    ON CONFLICT(tag_id) DO UPDATE SET owner = excluded.owner, text = excluded.text";
const DELETE_TAG: &str = "DELETE FROM tags WHERE tag_id = ?1";
const SELECT_TAG: &str = "SELECT tag_id, owner, text FROM tags WHERE tag_id = ?1";
const SELECT_TAGS_BY_OWNER: &str = "SELECT tag_id, owner, text FROM tags WHERE owner = ?1 ORDER BY text, tag_id";
const SELECT_TAG_IDS_BY_OWNER: &str = "SELECT tag_id FROM tags WHERE owner = ?1 ORDER BY tag_id";

/// A Habitica tag mirrored locally.
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub tag_id: String,
    /// `user_id` of the owning [`UserRecord`](super::users::UserRecord).
    pub owner: String,
    pub text: String,
}

impl TagRecord {
    pub fn new(tag_id: &str, owner: &str, text: &str) -> Self {
        Self {
            tag_id: tag_id.to_string(),
            owner: owner.to_string(),
            text: text.to_string(),
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            tag_id: row.get(0)?,
            owner: row.get(1)?,
            text: row.get(2)?,
        })
    }
}

pub struct Tags {
    conn: Connection,
}

impl Tags {
    pub fn new() -> Result<Self> {
        Ok(Self::with_db(Db::new()?))
    }

    pub fn with_db(db: Db) -> Self {
        Self { conn: db.conn }
    }

    /// Inserts the tag or rewrites the row with the same `tag_id`.
    pub fn upsert(&mut self, tag: &TagRecord) -> Result<()> {
        self.conn.execute(UPSERT_TAG, params![tag.tag_id, tag.owner, tag.text])?;
        Ok(())
    }

    pub fn delete(&mut self, tag_id: &str) -> Result<()> {
        if self.delete_if_exists(tag_id)? == 0 {
            return Err(msg_error_anyhow!(Message::TagNotFound(tag_id.to_string())));
        }
        Ok(())
    }

    /// Deletes the tag when present; returns the number of rows removed.
    pub fn delete_if_exists(&mut self, tag_id: &str) -> Result<usize> {
        Ok(self.conn.execute(DELETE_TAG, params![tag_id])?)
    }

    pub fn get(&mut self, tag_id: &str) -> Result<Option<TagRecord>> {
        self.conn
            .query_row(SELECT_TAG, params![tag_id], TagRecord::from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_for_owner(&mut self, owner: &str) -> Result<Vec<TagRecord>> {
        let mut stmt = self.conn.prepare(SELECT_TAGS_BY_OWNER)?;
        let tags = stmt.query_map(params![owner], TagRecord::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    pub fn ids_for_owner(&mut self, owner: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(SELECT_TAG_IDS_BY_OWNER)?;
        let ids = stmt.query_map(params![owner], |row| row.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}
