//! SQLite message log implementation.
//!
//! Implements `MessageLog` from `chatgate-core` over the `messages` table.
//! Appends go through the single-connection writer pool; listing uses the
//! reader pool.

use chatgate_core::repository::message::MessageLog;
use chatgate_types::error::RepositoryError;
use chatgate_types::message::{MessageRecord, NewMessageRecord};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MessageLog`.
#[derive(Clone)]
pub struct SqliteMessageLog {
    pool: DatabasePool,
}

impl SqliteMessageLog {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<MessageRecord, sqlx::Error> {
    Ok(MessageRecord {
        id: row.try_get("id")?,
        phone: row.try_get("phone")?,
        name: row.try_get("name")?,
        receiver: row.try_get("receiver")?,
        text: row.try_get("text")?,
        link: row.try_get("link")?,
        timestamp: row.try_get("timestamp")?,
    })
}

impl MessageLog for SqliteMessageLog {
    async fn append(&self, record: &NewMessageRecord) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO messages (phone, name, receiver, text, link, timestamp)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&record.phone)
        .bind(&record.name)
        .bind(&record.receiver)
        .bind(&record.text)
        .bind(&record.link)
        .bind(&record.timestamp)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    async fn list_all(&self) -> Result<Vec<MessageRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, phone, name, receiver, text, link, timestamp FROM messages ORDER BY id ASC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| record_from_row(row).map_err(|e| RepositoryError::Query(e.to_string())))
            .collect()
    }
}
