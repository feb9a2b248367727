//! CRUD operations for [`Message`] records.

use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};
use walog_core::store::MessageStore;
use walog_shared::{ids, LocalId, Message, MessageData};

use crate::database::Database;
use crate::error::{map_unique, Result, StoreError};

const SELECT_COLUMNS: &str = "SELECT serialized, remote, msg_id, from_me, participant, body, kind,
        timestamp, sender, recipient, author, device_type, has_media, media_key,
        has_quoted_msg, data_json, ack, is_forwarded
     FROM messages";

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a message. Missing ids are filled in the way the sender would
    /// have generated them; the stored form is returned.
    pub fn insert_message(&self, message: Message) -> Result<Message> {
        let message = complete_ids(message);
        insert_row(self.conn(), &message)
            .map_err(|e| map_unique(e, &message.local_id.serialized))?;
        debug!(
            id = %message.local_id.serialized,
            chat = ?message.conversation_id(),
            "Stored message"
        );
        Ok(message)
    }

    /// Import externally logged messages in one transaction. Records already
    /// present are counted and skipped.
    pub fn import_messages(&mut self, messages: Vec<Message>) -> Result<ImportReport> {
        let tx = self.conn_mut().transaction()?;
        let mut report = ImportReport::default();
        for message in messages {
            let message = complete_ids(message);
            match insert_row(&tx, &message) {
                Ok(_) => report.inserted += 1,
                Err(e) => match map_unique(e, &message.local_id.serialized) {
                    StoreError::Duplicate(id) => {
                        warn!(id = %id, "Skipping already imported message");
                        report.duplicates += 1;
                    }
                    other => return Err(other),
                },
            }
        }
        tx.commit()?;
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Every message in insertion order.
    pub fn list_messages(&self) -> Result<Vec<Message>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY rowid ASC"))?;
        let rows = stmt.query_map([], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// One conversation, oldest first; equal timestamps keep insertion order.
    pub fn get_messages_for_conversation(&self, remote: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS} WHERE remote = ?1 ORDER BY timestamp ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![remote], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message(&self, serialized: &str) -> Result<Option<Message>> {
        Ok(self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE serialized = ?1"),
                params![serialized],
                row_to_message,
            )
            .optional()?)
    }

    pub fn count_messages(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl MessageStore for Database {
    type Error = StoreError;

    fn find_all(&self) -> Result<Vec<Message>> {
        self.list_messages()
    }

    fn find_by_conversation(&self, chat_id: &str) -> Result<Vec<Message>> {
        self.get_messages_for_conversation(chat_id)
    }

    fn insert(&self, message: Message) -> Result<Message> {
        self.insert_message(message)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn complete_ids(mut message: Message) -> Message {
    if message.local_id.id.is_empty() {
        message.local_id.id = ids::generate_message_id();
    }
    if message.local_id.serialized.is_empty() {
        let remote = message.local_id.remote().unwrap_or_default().to_string();
        message.local_id.serialized =
            ids::serialized_id(message.local_id.from_me, &remote, &message.local_id.id);
    }
    message
}

fn insert_row(conn: &rusqlite::Connection, message: &Message) -> rusqlite::Result<usize> {
    let data_json = serde_json::to_string(&message.data).map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(e))
    })?;
    conn.execute(
        "INSERT INTO messages (serialized, remote, msg_id, from_me, participant, body, kind,
            timestamp, sender, recipient, author, device_type, has_media, media_key,
            has_quoted_msg, data_json, ack, is_forwarded)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            message.local_id.serialized,
            message.local_id.remote(),
            message.local_id.id,
            message.local_id.from_me as i32,
            message.local_id.participant,
            message.body,
            message.kind,
            message.timestamp,
            message.from,
            message.to,
            message.author,
            message.device_type,
            message.has_media as i32,
            message.media_key,
            message.has_quoted_msg as i32,
            data_json,
            message.ack,
            message.is_forwarded as i32,
        ],
    )
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let data_json: String = row.get(15)?;
    let data: MessageData = serde_json::from_str(&data_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(15, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let from_me = row.get::<_, i32>(3)? != 0;

    Ok(Message {
        local_id: LocalId {
            serialized: row.get(0)?,
            remote: row.get(1)?,
            id: row.get(2)?,
            from_me,
            participant: row.get(4)?,
        },
        body: row.get(5)?,
        kind: row.get(6)?,
        timestamp: row.get(7)?,
        from: row.get(8)?,
        to: row.get(9)?,
        author: row.get(10)?,
        from_me,
        device_type: row.get(11)?,
        has_media: row.get::<_, i32>(12)? != 0,
        media_key: row.get(13)?,
        has_quoted_msg: row.get::<_, i32>(14)? != 0,
        data,
        ack: row.get(16)?,
        is_forwarded: row.get::<_, i32>(17)? != 0,
    })
}
