//! Upload metadata: one row per stored file.

use rusqlite::{params, OptionalExtension};
use tracing::debug;
use walog_core::store::MediaStore;
use walog_shared::Media;

use crate::database::Database;
use crate::error::{map_unique, Result, StoreError};

const SELECT_COLUMNS: &str = "SELECT filename, stored_name, path, mimetype, size, uploaded_at,
        chatroom_id, media_key, file_index, index_total
     FROM media";

impl Database {
    /// Record the files of one send. All rows land or none do.
    pub fn insert_media_many(&mut self, media: &[Media]) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        for m in media {
            insert_row(&tx, m).map_err(|e| map_unique(e, &m.stored_name))?;
        }
        tx.commit()?;
        debug!(count = media.len(), "Stored media metadata");
        Ok(())
    }

    /// Files of one media message, in send order.
    pub fn get_media_by_key(&self, media_key: &str) -> Result<Vec<Media>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS} WHERE media_key = ?1 ORDER BY file_index ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![media_key], row_to_media)?;

        let mut media = Vec::new();
        for row in rows {
            media.push(row?);
        }
        Ok(media)
    }

    pub fn list_media(&self) -> Result<Vec<Media>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;
        let rows = stmt.query_map([], row_to_media)?;

        let mut media = Vec::new();
        for row in rows {
            media.push(row?);
        }
        Ok(media)
    }

    pub fn get_media_by_stored_name(&self, stored_name: &str) -> Result<Option<Media>> {
        Ok(self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE stored_name = ?1"),
                params![stored_name],
                row_to_media,
            )
            .optional()?)
    }
}

// The trait takes `&self`; a single-file insert does not need the transaction.
impl MediaStore for Database {
    type Error = StoreError;

    fn find_by_key(&self, media_key: &str) -> Result<Vec<Media>> {
        self.get_media_by_key(media_key)
    }

    fn find_all_media(&self) -> Result<Vec<Media>> {
        self.list_media()
    }

    fn find_by_stored_name(&self, stored_name: &str) -> Result<Option<Media>> {
        self.get_media_by_stored_name(stored_name)
    }

    fn insert_many(&self, media: &[Media]) -> Result<()> {
        self.conn().execute_batch("BEGIN")?;
        for m in media {
            if let Err(e) = insert_row(self.conn(), m) {
                self.conn().execute_batch("ROLLBACK")?;
                return Err(map_unique(e, &m.stored_name));
            }
        }
        self.conn().execute_batch("COMMIT")?;
        Ok(())
    }
}

fn insert_row(conn: &rusqlite::Connection, m: &Media) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO media (filename, stored_name, path, mimetype, size, uploaded_at,
            chatroom_id, media_key, file_index, index_total)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            m.filename,
            m.stored_name,
            m.path,
            m.mimetype,
            m.size as i64,
            m.uploaded_at,
            m.chatroom_id,
            m.media_key,
            m.file_index,
            m.index_total,
        ],
    )
}

fn row_to_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<Media> {
    let size: i64 = row.get(4)?;
    Ok(Media {
        filename: row.get(0)?,
        stored_name: row.get(1)?,
        path: row.get(2)?,
        mimetype: row.get(3)?,
        size: size.max(0) as u64,
        uploaded_at: row.get(5)?,
        chatroom_id: row.get(6)?,
        media_key: row.get(7)?,
        file_index: row.get(8)?,
        index_total: row.get(9)?,
    })
}
