//! v002 -- Media lookup index.
//!
//! Media rows are always read by `media_key` in `file_index` order.

use rusqlite::Connection;

/// SQL executed when upgrading from version 1 to version 2.
const UP_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_media_key_index
    ON media(media_key, file_index ASC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
