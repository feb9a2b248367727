//! v001 -- Initial schema creation.
//!
//! Creates the three tables: `messages`, `media` and `contacts`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    serialized     TEXT PRIMARY KEY NOT NULL,  -- localId._serialized
    remote         TEXT,                       -- conversation id, NULL on malformed records
    msg_id         TEXT NOT NULL,
    from_me        INTEGER NOT NULL DEFAULT 0,
    participant    TEXT,
    body           TEXT,
    kind           TEXT NOT NULL DEFAULT 'chat',
    timestamp      INTEGER NOT NULL,           -- UNIX seconds
    sender         TEXT NOT NULL,
    recipient      TEXT NOT NULL,
    author         TEXT,
    device_type    TEXT,
    has_media      INTEGER NOT NULL DEFAULT 0,
    media_key      TEXT,
    has_quoted_msg INTEGER NOT NULL DEFAULT 0,
    data_json      TEXT NOT NULL DEFAULT '{}', -- _data as JSON
    ack            INTEGER NOT NULL DEFAULT 0,
    is_forwarded   INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_remote_ts
    ON messages(remote, timestamp ASC);

-- ----------------------------------------------------------------
-- Media (upload metadata)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS media (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    filename    TEXT NOT NULL,
    stored_name TEXT NOT NULL UNIQUE,
    path        TEXT NOT NULL,
    mimetype    TEXT NOT NULL,
    size        INTEGER NOT NULL,
    uploaded_at INTEGER NOT NULL,
    chatroom_id TEXT NOT NULL,
    media_key   TEXT NOT NULL,
    file_index  INTEGER NOT NULL DEFAULT 0,
    index_total INTEGER NOT NULL DEFAULT 0
);

-- ----------------------------------------------------------------
-- Contacts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS contacts (
    uid      TEXT PRIMARY KEY NOT NULL,
    name     TEXT NOT NULL,
    is_group INTEGER NOT NULL DEFAULT 0
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
