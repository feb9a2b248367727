//! # walog-store
//!
//! SQLite storage for the message log. The crate exposes a synchronous
//! [`Database`] handle wrapping a `rusqlite::Connection`, with typed helpers
//! for messages, uploaded media metadata and contacts. `Database` implements
//! the store contracts of `walog-core`, so the aggregation pipeline can read
//! straight from it.

pub mod contacts;
pub mod database;
pub mod media;
pub mod messages;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use messages::ImportReport;
