//! Command-line client of the walog server: lists chatrooms, renders
//! conversations and sends messages, files and drafts.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod view;

pub use api::ApiClient;
pub use app::App;
pub use error::{ClientError, Result};
