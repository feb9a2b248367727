//! # walog-shared
//!
//! Record types and conventions shared by every walog crate: the logged
//! [`Message`], uploaded [`Media`] metadata and the [`Contact`] directory
//! entry, together with the id helpers used when a client composes a new
//! message and the validation applied when a record enters the store.

pub mod constants;
pub mod error;
pub mod ids;
pub mod types;

pub use error::ValidationError;
pub use types::*;
