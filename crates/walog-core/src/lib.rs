//! # walog-core
//!
//! The chatroom pipeline of the log viewer. Everything here is a pure,
//! synchronous transformation over collections that were already fetched:
//!
//! - [`aggregate`] groups flat message records into [`Chatroom`]s and joins
//!   uploaded media onto the messages that reference it
//! - [`render`] orders the sidebar (drafts first, then most recent) and picks
//!   each entry's preview text
//! - [`timeline`] turns one conversation into a date-separated timeline
//! - [`draft`] is the client-local overlay of unsent text
//! - [`session`] is the view-model a client threads through its handlers
//!
//! [`store`] declares the contracts the pipeline reads its input through.

pub mod aggregate;
pub mod draft;
pub mod format;
pub mod render;
pub mod search;
pub mod session;
pub mod store;
pub mod timeline;

mod error;

pub use aggregate::{build_chatrooms, group_media, Aggregation, Anomaly, ChatMessage, Chatroom};
pub use draft::DraftOverlay;
pub use error::{CoreError, Result};
pub use render::{build_sidebar, Preview, SidebarEntry};
pub use session::Session;
pub use timeline::{build_timeline, TimelineItem, TimelineMessage};
