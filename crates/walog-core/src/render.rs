//! Sidebar ordering and preview selection.
//!
//! The sidebar order is total: chatrooms with a draft come first, then the
//! most recent `last_time`. Sorting is stable, so equal keys keep their input
//! order and re-sorting unchanged data is a no-op. After a draft changes the
//! list is re-sorted in place through [`resort`] rather than refetched.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use walog_shared::constants::{DRAFT_PREFIX, MEDIA_PLACEHOLDER};
use walog_shared::Contact;

use crate::aggregate::Chatroom;
use crate::draft::DraftOverlay;
use crate::format::{format_contact_name, format_last_chat_time, format_msg};

/// What a sidebar entry shows under the chatroom name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// Unsent text, already trimmed.
    Draft(String),
    /// The last message only carries media.
    Media,
    /// Formatted body of the last message.
    Text(String),
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preview::Draft(text) => write!(f, "{DRAFT_PREFIX}{text}"),
            Preview::Media => f.write_str(MEDIA_PLACEHOLDER),
            Preview::Text(text) => f.write_str(text),
        }
    }
}

/// One rendered sidebar row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    pub chat_id: String,
    pub name: String,
    pub last_time: i64,
    pub last_time_label: String,
    pub last_chat: Option<String>,
    pub has_media: bool,
    pub has_draft: bool,
    pub preview: Preview,
    /// Bodies of every message in the chatroom, used by the sidebar search.
    pub bodies: Vec<String>,
}

/// Preview for a chatroom given the draft overlay and the open conversation.
pub fn preview(
    chat_id: &str,
    last_chat: Option<&str>,
    has_media: bool,
    drafts: &DraftOverlay,
    open_chat: Option<&str>,
) -> Preview {
    let draft = drafts.load(chat_id);
    if !draft.is_empty() && open_chat != Some(chat_id) {
        Preview::Draft(draft.trim().to_string())
    } else if has_media {
        Preview::Media
    } else {
        Preview::Text(last_chat.map(format_msg).unwrap_or_default())
    }
}

/// Draft first, then most recent.
pub fn sidebar_order(a_draft: bool, a_time: i64, b_draft: bool, b_time: i64) -> Ordering {
    b_draft.cmp(&a_draft).then(b_time.cmp(&a_time))
}

/// Sort chatrooms for display.
pub fn sort_chatrooms(chatrooms: &mut [Chatroom], drafts: &DraftOverlay) {
    chatrooms.sort_by(|a, b| {
        sidebar_order(
            drafts.has(&a.chat_id),
            a.last_time,
            drafts.has(&b.chat_id),
            b.last_time,
        )
    });
}

pub fn sort_entries(entries: &mut [SidebarEntry]) {
    entries.sort_by(|a, b| sidebar_order(a.has_draft, a.last_time, b.has_draft, b.last_time));
}

/// Build the ordered sidebar.
pub fn build_sidebar(
    chatrooms: &[Chatroom],
    contacts: &[Contact],
    drafts: &DraftOverlay,
    open_chat: Option<&str>,
    now: &DateTime<FixedOffset>,
) -> Vec<SidebarEntry> {
    let mut entries: Vec<SidebarEntry> = chatrooms
        .iter()
        .map(|room| SidebarEntry {
            chat_id: room.chat_id.clone(),
            name: format_contact_name(&room.chat_id, contacts).to_string(),
            last_time: room.last_time,
            last_time_label: format_last_chat_time(room.last_time, now),
            last_chat: room.last_chat.clone(),
            has_media: room.has_media,
            has_draft: drafts.has(&room.chat_id),
            preview: preview(
                &room.chat_id,
                room.last_chat.as_deref(),
                room.has_media,
                drafts,
                open_chat,
            ),
            bodies: room
                .messages
                .iter()
                .filter_map(|m| m.message.body.clone())
                .collect(),
        })
        .collect();
    sort_entries(&mut entries);
    entries
}

/// Refresh draft flags and previews after a draft mutation, then re-sort.
pub fn resort(entries: &mut [SidebarEntry], drafts: &DraftOverlay, open_chat: Option<&str>) {
    for entry in entries.iter_mut() {
        entry.has_draft = drafts.has(&entry.chat_id);
        entry.preview = preview(
            &entry.chat_id,
            entry.last_chat.as_deref(),
            entry.has_media,
            drafts,
            open_chat,
        );
    }
    sort_entries(entries);
}
