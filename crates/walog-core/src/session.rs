//! Client view-model.
//!
//! Holds what a viewer needs between UI events: who the local user is, which
//! conversation is open, the draft overlay and the files picked for the next
//! upload. Handlers receive the session explicitly instead of sharing
//! globals.

use chrono::{DateTime, FixedOffset};
use tracing::debug;
use walog_shared::{Contact, MediaKind};

use crate::aggregate::{ChatMessage, Chatroom};
use crate::draft::DraftOverlay;
use crate::error::{CoreError, Result};
use crate::render::{self, SidebarEntry};
use crate::timeline::{self, TimelineContext, TimelineItem};

/// A file picked for upload but not sent yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub name: String,
    pub mimetype: String,
    pub size: u64,
    /// Position within the send, 0-based.
    pub index: u32,
}

impl PendingFile {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mimetype(&self.mimetype)
    }
}

/// Result of feeding the input box into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    DraftSaved,
    DraftCleared,
    /// No conversation is open, nothing was stored.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Session {
    self_id: String,
    open_chat: Option<String>,
    drafts: DraftOverlay,
    pending: Vec<PendingFile>,
}

impl Session {
    pub fn new(self_id: impl Into<String>, drafts: DraftOverlay) -> Self {
        Self {
            self_id: self_id.into(),
            open_chat: None,
            drafts,
            pending: Vec::new(),
        }
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn open_chat(&self) -> Option<&str> {
        self.open_chat.as_deref()
    }

    pub fn drafts(&self) -> &DraftOverlay {
        &self.drafts
    }

    /// Open a conversation. Returns the draft to restore into the input box.
    pub fn open(&mut self, chat_id: &str) -> &str {
        debug!(chat = %chat_id, "Opening conversation");
        self.open_chat = Some(chat_id.to_string());
        self.drafts.load(chat_id)
    }

    pub fn close(&mut self) {
        self.open_chat = None;
    }

    /// Mirror the input box into the draft of the open conversation.
    ///
    /// Callers re-sort the sidebar with [`Session::resort`] afterwards.
    pub fn on_input(&mut self, text: &str) -> InputOutcome {
        let Some(chat_id) = self.open_chat.as_deref() else {
            return InputOutcome::Ignored;
        };
        if self.drafts.save(chat_id, text) {
            InputOutcome::DraftSaved
        } else {
            InputOutcome::DraftCleared
        }
    }

    /// Set the draft of any conversation, open or not.
    pub fn set_draft(&mut self, chat_id: &str, text: &str) -> bool {
        self.drafts.save(chat_id, text)
    }

    pub fn clear_draft(&mut self, chat_id: &str) -> bool {
        self.drafts.clear(chat_id)
    }

    /// Add files to the pending upload. Indexes continue from files picked
    /// earlier. Requires an open conversation.
    pub fn select_files<I>(&mut self, files: I) -> Result<&[PendingFile]>
    where
        I: IntoIterator<Item = (String, String, u64)>,
    {
        if self.open_chat.is_none() {
            return Err(CoreError::NoConversation);
        }
        for (name, mimetype, size) in files {
            let index = self.pending.len() as u32;
            self.pending.push(PendingFile {
                name,
                mimetype,
                size,
                index,
            });
        }
        Ok(&self.pending)
    }

    pub fn pending_files(&self) -> &[PendingFile] {
        &self.pending
    }

    pub fn clear_selection(&mut self) {
        self.pending.clear();
    }

    /// `indexTotal` of the pending upload: file count minus one.
    pub fn index_total(&self) -> Option<u32> {
        (self.pending.len() as u32).checked_sub(1)
    }

    /// Reset after a successful send to the open conversation: the draft and
    /// the pending files are gone.
    pub fn after_send(&mut self) {
        if let Some(chat_id) = self.open_chat.as_deref() {
            self.drafts.clear(chat_id);
        }
        self.pending.clear();
    }

    pub fn sidebar(
        &self,
        chatrooms: &[Chatroom],
        contacts: &[Contact],
        now: &DateTime<FixedOffset>,
    ) -> Vec<SidebarEntry> {
        render::build_sidebar(chatrooms, contacts, &self.drafts, self.open_chat(), now)
    }

    pub fn resort(&self, entries: &mut [SidebarEntry]) {
        render::resort(entries, &self.drafts, self.open_chat());
    }

    /// Timeline of the open conversation.
    pub fn timeline(
        &self,
        messages: &[ChatMessage],
        contacts: &[Contact],
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<TimelineItem>> {
        let chat_id = self.open_chat().ok_or(CoreError::NoConversation)?;
        let ctx = TimelineContext {
            self_id: &self.self_id,
            chat_id,
            contacts,
            now,
        };
        Ok(timeline::build_timeline(messages, &ctx))
    }
}
