//! Client-local overlay of unsent message text, one entry per chatroom.
//!
//! Drafts never reach the server. They only change the sidebar: a chatroom
//! with a draft sorts first and previews the draft instead of its last
//! message.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftOverlay {
    drafts: BTreeMap<String, String>,
}

impl DraftOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `text` as the draft of `chat_id`, replacing any previous one.
    ///
    /// Empty text clears the draft instead. Returns whether a draft is now
    /// stored.
    pub fn save(&mut self, chat_id: &str, text: &str) -> bool {
        if text.is_empty() {
            self.clear(chat_id);
            return false;
        }
        self.drafts.insert(chat_id.to_string(), text.to_string());
        true
    }

    /// The draft of `chat_id`, or `""`.
    pub fn load(&self, chat_id: &str) -> &str {
        self.drafts.get(chat_id).map(String::as_str).unwrap_or("")
    }

    /// Remove the draft of `chat_id`. Returns whether one existed.
    pub fn clear(&mut self, chat_id: &str) -> bool {
        self.drafts.remove(chat_id).is_some()
    }

    pub fn has(&self, chat_id: &str) -> bool {
        self.drafts.contains_key(chat_id)
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.drafts.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Read a persisted overlay. A missing file is an empty overlay.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let overlay: Self = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), drafts = overlay.len(), "Loaded drafts");
        Ok(overlay)
    }

    /// Persist the overlay, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        debug!(path = %path.display(), drafts = self.len(), "Saved drafts");
        Ok(())
    }
}
