use serde::{Deserialize, Serialize};

use crate::constants::{CHAT_KIND, WEB_DEVICE};
use crate::error::ValidationError;
use crate::ids;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Composite identifier of a logged message.
///
/// `remote` is the conversation id: the other participant of a one-to-one
/// chat, or the group id. It is optional because records ingested from an
/// external log are not guaranteed to carry it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalId {
    #[serde(default)]
    pub from_me: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    #[serde(rename = "_serialized", default)]
    pub serialized: String,
}

impl LocalId {
    /// Id for a message the local user is about to send to `remote`.
    pub fn outgoing(remote: &str) -> Self {
        let id = ids::generate_message_id();
        Self {
            from_me: true,
            remote: Some(remote.to_string()),
            serialized: ids::serialized_id(true, remote, &id),
            id,
            participant: None,
        }
    }

    /// Conversation id, ignoring empty strings.
    pub fn remote(&self) -> Option<&str> {
        self.remote.as_deref().filter(|r| !r.trim().is_empty())
    }
}

/// Body of the message a reply quotes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotedMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Raw metadata captured by the logger (`_data`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_msg: Option<QuotedMessage>,
    #[serde(
        rename = "quotedStanzaID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub quoted_stanza_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_participant: Option<String>,
}

impl MessageData {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One logged chat message. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub local_id: LocalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    /// Seconds since the UNIX epoch.
    pub timestamp: i64,
    pub from: String,
    pub to: String,
    /// Sender inside a group conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_key: Option<String>,
    #[serde(default)]
    pub has_quoted_msg: bool,
    #[serde(rename = "_data", default, skip_serializing_if = "MessageData::is_empty")]
    pub data: MessageData,
    #[serde(default)]
    pub ack: i32,
    #[serde(default)]
    pub is_forwarded: bool,
}

fn default_kind() -> String {
    CHAT_KIND.to_string()
}

impl Message {
    /// A text message composed by the local user.
    pub fn outgoing_text(self_id: &str, chatroom_id: &str, body: &str, timestamp: i64) -> Self {
        Self {
            local_id: LocalId::outgoing(chatroom_id),
            body: Some(body.to_string()),
            kind: default_kind(),
            timestamp,
            from: self_id.to_string(),
            to: chatroom_id.to_string(),
            author: None,
            from_me: true,
            device_type: Some(WEB_DEVICE.to_string()),
            has_media: false,
            media_key: None,
            has_quoted_msg: false,
            data: MessageData::default(),
            ack: 0,
            is_forwarded: false,
        }
    }

    /// A media message composed by the local user. Its `mediaKey` is derived
    /// from the chatroom and the send time, the same key the upload uses.
    pub fn outgoing_media(
        self_id: &str,
        chatroom_id: &str,
        caption: Option<&str>,
        timestamp: i64,
    ) -> Self {
        let caption = caption.map(str::trim).filter(|c| !c.is_empty());
        Self {
            has_media: true,
            media_key: Some(ids::media_key(chatroom_id, timestamp)),
            body: caption.map(str::to_string),
            ..Self::outgoing_text(self_id, chatroom_id, "", timestamp)
        }
    }

    /// Conversation this message belongs to, if the record carries one.
    pub fn conversation_id(&self) -> Option<&str> {
        self.local_id.remote()
    }

    /// Body, ignoring empty strings.
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }
}

/// A message as submitted to the send endpoint, before validation.
///
/// Every field is optional so that a missing value is reported as a
/// [`ValidationError`] instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default)]
    pub local_id: Option<LocalId>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub from_me: Option<bool>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub has_media: Option<bool>,
    #[serde(default)]
    pub media_key: Option<String>,
    #[serde(default)]
    pub has_quoted_msg: Option<bool>,
    #[serde(rename = "_data", default)]
    pub data: Option<MessageData>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<NewMessage> for Message {
    type Error = ValidationError;

    fn try_from(req: NewMessage) -> Result<Self, Self::Error> {
        let has_media = req.has_media.unwrap_or(false);
        let body = req.body.filter(|b| !b.is_empty());

        if !has_media && body.as_deref().map_or(true, |b| b.trim().is_empty()) {
            return Err(ValidationError::MissingBody);
        }
        let timestamp = req
            .timestamp
            .filter(|t| *t > 0)
            .ok_or(ValidationError::MissingTimestamp)?;
        let from = present(req.from).ok_or(ValidationError::MissingFrom)?;
        let to = present(req.to).ok_or(ValidationError::MissingTo)?;

        let local_id = req.local_id.ok_or(ValidationError::MissingRemote)?;
        if local_id.remote().is_none() {
            return Err(ValidationError::MissingRemote);
        }

        let media_key = present(req.media_key);
        if has_media && media_key.is_none() {
            return Err(ValidationError::MissingMediaKey);
        }

        let from_me = req.from_me.unwrap_or(local_id.from_me);
        Ok(Message {
            local_id,
            body,
            kind: req.kind.unwrap_or_else(default_kind),
            timestamp,
            from,
            to,
            author: present(req.author),
            from_me,
            device_type: req.device_type,
            has_media,
            media_key: if has_media { media_key } else { None },
            has_quoted_msg: req.has_quoted_msg.unwrap_or(false),
            data: req.data.unwrap_or_default(),
            ack: 0,
            is_forwarded: false,
        })
    }
}

impl From<Message> for NewMessage {
    fn from(m: Message) -> Self {
        Self {
            local_id: Some(m.local_id),
            body: m.body,
            kind: Some(m.kind),
            timestamp: Some(m.timestamp),
            from: Some(m.from),
            to: Some(m.to),
            author: m.author,
            from_me: Some(m.from_me),
            device_type: m.device_type,
            has_media: Some(m.has_media),
            media_key: m.media_key,
            has_quoted_msg: Some(m.has_quoted_msg),
            data: Some(m.data),
        }
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Metadata of one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    /// Original file name.
    pub filename: String,
    /// Storage-assigned unique name.
    pub stored_name: String,
    /// Retrieval location: a filesystem path, a remote URL or a static URL,
    /// depending on the storage backend.
    pub path: String,
    pub mimetype: String,
    /// Size in bytes.
    pub size: u64,
    #[serde(default)]
    pub uploaded_at: i64,
    #[serde(rename = "chatroomID", default)]
    pub chatroom_id: String,
    pub media_key: String,
    /// Position within a multi-file send, 0-based.
    #[serde(default)]
    pub file_index: u32,
    /// Number of files in the send, minus one.
    #[serde(default)]
    pub index_total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    File,
}

impl MediaKind {
    pub fn from_mimetype(mimetype: &str) -> Self {
        if mimetype.starts_with("image/") {
            Self::Image
        } else if mimetype.starts_with("video/") {
            Self::Video
        } else {
            Self::File
        }
    }
}

impl Media {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mimetype(&self.mimetype)
    }
}

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

/// Display-name entry of the contact directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub uid: String,
    pub name: String,
    #[serde(rename = "isGroup", default)]
    pub is_group: bool,
}
