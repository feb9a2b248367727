//! Full-history rendering of one conversation.

use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::warn;
use walog_shared::{ids, Contact, Media, MediaKind};

use crate::aggregate::ChatMessage;
use crate::format::{
    format_clock, format_contact_name, format_file_size, format_last_chat_time, format_msg,
    format_time_separator, to_local,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// The replied-to message shown above a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub participant: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub stored_name: String,
    pub path: String,
    pub mimetype: String,
    pub kind: MediaKind,
    pub size_label: String,
}

impl From<&Media> for Attachment {
    fn from(m: &Media) -> Self {
        Self {
            filename: m.filename.clone(),
            stored_name: m.stored_name.clone(),
            path: m.path.clone(),
            mimetype: m.mimetype.clone(),
            kind: m.kind(),
            size_label: format_file_size(m.size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineMessage {
    pub id: String,
    pub direction: Direction,
    /// Display name of the sender, set for received group messages only.
    pub sender: Option<String>,
    pub quote: Option<Quote>,
    pub body: Option<String>,
    pub attachments: Vec<Attachment>,
    pub timestamp: i64,
    /// `hh:mm AM/PM`
    pub time: String,
}

impl TimelineMessage {
    /// Text a reader sees in the message bubble, used for searching.
    pub fn visible_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(quote) = &self.quote {
            parts.push(&quote.participant);
            parts.push(&quote.body);
        }
        if let Some(body) = &self.body {
            parts.push(body);
        }
        parts.push(&self.time);
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineItem {
    Separator { date: NaiveDate, label: String },
    Message(TimelineMessage),
}

/// What the timeline needs to know about the viewer.
#[derive(Debug, Clone, Copy)]
pub struct TimelineContext<'a> {
    /// Participant id of the local user.
    pub self_id: &'a str,
    /// Conversation being rendered.
    pub chat_id: &'a str,
    pub contacts: &'a [Contact],
    pub now: DateTime<FixedOffset>,
}

/// Render a conversation, oldest first, with a separator before the first
/// message of every calendar date.
///
/// `messages` must already be in timestamp order, as produced by the
/// aggregation pipeline. Messages with neither text nor media are skipped.
pub fn build_timeline(messages: &[ChatMessage], ctx: &TimelineContext<'_>) -> Vec<TimelineItem> {
    let tz = *ctx.now.offset();
    let today = ctx.now.date_naive();
    let group = ids::is_group_id(ctx.chat_id);

    let mut items = Vec::with_capacity(messages.len() + 4);
    let mut last_date: Option<NaiveDate> = None;

    for chat in messages {
        let msg = &chat.message;
        let body = msg.text().map(format_msg);
        if body.is_none() && chat.files.is_empty() {
            warn!(message = %msg.local_id.serialized, "Skipping message with no text or media");
            continue;
        }
        let Some(time) = to_local(msg.timestamp, &tz) else {
            warn!(message = %msg.local_id.serialized, timestamp = msg.timestamp, "Skipping message with out-of-range timestamp");
            continue;
        };

        let date = time.date_naive();
        if last_date != Some(date) {
            items.push(TimelineItem::Separator {
                date,
                label: format_time_separator(date, today),
            });
            last_date = Some(date);
        }

        let sender = (group && !msg.from_me).then(|| {
            let author = msg.author.as_deref().unwrap_or(&msg.from);
            format_contact_name(author, ctx.contacts).to_string()
        });

        items.push(TimelineItem::Message(TimelineMessage {
            id: msg.local_id.serialized.clone(),
            direction: if msg.from_me {
                Direction::Sent
            } else {
                Direction::Received
            },
            sender,
            quote: quote_for(chat, ctx),
            body,
            attachments: chat.files.iter().map(Attachment::from).collect(),
            timestamp: msg.timestamp,
            time: format_clock(&time),
        }));
    }
    items
}

fn quote_for(chat: &ChatMessage, ctx: &TimelineContext<'_>) -> Option<Quote> {
    let msg = &chat.message;
    if !msg.has_quoted_msg {
        return None;
    }
    let Some(quoted) = msg.data.quoted_msg.as_ref() else {
        warn!(message = %msg.local_id.serialized, "hasQuotedMsg set without a quoted message");
        return None;
    };

    let participant = match msg.data.quoted_participant.as_deref() {
        Some(p) if p == ctx.self_id => "You".to_string(),
        Some(p) => format_contact_name(p, ctx.contacts).to_string(),
        None => msg.data.notify_name.clone().unwrap_or_default(),
    };
    Some(Quote {
        participant,
        body: format_msg(quoted.body.as_deref().unwrap_or_default()),
    })
}

/// Chat header subtitle: `Last chat on {relative time}`.
pub fn header_last_chat(messages: &[ChatMessage], now: &DateTime<FixedOffset>) -> Option<String> {
    messages
        .last()
        .map(|m| format!("Last chat on {}", format_last_chat_time(m.message.timestamp, now)))
}
