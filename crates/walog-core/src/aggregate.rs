//! Aggregation of flat message records into per-conversation chatrooms.
//!
//! Messages are grouped by the conversation id carried in `localId.remote`,
//! never by `from`/`to`, so both directions of a one-to-one chat and every
//! sender of a group land in the same bucket. Each bucket is sorted by
//! timestamp (stable) and summarised by its last message.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use walog_shared::{Media, Message};

/// Media rows grouped by `mediaKey`.
pub type MediaIndex = HashMap<String, Vec<Media>>;

/// A message together with the files uploaded under its `mediaKey`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(flatten)]
    pub message: Message,
    /// Attached media in `fileIndex` order. Empty for text messages.
    #[serde(default)]
    pub files: Vec<Media>,
}

/// Summary of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chatroom {
    #[serde(rename = "chatID")]
    pub chat_id: String,
    #[serde(rename = "notifyName", default, skip_serializing_if = "Option::is_none")]
    pub notify_name: Option<String>,
    /// Timestamp of the last message.
    pub last_time: i64,
    /// Body of the last message.
    #[serde(default)]
    pub last_chat: Option<String>,
    /// Whether the last message carries media.
    #[serde(rename = "hasMedia", default)]
    pub has_media: bool,
    /// Every message of the conversation, oldest first.
    pub messages: Vec<ChatMessage>,
}

impl Chatroom {
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// Record-level problems found while aggregating. None of them stop the
/// pipeline; the affected record is skipped or rendered with what exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// The message has no conversation id and was left out of every chatroom.
    MissingRemote { message: String },
    /// `hasMedia` is set but the message has no `mediaKey`.
    MediaWithoutKey { message: String },
    /// No media rows exist for the message's `mediaKey`.
    MissingMedia { message: String, media_key: String },
    /// A row's `indexTotal` disagrees with the number of rows present.
    IndexTotalMismatch {
        media_key: String,
        index_total: u32,
        attached: usize,
    },
}

/// Output of [`build_chatrooms`].
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// One entry per conversation, in first-seen order.
    pub chatrooms: Vec<Chatroom>,
    pub anomalies: Vec<Anomaly>,
}

impl Aggregation {
    /// Number of messages that were left out of every chatroom.
    pub fn skipped(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| matches!(a, Anomaly::MissingRemote { .. }))
            .count()
    }

    /// Sort chatrooms most recent first, the order the API hands them out in.
    pub fn sort_by_recent(&mut self) {
        self.chatrooms
            .sort_by(|a, b| b.last_time.cmp(&a.last_time));
    }
}

/// Index media rows by their join key.
pub fn group_media(rows: Vec<Media>) -> MediaIndex {
    let mut index = MediaIndex::new();
    for row in rows {
        index.entry(row.media_key.clone()).or_default().push(row);
    }
    index
}

/// Group messages into chatrooms and join their media.
pub fn build_chatrooms(messages: Vec<Message>, media: &MediaIndex) -> Aggregation {
    let mut anomalies = Vec::new();
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Message>> = HashMap::new();

    for message in messages {
        let Some(remote) = message.conversation_id().map(str::to_string) else {
            warn!(
                message = %message.local_id.serialized,
                "Skipping message without a conversation id"
            );
            anomalies.push(Anomaly::MissingRemote {
                message: message.local_id.serialized.clone(),
            });
            continue;
        };
        groups
            .entry(remote)
            .or_insert_with_key(|key| {
                order.push(key.clone());
                Vec::new()
            })
            .push(message);
    }

    let mut chatrooms = Vec::with_capacity(order.len());
    for chat_id in order {
        let Some(group) = groups.remove(&chat_id) else {
            continue;
        };
        let (messages, mut found) = join_media(group, media);
        anomalies.append(&mut found);

        let Some(last) = messages.last() else {
            continue;
        };
        let notify_name = messages
            .iter()
            .filter_map(|m| m.message.data.notify_name.as_deref())
            .find(|n| !n.is_empty())
            .map(str::to_string);

        chatrooms.push(Chatroom {
            last_time: last.message.timestamp,
            last_chat: last.message.body.clone(),
            has_media: last.message.has_media,
            notify_name,
            chat_id,
            messages,
        });
    }

    Aggregation {
        chatrooms,
        anomalies,
    }
}

/// Sort one conversation's messages oldest first and attach their media.
pub fn join_media(mut messages: Vec<Message>, media: &MediaIndex) -> (Vec<ChatMessage>, Vec<Anomaly>) {
    messages.sort_by_key(|m| m.timestamp);

    let mut anomalies = Vec::new();
    let joined = messages
        .into_iter()
        .map(|message| {
            let files = attach(&message, media, &mut anomalies);
            ChatMessage { message, files }
        })
        .collect();
    (joined, anomalies)
}

fn attach(message: &Message, media: &MediaIndex, anomalies: &mut Vec<Anomaly>) -> Vec<Media> {
    if !message.has_media {
        return Vec::new();
    }
    let id = &message.local_id.serialized;
    let Some(key) = message.media_key.as_deref() else {
        warn!(message = %id, "Media message has no mediaKey");
        anomalies.push(Anomaly::MediaWithoutKey {
            message: id.clone(),
        });
        return Vec::new();
    };

    let mut files = media.get(key).cloned().unwrap_or_default();
    if files.is_empty() {
        warn!(message = %id, media_key = %key, "No media rows for message");
        anomalies.push(Anomaly::MissingMedia {
            message: id.clone(),
            media_key: key.to_string(),
        });
        return files;
    }

    files.sort_by_key(|f| f.file_index);

    let expected = files.len() - 1;
    if let Some(bad) = files.iter().find(|f| f.index_total as usize != expected) {
        warn!(
            media_key = %key,
            index_total = bad.index_total,
            attached = files.len(),
            "Media set is incomplete or over-full, rendering what is present"
        );
        anomalies.push(Anomaly::IndexTotalMismatch {
            media_key: key.to_string(),
            index_total: bad.index_total,
            attached: files.len(),
        });
    }
    files
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use walog_shared::LocalId;

    pub(crate) fn msg(remote: &str, id: &str, timestamp: i64, body: &str) -> Message {
        Message {
            local_id: LocalId {
                from_me: false,
                remote: Some(remote.to_string()),
                id: id.to_string(),
                participant: None,
                serialized: format!("false_{remote}_{id}"),
            },
            body: Some(body.to_string()),
            kind: "chat".into(),
            timestamp,
            from: remote.to_string(),
            to: "me@c.us".into(),
            author: None,
            from_me: false,
            device_type: None,
            has_media: false,
            media_key: None,
            has_quoted_msg: false,
            data: Default::default(),
            ack: 0,
            is_forwarded: false,
        }
    }

    pub(crate) fn media(key: &str, index: u32, total: u32) -> Media {
        Media {
            filename: format!("f{index}.jpg"),
            stored_name: format!("1_f{index}.jpg"),
            path: format!("/uploads/1_f{index}.jpg"),
            mimetype: "image/jpeg".into(),
            size: 100,
            uploaded_at: 1,
            chatroom_id: "a@c.us".into(),
            media_key: key.into(),
            file_index: index,
            index_total: total,
        }
    }

    fn sample() -> Vec<Message> {
        vec![
            msg("a@c.us", "1", 30, "a-late"),
            msg("b@c.us", "2", 10, "b-only"),
            msg("a@c.us", "3", 20, "a-early"),
            msg("a@c.us", "4", 30, "a-tie"),
        ]
    }

    #[test]
    fn partitions_every_message_exactly_once() {
        let input = sample();
        let agg = build_chatrooms(input.clone(), &MediaIndex::new());

        let mut seen: Vec<String> = agg
            .chatrooms
            .iter()
            .flat_map(|c| c.messages.iter().map(|m| m.message.local_id.id.clone()))
            .collect();
        seen.sort();
        let mut expected: Vec<String> = input.iter().map(|m| m.local_id.id.clone()).collect();
        expected.sort();
        assert_eq!(seen, expected);

        for room in &agg.chatrooms {
            assert!(room
                .messages
                .iter()
                .all(|m| m.message.conversation_id() == Some(room.chat_id.as_str())));
        }
    }

    #[test]
    fn groups_by_remote_not_sender() {
        let mut sent = msg("a@c.us", "9", 40, "reply");
        sent.from = "me@c.us".into();
        sent.to = "a@c.us".into();
        sent.from_me = true;
        let mut input = sample();
        input.push(sent);

        let agg = build_chatrooms(input, &MediaIndex::new());
        assert_eq!(agg.chatrooms.len(), 2);
        let a = agg.chatrooms.iter().find(|c| c.chat_id == "a@c.us").unwrap();
        assert_eq!(a.messages.len(), 4);
        assert_eq!(a.last_chat.as_deref(), Some("reply"));
    }

    #[test]
    fn last_message_has_max_timestamp_and_ties_are_stable() {
        for _ in 0..3 {
            let agg = build_chatrooms(sample(), &MediaIndex::new());
            let a = agg.chatrooms.iter().find(|c| c.chat_id == "a@c.us").unwrap();
            let max = a.messages.iter().map(|m| m.message.timestamp).max().unwrap();
            assert_eq!(a.last_time, max);
            // "1" and "4" tie at 30; input order puts "4" last.
            assert_eq!(a.last_message().unwrap().message.local_id.id, "4");
            assert_eq!(a.last_chat.as_deref(), Some("a-tie"));
            let order: Vec<_> = a.messages.iter().map(|m| m.message.timestamp).collect();
            assert_eq!(order, vec![20, 30, 30]);
        }
    }

    #[test]
    fn missing_remote_is_skipped_not_fatal() {
        let mut bad = msg("x@c.us", "bad", 5, "orphan");
        bad.local_id.remote = None;
        let mut input = sample();
        input.push(bad);

        let agg = build_chatrooms(input, &MediaIndex::new());
        assert_eq!(agg.skipped(), 1);
        assert_eq!(
            agg.chatrooms.iter().map(|c| c.messages.len()).sum::<usize>(),
            4
        );
    }

    #[test]
    fn media_is_attached_in_file_index_order() {
        let mut m = msg("a@c.us", "m", 50, "");
        m.body = None;
        m.has_media = true;
        m.media_key = Some("a@c.us_50".into());
        let index = group_media(vec![
            media("a@c.us_50", 2, 2),
            media("a@c.us_50", 0, 2),
            media("a@c.us_50", 1, 2),
            media("other", 0, 0),
        ]);

        let agg = build_chatrooms(vec![m], &index);
        let room = &agg.chatrooms[0];
        assert!(room.has_media);
        assert_eq!(room.last_chat, None);
        let order: Vec<u32> = room.messages[0].files.iter().map(|f| f.file_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(agg.anomalies.is_empty());
    }

    #[test]
    fn index_total_mismatch_is_a_warning() {
        let mut m = msg("a@c.us", "m", 50, "caption");
        m.has_media = true;
        m.media_key = Some("k".into());
        let index = group_media(vec![media("k", 0, 2), media("k", 1, 2)]);

        let agg = build_chatrooms(vec![m], &index);
        assert_eq!(agg.chatrooms[0].messages[0].files.len(), 2);
        assert_eq!(
            agg.anomalies,
            vec![Anomaly::IndexTotalMismatch {
                media_key: "k".into(),
                index_total: 2,
                attached: 2,
            }]
        );
    }

    #[test]
    fn media_without_rows_is_reported() {
        let mut m = msg("a@c.us", "m", 50, "caption");
        m.has_media = true;
        m.media_key = Some("gone".into());
        let mut keyless = msg("a@c.us", "n", 51, "x");
        keyless.has_media = true;

        let agg = build_chatrooms(vec![m, keyless], &MediaIndex::new());
        assert_eq!(agg.anomalies.len(), 2);
        assert!(agg.chatrooms[0].messages.iter().all(|m| m.files.is_empty()));
    }

    #[test]
    fn sort_by_recent_orders_descending() {
        let mut agg = build_chatrooms(sample(), &MediaIndex::new());
        agg.sort_by_recent();
        let ids: Vec<_> = agg.chatrooms.iter().map(|c| c.chat_id.as_str()).collect();
        assert_eq!(ids, vec!["a@c.us", "b@c.us"]);
    }

    #[test]
    fn notify_name_comes_from_first_named_message() {
        let mut named = msg("a@c.us", "n", 1, "hey");
        named.data.notify_name = Some("Budi".into());
        let agg = build_chatrooms(vec![msg("a@c.us", "0", 0, "x"), named], &MediaIndex::new());
        assert_eq!(agg.chatrooms[0].notify_name.as_deref(), Some("Budi"));
    }

    #[test]
    fn chatroom_wire_shape() {
        let agg = build_chatrooms(vec![msg("a@c.us", "1", 7, "hi")], &MediaIndex::new());
        let json = serde_json::to_value(&agg.chatrooms[0]).unwrap();
        assert_eq!(json["chatID"], "a@c.us");
        assert_eq!(json["last_time"], 7);
        assert_eq!(json["last_chat"], "hi");
        assert_eq!(json["hasMedia"], false);
        assert_eq!(json["messages"][0]["localId"]["remote"], "a@c.us");
        assert!(json["messages"][0]["files"].as_array().unwrap().is_empty());
    }
}
