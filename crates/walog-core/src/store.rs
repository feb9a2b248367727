//! Contracts of the stores the pipeline reads from, and the two read paths
//! the API serves: every chatroom, and one conversation's history.

use std::collections::BTreeSet;

use walog_shared::{Contact, Media, Message};

use crate::aggregate::{self, build_chatrooms, group_media, Aggregation, Anomaly, ChatMessage, MediaIndex};

/// Persisted message records.
pub trait MessageStore {
    type Error;

    fn find_all(&self) -> Result<Vec<Message>, Self::Error>;

    fn find_by_conversation(&self, chat_id: &str) -> Result<Vec<Message>, Self::Error>;

    /// Store a new message and return it as stored.
    fn insert(&self, message: Message) -> Result<Message, Self::Error>;
}

/// Persisted upload metadata.
pub trait MediaStore {
    type Error;

    fn find_by_key(&self, media_key: &str) -> Result<Vec<Media>, Self::Error>;

    fn find_all_media(&self) -> Result<Vec<Media>, Self::Error>;

    fn find_by_stored_name(&self, stored_name: &str) -> Result<Option<Media>, Self::Error>;

    fn insert_many(&self, media: &[Media]) -> Result<(), Self::Error>;
}

/// Id to display-name resolution.
pub trait ContactDirectory {
    type Error;

    fn find_all_contacts(&self) -> Result<Vec<Contact>, Self::Error>;

    /// Insert or replace the entry for `contact.uid`.
    fn upsert_contact(&self, contact: &Contact) -> Result<(), Self::Error>;
}

/// Build every chatroom from the store, most recent first.
pub fn load_chatrooms<S, E>(store: &S) -> Result<Aggregation, E>
where
    S: MessageStore<Error = E> + MediaStore<Error = E>,
{
    let messages = store.find_all()?;
    let media = group_media(store.find_all_media()?);
    let mut aggregation = build_chatrooms(messages, &media);
    aggregation.sort_by_recent();
    Ok(aggregation)
}

/// One conversation, oldest first, with media attached.
pub fn conversation_history<S, E>(
    store: &S,
    chat_id: &str,
) -> Result<(Vec<ChatMessage>, Vec<Anomaly>), E>
where
    S: MessageStore<Error = E> + MediaStore<Error = E>,
{
    let messages = store.find_by_conversation(chat_id)?;

    let keys: BTreeSet<&str> = messages
        .iter()
        .filter(|m| m.has_media)
        .filter_map(|m| m.media_key.as_deref())
        .collect();
    let mut index = MediaIndex::new();
    for key in keys {
        index.insert(key.to_string(), store.find_by_key(key)?);
    }

    Ok(aggregate::join_media(messages, &index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::{media, msg};
    use std::cell::RefCell;
    use std::convert::Infallible;

    #[derive(Default)]
    struct MemoryStore {
        messages: RefCell<Vec<Message>>,
        media: Vec<Media>,
    }

    impl MessageStore for MemoryStore {
        type Error = Infallible;

        fn find_all(&self) -> Result<Vec<Message>, Infallible> {
            Ok(self.messages.borrow().clone())
        }

        fn find_by_conversation(&self, chat_id: &str) -> Result<Vec<Message>, Infallible> {
            Ok(self
                .messages
                .borrow()
                .iter()
                .filter(|m| m.conversation_id() == Some(chat_id))
                .cloned()
                .collect())
        }

        fn insert(&self, message: Message) -> Result<Message, Infallible> {
            self.messages.borrow_mut().push(message.clone());
            Ok(message)
        }
    }

    impl MediaStore for MemoryStore {
        type Error = Infallible;

        fn find_by_key(&self, media_key: &str) -> Result<Vec<Media>, Infallible> {
            Ok(self.media.iter().filter(|m| m.media_key == media_key).cloned().collect())
        }

        fn find_all_media(&self) -> Result<Vec<Media>, Infallible> {
            Ok(self.media.clone())
        }

        fn find_by_stored_name(&self, stored_name: &str) -> Result<Option<Media>, Infallible> {
            Ok(self.media.iter().find(|m| m.stored_name == stored_name).cloned())
        }

        fn insert_many(&self, _media: &[Media]) -> Result<(), Infallible> {
            Ok(())
        }
    }

    #[test]
    fn chatrooms_come_back_most_recent_first() {
        let store = MemoryStore::default();
        store.insert(msg("a@c.us", "1", 10, "old")).unwrap();
        store.insert(msg("b@c.us", "2", 20, "new")).unwrap();

        let agg = load_chatrooms(&store).unwrap();
        let ids: Vec<_> = agg.chatrooms.iter().map(|c| c.chat_id.as_str()).collect();
        assert_eq!(ids, vec!["b@c.us", "a@c.us"]);
    }

    #[test]
    fn history_joins_only_its_own_media() {
        let mut with_media = msg("a@c.us", "1", 10, "look");
        with_media.has_media = true;
        with_media.media_key = Some("a@c.us_10".into());
        let store = MemoryStore {
            messages: RefCell::new(vec![msg("a@c.us", "0", 5, "before"), with_media, msg("b@c.us", "2", 1, "x")]),
            media: vec![media("a@c.us_10", 1, 1), media("a@c.us_10", 0, 1), media("b", 0, 0)],
        };

        let (history, anomalies) = conversation_history(&store, "a@c.us").unwrap();
        assert!(anomalies.is_empty());
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message.body.as_deref(), Some("before"));
        let order: Vec<u32> = history[1].files.iter().map(|f| f.file_index).collect();
        assert_eq!(order, vec![0, 1]);
    }
}
