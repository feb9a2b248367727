//! Identifier conventions of the message log.
//!
//! Conversation ids look like `6281234@c.us` (one-to-one) or
//! `1203630@g.us` (group). Message ids are short random hex strings and the
//! serialized form glues direction, conversation and id together.

use rand::RngCore;

use crate::constants::{GROUP_SUFFIX, MESSAGE_ID_LEN};
use crate::error::ValidationError;

/// Generate a fresh random message id (14 lowercase hex chars).
pub fn generate_message_id() -> String {
    let mut bytes = [0u8; MESSAGE_ID_LEN / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `"{from_me}_{remote}_{id}"`
pub fn serialized_id(from_me: bool, remote: &str, id: &str) -> String {
    format!("{from_me}_{remote}_{id}")
}

/// Join key shared by a media message and its uploaded files.
pub fn media_key(chatroom_id: &str, timestamp: i64) -> String {
    format!("{chatroom_id}_{timestamp}")
}

/// Text before the `@` of a participant id, or the whole id when there is none.
pub fn local_part(id: &str) -> &str {
    id.split('@').next().unwrap_or(id)
}

pub fn is_group_id(id: &str) -> bool {
    id.ends_with(GROUP_SUFFIX)
}

/// Storage name for an uploaded file: `"{unix_millis}_{original}"`.
///
/// Only the final path component of `original` is kept, and names that would
/// escape a directory are refused.
pub fn stored_name(unix_millis: i64, original: &str) -> Result<String, ValidationError> {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(ValidationError::InvalidFileName(original.to_string()));
    }
    Ok(format!("{unix_millis}_{base}"))
}

/// Recover the original file name from a storage name.
pub fn original_name(stored: &str) -> &str {
    match stored.split_once('_') {
        Some((prefix, rest)) if !rest.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) => {
            rest
        }
        _ => stored,
    }
}
