//! Startup import of externally logged messages and contacts.

use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};
use walog_shared::{Contact, Message};
use walog_store::{Database, ImportReport};

/// Insert the message records of a JSON array file. Entries that do not
/// parse as a message are skipped with a warning.
pub fn import_messages(db: &mut Database, path: &Path) -> anyhow::Result<ImportReport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;

    let total = entries.len();
    let mut messages = Vec::with_capacity(total);
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<Message>(entry) {
            Ok(message) => messages.push(message),
            Err(e) => warn!(index, error = %e, "Skipping unreadable message record"),
        }
    }

    let report = db.import_messages(messages)?;
    info!(
        file = %path.display(),
        total,
        inserted = report.inserted,
        duplicates = report.duplicates,
        stored = db.count_messages()?,
        "Imported messages"
    );
    Ok(report)
}

/// Upsert the contacts of a JSON array file. Returns how many were written.
pub fn import_contacts(db: &Database, path: &Path) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let contacts: Vec<Contact> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of contacts", path.display()))?;

    for contact in &contacts {
        db.upsert_contact(contact)?;
    }
    info!(file = %path.display(), count = contacts.len(), "Imported contacts");
    Ok(contacts.len())
}
