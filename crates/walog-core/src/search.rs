//! Case-insensitive filters for the sidebar and the open conversation.

use crate::render::SidebarEntry;
use crate::timeline::TimelineItem;

fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Entries whose display name or any message body contains `query`.
pub fn filter_sidebar<'a>(entries: &'a [SidebarEntry], query: &str) -> Vec<&'a SidebarEntry> {
    let query = normalize(query);
    entries
        .iter()
        .filter(|e| {
            e.name.to_lowercase().contains(&query)
                || e.bodies.iter().any(|b| b.to_lowercase().contains(&query))
        })
        .collect()
}

/// Messages whose visible text contains `term`. A date separator survives
/// only if at least one message after it, up to the next separator, does.
pub fn filter_timeline<'a>(items: &'a [TimelineItem], term: &str) -> Vec<&'a TimelineItem> {
    let term = normalize(term);
    let mut kept = Vec::with_capacity(items.len());
    let mut pending_separator: Option<&TimelineItem> = None;

    for item in items {
        match item {
            TimelineItem::Separator { .. } => pending_separator = Some(item),
            TimelineItem::Message(message) => {
                if !message.visible_text().to_lowercase().contains(&term) {
                    continue;
                }
                if let Some(separator) = pending_separator.take() {
                    kept.push(separator);
                }
                kept.push(item);
            }
        }
    }
    kept
}
