//! Plain-text rendering of the sidebar and the conversation timeline.

use std::fmt::Write as _;

use walog_core::timeline::{Direction, TimelineMessage};
use walog_core::{SidebarEntry, TimelineItem};

pub fn sidebar(entries: &[&SidebarEntry]) -> String {
    if entries.is_empty() {
        return "No chatrooms yet.\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let marker = if entry.has_draft { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} {:<28} {:>12}  {}",
            entry.name, entry.last_time_label, entry.chat_id
        );
        let _ = writeln!(out, "    {}", entry.preview);
    }
    out
}

/// Render a conversation under its header.
pub fn timeline(title: &str, subtitle: Option<&str>, items: &[&TimelineItem]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {title} ==");
    if let Some(subtitle) = subtitle {
        let _ = writeln!(out, "   {subtitle}");
    }
    if items.is_empty() {
        out.push_str("No messages.\n");
        return out;
    }
    for item in items {
        match item {
            TimelineItem::Separator { label, .. } => {
                let _ = writeln!(out, "\n---------- {label} ----------");
            }
            TimelineItem::Message(message) => message_lines(&mut out, message),
        }
    }
    out
}

fn message_lines(out: &mut String, message: &TimelineMessage) {
    let indent = match message.direction {
        Direction::Sent => "                ",
        Direction::Received => "",
    };
    if let Some(sender) = &message.sender {
        let _ = writeln!(out, "{indent}{sender}");
    }
    if let Some(quote) = &message.quote {
        let _ = writeln!(out, "{indent}| {}: {}", quote.participant, quote.body);
    }
    for attachment in &message.attachments {
        let _ = writeln!(
            out,
            "{indent}[{:?}] {} ({})",
            attachment.kind, attachment.filename, attachment.size_label
        );
    }
    match &message.body {
        Some(body) => {
            let _ = writeln!(out, "{indent}{body}  {}", message.time);
        }
        None => {
            let _ = writeln!(out, "{indent}{}", message.time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walog_core::render::Preview;
    use walog_core::timeline::{Attachment, Quote};
    use walog_shared::MediaKind;

    fn entry(chat_id: &str, name: &str, draft: Option<&str>) -> SidebarEntry {
        SidebarEntry {
            chat_id: chat_id.into(),
            name: name.into(),
            last_time: 0,
            last_time_label: "Yesterday".into(),
            last_chat: Some("hello".into()),
            has_media: false,
            has_draft: draft.is_some(),
            preview: match draft {
                Some(d) => Preview::Draft(d.into()),
                None => Preview::Text("hello".into()),
            },
            bodies: vec!["hello".into()],
        }
    }

    #[test]
    fn sidebar_marks_drafts() {
        let a = entry("a@c.us", "Budi", Some("typing"));
        let b = entry("b@c.us", "6282", None);
        let out = sidebar(&[&a, &b]);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("* Budi"));
        assert_eq!(lines[1], "    Draft: typing");
        assert!(lines[2].starts_with("  6282"));
        assert_eq!(lines[3], "    hello");
        assert_eq!(sidebar(&[]), "No chatrooms yet.\n");
    }

    #[test]
    fn timeline_shows_quotes_and_attachments() {
        let items = vec![
            TimelineItem::Separator {
                date: chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                label: "Today".into(),
            },
            TimelineItem::Message(TimelineMessage {
                id: "1".into(),
                direction: Direction::Received,
                sender: Some("Budi".into()),
                quote: Some(Quote {
                    participant: "You".into(),
                    body: "lunch?".into(),
                }),
                body: Some("sure".into()),
                attachments: vec![Attachment {
                    filename: "menu.jpg".into(),
                    stored_name: "1_menu.jpg".into(),
                    path: "/tmp/1_menu.jpg".into(),
                    mimetype: "image/jpeg".into(),
                    kind: MediaKind::Image,
                    size_label: "1.00 KB".into(),
                }],
                timestamp: 0,
                time: "09:00 AM".into(),
            }),
        ];
        let refs: Vec<&TimelineItem> = items.iter().collect();
        let out = timeline("Budi", Some("Last chat on Today"), &refs);
        assert!(out.contains("== Budi =="));
        assert!(out.contains("---------- Today ----------"));
        assert!(out.contains("| You: lunch?"));
        assert!(out.contains("[Image] menu.jpg (1.00 KB)"));
        assert!(out.contains("sure  09:00 AM"));

        assert!(timeline("Budi", None, &[]).ends_with("No messages.\n"));
    }
}
