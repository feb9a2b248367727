//! Text and time formatting used by the sidebar and the timeline.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone};
use walog_shared::{ids, Contact};

/// Strip the annotation prefix an external log annotator puts in front of
/// message text.
///
/// When the body contains `<<`, everything up to and including the first
/// `<<` is dropped; otherwise the same happens for `>>`. The rest is trimmed.
/// `<<` wins whenever both markers are present, whatever their position.
pub fn format_msg(body: &str) -> String {
    if let Some(idx) = body.find("<<") {
        body[idx + 2..].trim().to_string()
    } else if let Some(idx) = body.find(">>") {
        body[idx + 2..].trim().to_string()
    } else {
        body.to_string()
    }
}

/// Display name for a participant or conversation id.
///
/// Falls back to the local part of the id (before `@`), so a raw id is never
/// shown in full.
pub fn format_contact_name<'a>(id: &'a str, contacts: &'a [Contact]) -> &'a str {
    contacts
        .iter()
        .find(|c| c.uid == id)
        .map(|c| c.name.as_str())
        .unwrap_or_else(|| ids::local_part(id))
}

/// Convert a UNIX timestamp into the viewer's timezone.
pub fn to_local(timestamp: i64, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    tz.timestamp_opt(timestamp, 0).single()
}

/// Whole calendar days between the date of `timestamp` and the date of `now`,
/// both taken in `now`'s timezone. Negative for future timestamps.
pub fn diff_days(timestamp: i64, now: &DateTime<FixedOffset>) -> Option<i64> {
    let then = to_local(timestamp, now.offset())?;
    Some(
        now.date_naive()
            .signed_duration_since(then.date_naive())
            .num_days(),
    )
}

/// Clock time as `hh:mm AM/PM`.
pub fn format_clock(time: &DateTime<FixedOffset>) -> String {
    time.format("%I:%M %p").to_string()
}

/// Relative label for the sidebar and chat header.
///
/// | days ago | label |
/// |---|---|
/// | 1 | `Yesterday` |
/// | 2..=7 | weekday name |
/// | > 7 | `D/M/YYYY` |
/// | otherwise | `hh:mm AM/PM` |
pub fn format_last_chat_time(timestamp: i64, now: &DateTime<FixedOffset>) -> String {
    let (Some(then), Some(days)) = (to_local(timestamp, now.offset()), diff_days(timestamp, now))
    else {
        return String::new();
    };
    match days {
        1 => "Yesterday".to_string(),
        2..=7 => then.format("%A").to_string(),
        d if d > 7 => format!("{}/{}/{}", then.day(), then.month(), then.year()),
        _ => format_clock(&then),
    }
}

/// Label of a timeline date separator.
pub fn format_time_separator(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_string()
    } else {
        format!("{}/{}/{}", date.month(), date.day(), date.year())
    }
}

const SIZE_UNITS: [&str; 6] = ["Bytes", "KB", "MB", "GB", "TB", "PB"];

/// Human-readable file size with two decimals, 1024-based.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jakarta() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    /// 2024-03-15 (Friday) 14:30 at UTC+7.
    fn now() -> DateTime<FixedOffset> {
        jakarta().with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        jakarta()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .timestamp()
    }

    #[test]
    fn format_msg_strips_annotation() {
        assert_eq!(format_msg("hello <<world"), "world");
        assert_eq!(format_msg("[bot] << translated text "), "translated text");
        assert_eq!(format_msg("tag >> rest"), "rest");
        assert_eq!(format_msg("plain text"), "plain text");
    }

    #[test]
    fn format_msg_prefers_left_marker() {
        assert_eq!(format_msg("a >> b << c"), "c");
        assert_eq!(format_msg("a << b >> c"), "b >> c");
    }

    #[test]
    fn contact_name_resolution() {
        let contacts = vec![Contact {
            uid: "6281@c.us".into(),
            name: "Budi".into(),
            is_group: false,
        }];
        assert_eq!(format_contact_name("6281@c.us", &contacts), "Budi");
        assert_eq!(format_contact_name("6282@c.us", &[]), "6282");
    }

    #[test]
    fn same_day_shows_clock() {
        assert_eq!(format_last_chat_time(at(2024, 3, 15, 9, 5), &now()), "09:05 AM");
        assert_eq!(format_last_chat_time(at(2024, 3, 15, 21, 5), &now()), "09:05 PM");
    }

    #[test]
    fn calendar_days_not_elapsed_hours() {
        // 23:50 the previous evening is less than 24h ago but one calendar day back.
        assert_eq!(format_last_chat_time(at(2024, 3, 14, 23, 50), &now()), "Yesterday");
        // Early on the 13th is more than 48h ago but exactly two calendar days.
        assert_eq!(diff_days(at(2024, 3, 13, 0, 1), &now()), Some(2));
    }

    #[test]
    fn weekday_and_full_date_buckets() {
        assert_eq!(format_last_chat_time(at(2024, 3, 13, 8, 0), &now()), "Wednesday");
        assert_eq!(format_last_chat_time(at(2024, 3, 8, 8, 0), &now()), "Friday");
        assert_eq!(format_last_chat_time(at(2024, 3, 7, 8, 0), &now()), "7/3/2024");
        assert_eq!(format_last_chat_time(at(2023, 12, 25, 8, 0), &now()), "25/12/2023");
    }

    #[test]
    fn future_timestamp_falls_through_to_clock() {
        assert_eq!(format_last_chat_time(at(2024, 3, 16, 10, 0), &now()), "10:00 AM");
    }

    #[test]
    fn separators() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(format_time_separator(today, today), "Today");
        assert_eq!(
            format_time_separator(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(), today),
            "Yesterday"
        );
        assert_eq!(
            format_time_separator(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), today),
            "1/2/2024"
        );
    }

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512.00 Bytes");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }
}
