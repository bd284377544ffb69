//! Turns an ordered thread into a flat list with a date separator before the
//! first message of each calendar day. Pure: no store access.

use chrono::{Datelike, Local, NaiveDate, TimeZone};

use chirp_types::models::{Message, ThreadEntry};

/// `messages` must already be in thread order. Days are taken in `tz`;
/// `today` only decides whether labels carry a year.
pub fn group_by_date<Tz: TimeZone>(messages: &[Message], tz: &Tz, today: NaiveDate) -> Vec<ThreadEntry> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    let mut last_day: Option<NaiveDate> = None;

    for message in messages {
        let day = message.created_at.with_timezone(tz).date_naive();
        if last_day != Some(day) {
            out.push(ThreadEntry::DateSeparator(date_label(day, today)));
            last_day = Some(day);
        }
        out.push(ThreadEntry::Message(message.clone()));
    }

    out
}

/// `group_by_date` in the process-local zone, relative to the current date.
pub fn group_by_local_date(messages: &[Message]) -> Vec<ThreadEntry> {
    group_by_date(messages, &Local, Local::now().date_naive())
}

/// "Mar 4" within the current year, "Mar 4, 2023" otherwise.
pub fn date_label(day: NaiveDate, today: NaiveDate) -> String {
    if day.year() == today.year() {
        day.format("%b %-d").to_string()
    } else {
        day.format("%b %-d, %Y").to_string()
    }
}

/// Bubble timestamp, "HH:MM" in `tz`.
pub fn time_label<Tz: TimeZone>(message: &Message, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    message.created_at.with_timezone(tz).format("%H:%M").to_string()
}

/// Drop the separators again.
pub fn flatten(entries: &[ThreadEntry]) -> Vec<Message> {
    entries
        .iter()
        .filter_map(ThreadEntry::as_message)
        .cloned()
        .collect()
}
