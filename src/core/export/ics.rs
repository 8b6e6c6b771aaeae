use chrono::{DateTime, Utc};

use crate::core::clock::parse_ts;
use crate::core::store::types::Appointment;

const MAX_LINE_OCTETS: usize = 75;

/// RFC 5545 TEXT escaping.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Split a content line into CRLF-joined chunks of at most 75 octets,
/// continuation chunks starting with a space. Never splits a UTF-8 sequence.
fn fold_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut current = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if current + len > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            current = 1;
        }
        out.push(c);
        current += len;
    }
    out.push_str("\r\n");
    out
}

fn ics_time(t: DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

fn ics_time_str(ts: &str) -> String {
    parse_ts(ts).map(ics_time).unwrap_or_default()
}

/// A VCALENDAR holding one VEVENT for the appointment.
pub fn appointment_ics(appointment: &Appointment, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//immocrm//Agenda//FR".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@immocrm", appointment.id),
        format!("DTSTAMP:{}", ics_time(now)),
        format!("DTSTART:{}", ics_time_str(&appointment.starts_at)),
        format!("DTEND:{}", ics_time_str(&appointment.ends_at)),
        format!("SUMMARY:{}", escape_text(&appointment.title)),
    ];
    if let Some(location) = &appointment.location {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    if let Some(notes) = &appointment.notes {
        lines.push(format!("DESCRIPTION:{}", escape_text(notes)));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    lines.iter().map(|line| fold_line(line)).collect()
}
