use chrono::{DateTime, SecondsFormat, Utc};

/// Source of "now" for everything that stamps or compares times.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Canonical storage form: RFC 3339, second precision, `Z` suffix.
/// Lexicographic order of these strings is chronological order.
pub fn format_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_ts(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Re-encode a client-supplied timestamp in canonical form.
pub fn normalize_ts(value: &str) -> Option<String> {
    parse_ts(value).map(format_ts)
}

#[cfg(test)]
pub use manual::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_converts_offsets_to_utc() {
        assert_eq!(
            normalize_ts("2026-03-01T10:30:00+01:00").as_deref(),
            Some("2026-03-01T09:30:00Z")
        );
        assert_eq!(
            normalize_ts("2026-03-01T09:30:00.250Z").as_deref(),
            Some("2026-03-01T09:30:00Z")
        );
        assert!(normalize_ts("tomorrow").is_none());
    }

    #[test]
    fn canonical_strings_sort_chronologically() {
        let a = format_ts(parse_ts("2026-01-09T23:00:00Z").unwrap());
        let b = format_ts(parse_ts("2026-01-10T01:00:00+02:00").unwrap());
        assert!(a < b);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at("2026-01-01T00:00:00Z");
        clock.advance(chrono::Duration::hours(25));
        assert_eq!(format_ts(clock.now()), "2026-01-02T01:00:00Z");
    }
}
