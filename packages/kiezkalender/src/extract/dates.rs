//! Date parsing shared by the extractors.
//!
//! German event listings write dates a dozen ways ("Fr 06.Feb - 19:30",
//! "06.02.2026 19:30", ISO). Everything is interpreted as Europe/Berlin wall
//! time and carried with its UTC offset from there on.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Europe::Berlin;

/// Formats the model is asked to use, plus common deviations it produces.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Today's date in Europe/Berlin.
pub fn berlin_today() -> NaiveDate {
    Utc::now().with_timezone(&Berlin).date_naive()
}

/// Resolve a wall-clock time to Europe/Berlin. Ambiguous times during the
/// DST fallback hour take the earlier offset; nonexistent times during the
/// spring-forward gap resolve to `None`.
pub fn to_berlin(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    Berlin
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Parse a date string from a model response. Date-only strings become
/// midnight Berlin time.
pub fn parse_llm_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return to_berlin(naive);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return to_berlin(date.and_hms_opt(0, 0, 0)?);
        }
    }
    None
}

/// Map a German month name or a month number to 1..=12.
///
/// Names match on their first three characters ("Feb", "Februar", "Sept").
/// Unknown names fall back to January; out-of-range numbers pass through and
/// fail later at date construction.
pub fn parse_german_month(raw: &str) -> u32 {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().unwrap_or(1);
    }
    let lowered = raw.to_lowercase();
    let prefix: String = lowered.chars().take(3).collect();
    match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mär" | "mae" => 3,
        "apr" => 4,
        "mai" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "okt" => 10,
        "nov" => 11,
        "dez" => 12,
        _ => 1,
    }
}

/// Infer the year for a yearless listing date: the current year, or the next
/// one when the month already passed.
pub fn infer_year(month: u32, today: NaiveDate) -> i32 {
    if month < today.month() {
        today.year() + 1
    } else {
        today.year()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_llm_datetime_formats() {
        for raw in [
            "2026-02-15T15:00:00",
            "2026-02-15T15:00",
            "2026-02-15 15:00:00",
            "2026-02-15 15:00",
            "15.02.2026 15:00",
        ] {
            let parsed = parse_llm_datetime(raw).unwrap();
            assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2026-02-15 15:00");
        }
    }

    #[test]
    fn test_parse_llm_datetime_date_only() {
        let parsed = parse_llm_datetime("2026-02-15").unwrap();
        assert_eq!(parsed.format("%H:%M").to_string(), "00:00");

        let parsed = parse_llm_datetime("15.02.2026").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2026-02-15");
    }

    #[test]
    fn test_parse_llm_datetime_rejects_garbage() {
        assert!(parse_llm_datetime("").is_none());
        assert!(parse_llm_datetime("morgen um drei").is_none());
        assert!(parse_llm_datetime("2026-13-40T12:00").is_none());
    }

    #[test]
    fn test_berlin_offsets_are_dst_aware() {
        // Winter is CET (+01:00), summer is CEST (+02:00).
        let winter = parse_llm_datetime("2026-02-15T15:00").unwrap();
        assert_eq!(winter.offset().local_minus_utc(), 3600);

        let summer = parse_llm_datetime("2026-07-15T15:00").unwrap();
        assert_eq!(summer.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_parse_german_month_names() {
        assert_eq!(parse_german_month("Feb"), 2);
        assert_eq!(parse_german_month("Februar"), 2);
        assert_eq!(parse_german_month("märz"), 3);
        assert_eq!(parse_german_month("Maerz"), 3);
        assert_eq!(parse_german_month("SEPT"), 9);
        assert_eq!(parse_german_month("Dezember"), 12);
        assert_eq!(parse_german_month("Brumaire"), 1);
    }

    #[test]
    fn test_parse_german_month_numeric() {
        assert_eq!(parse_german_month("2"), 2);
        assert_eq!(parse_german_month("11"), 11);
        // Out of range passes through, date construction rejects it later.
        assert_eq!(parse_german_month("13"), 13);
    }

    #[test]
    fn test_infer_year_rolls_over() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();
        assert_eq!(infer_year(9, today), 2026);
        assert_eq!(infer_year(8, today), 2026);
        assert_eq!(infer_year(3, today), 2027);
    }
}
