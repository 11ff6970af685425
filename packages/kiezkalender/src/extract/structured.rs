//! Deterministic extraction for pages whose markup already encodes a
//! schedule: a heading per production, dated lines below it.
//!
//! Recognizes the common theater patterns ("Fr 06.Feb - 19:30",
//! "06.02.2026 19:30", ISO timestamps) without any model call. Absence of
//! structure is normal and yields an empty list.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::extract::dates::{berlin_today, infer_year, parse_german_month};
use crate::types::RawEvent;
use crate::urls::absolutize;

/// How many characters of sibling content to search below a heading.
const MAX_SEARCH_CHARS: usize = 500;

const MIN_TITLE_CHARS: usize = 3;

/// Headings that are page chrome rather than production titles.
const TITLE_DENYLIST: &[&str] = &[
    "spielplan",
    "termine",
    "kalender",
    "navigation",
    "menu",
    "kontakt",
];

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // "Fr 06.Feb - 19:30" (year inferred)
        Regex::new(
            r"(?i)(?P<weekday>\w{2})\s+(?P<day>\d{1,2})\.(?P<month>\w{3,})\s*-?\s*(?P<time>\d{1,2}:\d{2})",
        )
        .unwrap(),
        // "06.02.2026 19:30" or "06.02. 19:30"
        Regex::new(r"(?P<day>\d{1,2})\.(?P<month>\d{1,2})\.(?P<year>\d{4})?\s+(?P<time>\d{1,2}:\d{2})")
            .unwrap(),
        // "2026-02-06 19:30" or "2026-02-06T19:30"
        Regex::new(r"(?P<year>\d{4})-(?P<month>\d{1,2})-(?P<day>\d{1,2})[T\s](?P<time>\d{1,2}:\d{2})")
            .unwrap(),
    ]
});

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Extract raw schedule events. A heading counts only when at least two
/// distinct dates follow it; a single date below a heading is noise.
pub fn extract_raw_events(html: &str, base_url: &str) -> Vec<RawEvent> {
    let document = Html::parse_document(html);
    let Ok(heading_selector) = Selector::parse("h1, h2, h3, h4") else {
        return Vec::new();
    };
    let today = berlin_today();
    let mut events = Vec::new();
    for heading in document.select(&heading_selector) {
        let title = collapse_whitespace(&heading.text().collect::<String>());
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }
        let lowered = title.to_lowercase();
        if TITLE_DENYLIST.iter().any(|skip| lowered.contains(skip)) {
            continue;
        }
        let dated = find_dates_after(heading, base_url, today);
        if dated.len() < 2 {
            continue;
        }
        debug!(title = %title, dates = dated.len(), "structured schedule detected");
        let mut event = RawEvent::new(title);
        for (date, link) in dated {
            event.dates.push(date);
            event.links.push(link);
        }
        event.description_hint = find_description_after(heading);
        events.push(event);
    }
    events
}

/// Walk the heading's following siblings and collect (date, link) pairs.
/// Dates inside anchors are checked first so they keep the anchor's href;
/// the free-text pass then only adds dates not seen yet.
fn find_dates_after(
    heading: ElementRef<'_>,
    base_url: &str,
    today: NaiveDate,
) -> Vec<(NaiveDateTime, String)> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();
    let mut chars_searched = 0usize;

    for node in heading.next_siblings() {
        if chars_searched >= MAX_SEARCH_CHARS {
            break;
        }
        if let Some(element) = ElementRef::wrap(node) {
            let text = element.text().collect::<String>();
            chars_searched += text.chars().count();

            for anchor in element.select(&ANCHOR_SELECTOR) {
                let Some(href) = anchor.value().attr("href") else {
                    continue;
                };
                let anchor_text = collapse_whitespace(&anchor.text().collect::<String>());
                for pattern in DATE_PATTERNS.iter() {
                    if let Some(caps) = pattern.captures(&anchor_text) {
                        if let Some(date) = parse_date_match(&caps, today) {
                            if seen.insert(date) {
                                results.push((date, absolutize(base_url, href)));
                            }
                        }
                    }
                }
            }

            for pattern in DATE_PATTERNS.iter() {
                for caps in pattern.captures_iter(&text) {
                    if let Some(date) = parse_date_match(&caps, today) {
                        if seen.insert(date) {
                            let link = link_near(element, base_url)
                                .unwrap_or_else(|| base_url.to_string());
                            results.push((date, link));
                        }
                    }
                }
            }
        } else if let Some(text) = node.value().as_text() {
            chars_searched += text.chars().count();
        }
    }
    results
}

fn parse_date_match(caps: &Captures<'_>, today: NaiveDate) -> Option<NaiveDateTime> {
    let day: u32 = caps.name("day")?.as_str().parse().ok()?;
    let month = parse_german_month(caps.name("month")?.as_str());
    let year: i32 = match caps.name("year") {
        Some(year) => year.as_str().parse().ok()?,
        None => infer_year(month, today),
    };
    let (hour, minute) = caps.name("time")?.as_str().split_once(':')?;
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

/// A link for a date found in free text: the element itself, its parent,
/// or one of the next few siblings.
fn link_near(element: ElementRef<'_>, base_url: &str) -> Option<String> {
    if let Some(href) = anchor_href(element) {
        return Some(absolutize(base_url, href));
    }
    if let Some(parent) = element.parent().and_then(ElementRef::wrap) {
        if let Some(href) = anchor_href(parent) {
            return Some(absolutize(base_url, href));
        }
    }
    for node in element.next_siblings().take(3) {
        if let Some(sibling) = ElementRef::wrap(node) {
            if let Some(href) = anchor_href(sibling) {
                return Some(absolutize(base_url, href));
            }
        }
    }
    None
}

fn anchor_href<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    if element.value().name() == "a" {
        element.value().attr("href")
    } else {
        None
    }
}

/// First substantial paragraph between the heading and the next heading.
fn find_description_after(heading: ElementRef<'_>) -> Option<String> {
    for node in heading.next_siblings() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        match element.value().name() {
            "p" => {
                let text = collapse_whitespace(&element.text().collect::<String>());
                if text.chars().count() > 20 {
                    return Some(text.chars().take(300).collect());
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => break,
            _ => {}
        }
    }
    None
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
