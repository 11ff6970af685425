//! Parsing of model responses into [`Event`]s.
//!
//! Models return imperfect JSON: missing fields, a single object instead of
//! an array, prose around the payload. Parsing is tolerant per item; only a
//! missing or unparseable start date drops an item, everything else falls
//! back to a default.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::dates::{parse_llm_datetime, to_berlin};
use crate::types::{is_unknown, Event, EventCategory, Location, Source, UNKNOWN};
use crate::urls::absolutize;

const MAX_DESCRIPTION_CHARS: usize = 500;

/// One event as the text model emits it. Everything is optional so one
/// sloppy field does not sink the whole batch.
#[derive(Debug, Deserialize)]
struct LlmEventItem {
    title: Option<String>,
    description: Option<String>,
    date_start: Option<String>,
    date_end: Option<String>,
    location: Option<LlmLocation>,
    category: Option<String>,
    is_indoor: Option<bool>,
    age_suitability: Option<String>,
    price_info: Option<String>,
    original_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmLocation {
    name: Option<String>,
    address: Option<String>,
    district: Option<String>,
}

/// One event as the vision model emits it. The schema is flattened because
/// vision models handle nested objects poorly.
#[derive(Debug, Deserialize)]
struct VisionEventItem {
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    time: Option<String>,
    date_end: Option<String>,
    time_end: Option<String>,
    location_name: Option<String>,
    location_address: Option<String>,
    location_district: Option<String>,
    category: Option<String>,
    is_indoor: Option<bool>,
    age_suitability: Option<String>,
    price_info: Option<String>,
    link: Option<String>,
}

/// Parse the text extraction response. Relative links resolve against
/// `base_url`, which is also the fallback when the model returns no link.
pub fn parse_event_payload(raw: &str, source: &Source, base_url: &str) -> Vec<Event> {
    let mut events = Vec::new();
    for value in items_from_payload(raw) {
        let item: LlmEventItem = match serde_json::from_value(value) {
            Ok(item) => item,
            Err(err) => {
                warn!(error = %err, "skipping malformed event item");
                continue;
            }
        };
        let Some(date_start) = item.date_start.as_deref().and_then(parse_llm_datetime) else {
            debug!(
                title = item.title.as_deref().unwrap_or(""),
                "skipping event without usable start date"
            );
            continue;
        };
        let date_end = item.date_end.as_deref().and_then(parse_llm_datetime);
        let loc = item.location.unwrap_or_default();
        events.push(Event {
            id: None,
            source_id: source.id,
            title: non_empty_or(item.title, UNKNOWN),
            description: truncate_chars(&item.description.unwrap_or_default(), MAX_DESCRIPTION_CHARS),
            date_start,
            date_end,
            location: Location {
                name: non_empty_or(loc.name, UNKNOWN),
                address: non_empty_or(loc.address, UNKNOWN),
                district: loc.district.filter(|d| !d.trim().is_empty()),
                lat: None,
                lng: None,
            },
            category: EventCategory::parse_or_default(item.category.as_deref().unwrap_or("")),
            is_indoor: item.is_indoor.unwrap_or(true),
            age_suitability: non_empty_or(item.age_suitability, "4+"),
            price_info: non_empty_or(item.price_info, UNKNOWN),
            original_link: resolve_event_link(item.original_link.as_deref(), base_url),
            region: source.region.clone(),
        });
    }
    events
}

/// Parse the screenshot extraction response. Date and time arrive as
/// separate fields; a missing time means midnight, a missing end time on a
/// multi-day event means end of day.
pub fn parse_vision_payload(raw: &str, source: &Source, source_url: &str) -> Vec<Event> {
    let mut events = Vec::new();
    for value in items_from_payload(raw) {
        let item: VisionEventItem = match serde_json::from_value(value) {
            Ok(item) => item,
            Err(err) => {
                warn!(error = %err, "skipping malformed vision item");
                continue;
            }
        };
        let Some(date) = trimmed(item.date.as_deref()) else {
            debug!(
                title = item.title.as_deref().unwrap_or(""),
                "skipping vision event without date"
            );
            continue;
        };
        let time = trimmed(item.time.as_deref()).unwrap_or("00:00");
        let Some(date_start) = parse_vision_datetime(date, time).and_then(to_berlin) else {
            debug!(date, time, "skipping vision event with unparseable date");
            continue;
        };
        let date_end = trimmed(item.date_end.as_deref())
            .and_then(|end| {
                let time_end = trimmed(item.time_end.as_deref()).unwrap_or("23:59");
                parse_vision_datetime(end, time_end)
            })
            .and_then(to_berlin);
        let link = match trimmed(item.link.as_deref()) {
            Some(link) if link.starts_with("http") => link.to_string(),
            Some(link) => absolutize(source_url, link),
            None => source_url.to_string(),
        };
        events.push(Event {
            id: None,
            source_id: source.id,
            title: non_empty_or(item.title, UNKNOWN),
            description: truncate_chars(&item.description.unwrap_or_default(), MAX_DESCRIPTION_CHARS),
            date_start,
            date_end,
            location: Location {
                name: non_empty_or(item.location_name, UNKNOWN),
                address: non_empty_or(item.location_address, UNKNOWN),
                district: item.location_district.filter(|d| !d.trim().is_empty()),
                lat: None,
                lng: None,
            },
            category: EventCategory::parse_or_default(item.category.as_deref().unwrap_or("")),
            is_indoor: item.is_indoor.unwrap_or(true),
            age_suitability: non_empty_or(item.age_suitability, "4+"),
            price_info: non_empty_or(item.price_info, UNKNOWN),
            original_link: link,
            region: source.region.clone(),
        });
    }
    events
}

/// Locate the JSON payload and return its items. A bare object counts as a
/// one-element array.
pub(crate) fn items_from_payload(raw: &str) -> Vec<Value> {
    let value = match llm_client::extract_first_json(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "no JSON payload in model response");
            return Vec::new();
        }
    };
    match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => {
            warn!("model response was neither an array nor an object");
            Vec::new()
        }
    }
}

fn parse_vision_datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn resolve_event_link(link: Option<&str>, base_url: &str) -> String {
    let link = link.map(str::trim).unwrap_or("");
    if is_unknown(link) {
        base_url.to_string()
    } else if link.starts_with("http") {
        link.to_string()
    } else {
        absolutize(base_url, link)
    }
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_source;

    const BASE: &str = "https://fundus-theater.de/spielplan";

    #[test]
    fn test_minimal_item_gets_defaults() {
        let source = sample_source("Fundus Theater");
        let raw = r#"[{"date_start": "2026-03-14T15:00:00"}]"#;
        let events = parse_event_payload(raw, &source, BASE);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.title, "Unbekannt");
        assert_eq!(event.location.name, "Unbekannt");
        assert_eq!(event.location.address, "Unbekannt");
        assert_eq!(event.category, EventCategory::Theater);
        assert!(event.is_indoor);
        assert_eq!(event.age_suitability, "4+");
        assert_eq!(event.price_info, "Unbekannt");
        assert_eq!(event.original_link, BASE);
        assert_eq!(event.region, "hamburg");
        assert!(event.id.is_none());
    }

    #[test]
    fn test_items_without_start_date_are_dropped() {
        let source = sample_source("Fundus Theater");
        let raw = r#"[
            {"title": "Ohne Datum"},
            {"title": "Kaputtes Datum", "date_start": "irgendwann"},
            {"title": "Ritter Rost", "date_start": "2026-03-14T15:00:00"}
        ]"#;
        let events = parse_event_payload(raw, &source, BASE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Ritter Rost");
    }

    #[test]
    fn test_single_object_is_wrapped() {
        let source = sample_source("Fundus Theater");
        let raw = r#"{"title": "Ritter Rost", "date_start": "2026-03-14 15:00"}"#;
        let events = parse_event_payload(raw, &source, BASE);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_fenced_payload_is_parsed() {
        let source = sample_source("Fundus Theater");
        let raw = "Hier sind die Events:\n```json\n[{\"title\": \"Ritter Rost\", \"date_start\": \"2026-03-14T15:00:00\"}]\n```";
        let events = parse_event_payload(raw, &source, BASE);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_link_resolution() {
        let source = sample_source("Fundus Theater");
        let raw = r#"[
            {"title": "A", "date_start": "2026-03-14T15:00:00", "original_link": "unbekannt"},
            {"title": "B", "date_start": "2026-03-14T15:00:00", "original_link": "/tickets/42"},
            {"title": "C", "date_start": "2026-03-14T15:00:00", "original_link": "https://vvk.de/42"}
        ]"#;
        let events = parse_event_payload(raw, &source, BASE);
        assert_eq!(events[0].original_link, BASE);
        assert_eq!(events[1].original_link, "https://fundus-theater.de/tickets/42");
        assert_eq!(events[2].original_link, "https://vvk.de/42");
    }

    #[test]
    fn test_full_item_round_trips() {
        let source = sample_source("Fundus Theater");
        let raw = r#"[{
            "title": "Der Grüffelo",
            "description": "Musikalisches Theater nach dem Bilderbuch",
            "date_start": "2026-03-14T15:00:00",
            "date_end": "2026-03-14T16:00:00",
            "location": {"name": "Fundus Theater", "address": "Hasselbrookstraße 25, 22089 Hamburg", "district": "Eilbek"},
            "category": "Theater",
            "is_indoor": true,
            "age_suitability": "4+",
            "price_info": "9€",
            "original_link": "https://fundus-theater.de/grueffelo"
        }]"#;
        let events = parse_event_payload(raw, &source, BASE);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.location.district.as_deref(), Some("Eilbek"));
        assert_eq!(event.date_end.unwrap().format("%H:%M").to_string(), "16:00");
        assert_eq!(event.price_info, "9€");
    }

    #[test]
    fn test_description_is_truncated() {
        let source = sample_source("Fundus Theater");
        let long = "ä".repeat(800);
        let raw = format!(
            r#"[{{"title": "A", "description": "{long}", "date_start": "2026-03-14T15:00:00"}}]"#
        );
        let events = parse_event_payload(&raw, &source, BASE);
        assert_eq!(events[0].description.chars().count(), 500);
    }

    #[test]
    fn test_malformed_item_does_not_sink_batch() {
        let source = sample_source("Fundus Theater");
        let raw = r#"[
            {"title": 42, "date_start": "2026-03-14T15:00:00"},
            {"title": "Gut", "date_start": "2026-03-14T15:00:00"}
        ]"#;
        let events = parse_event_payload(raw, &source, BASE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Gut");
    }

    #[test]
    fn test_vision_date_and_time_combine() {
        let source = sample_source("Zirkus Abrax");
        let raw = r#"[{
            "title": "Zirkusshow",
            "date": "2026-07-04",
            "time": "15:30",
            "date_end": "2026-07-05",
            "location_name": "Zeltplatz",
            "category": "theater",
            "link": "/tickets"
        }]"#;
        let events = parse_vision_payload(raw, &source, "https://zirkus-abrax.de/plan");
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.date_start.format("%Y-%m-%d %H:%M").to_string(), "2026-07-04 15:30");
        // missing time_end on a multi-day event means end of day
        assert_eq!(
            event.date_end.unwrap().format("%Y-%m-%d %H:%M").to_string(),
            "2026-07-05 23:59"
        );
        assert_eq!(event.original_link, "https://zirkus-abrax.de/tickets");
    }

    #[test]
    fn test_vision_missing_time_is_midnight() {
        let source = sample_source("Zirkus Abrax");
        let raw = r#"[{"title": "Fest", "date": "2026-07-04"}]"#;
        let events = parse_vision_payload(raw, &source, "https://zirkus-abrax.de/plan");
        assert_eq!(events[0].date_start.format("%H:%M").to_string(), "00:00");
        assert_eq!(events[0].original_link, "https://zirkus-abrax.de/plan");
    }

    #[test]
    fn test_vision_undated_items_are_dropped() {
        let source = sample_source("Zirkus Abrax");
        let raw = r#"[{"title": "Bald"}, {"title": "Ungültig", "date": "morgen"}]"#;
        let events = parse_vision_payload(raw, &source, "https://zirkus-abrax.de/plan");
        assert!(events.is_empty());
    }

    #[test]
    fn test_no_json_in_response() {
        let source = sample_source("Fundus Theater");
        assert!(parse_event_payload("Leider keine Events gefunden.", &source, BASE).is_empty());
    }
}
