//! The event model shared by every pipeline stage.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder for venue details that are not known yet.
pub const UNKNOWN: &str = "Unbekannt";

/// Tokens a model returns when it has no value. Compared lowercased and
/// trimmed.
pub const UNKNOWN_TOKENS: &[&str] = &["unbekannt", "unknown", "k.a.", "ka", ""];

/// True when `value` is empty or one of the unknown tokens.
pub fn is_unknown(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    UNKNOWN_TOKENS.contains(&normalized.as_str())
}

/// Event categories. Unrecognized input falls back to [`EventCategory::Theater`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Theater,
    Outdoor,
    Museum,
    Music,
    Sport,
    Market,
    Kreativ,
    Lesen,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Theater => "theater",
            Self::Outdoor => "outdoor",
            Self::Museum => "museum",
            Self::Music => "music",
            Self::Sport => "sport",
            Self::Market => "market",
            Self::Kreativ => "kreativ",
            Self::Lesen => "lesen",
        }
    }

    /// Parse a category label the way models emit them. Anything
    /// unrecognized becomes `Theater`.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "theater" => Self::Theater,
            "outdoor" => Self::Outdoor,
            "museum" => Self::Museum,
            "music" => Self::Music,
            "sport" => Self::Sport,
            "market" => Self::Market,
            "kreativ" => Self::Kreativ,
            "lesen" => Self::Lesen,
            _ => Self::Theater,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an event takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl Location {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            district: None,
            lat: None,
            lng: None,
        }
    }

    /// A venue with a name but no usable address yet.
    pub fn with_unknown_address(name: impl Into<String>) -> Self {
        Self::new(name, UNKNOWN)
    }

    pub fn has_coordinates(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }

    /// True when the venue is named but the address is still a placeholder.
    pub fn needs_address(&self) -> bool {
        !self.name.trim().is_empty() && is_unknown(&self.address)
    }
}

/// A single dated family event.
///
/// `id` is the content fingerprint and is only set once the event has
/// passed deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub source_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date_start: DateTime<FixedOffset>,
    #[serde(default)]
    pub date_end: Option<DateTime<FixedOffset>>,
    pub location: Location,
    pub category: EventCategory,
    #[serde(default = "default_is_indoor")]
    pub is_indoor: bool,
    #[serde(default = "default_age_suitability")]
    pub age_suitability: String,
    #[serde(default = "default_price_info")]
    pub price_info: String,
    #[serde(default)]
    pub original_link: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_is_indoor() -> bool {
    true
}

fn default_age_suitability() -> String {
    "4+".to_string()
}

fn default_price_info() -> String {
    UNKNOWN.to_string()
}

pub(crate) fn default_region() -> String {
    "hamburg".to_string()
}
