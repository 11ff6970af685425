//! Intermediate artifacts of the structured extraction pass.

use chrono::NaiveDateTime;

/// A heading with at least two dated lines below it.
///
/// `dates` and `links` run in parallel: `links[i]` is the detail link found
/// next to `dates[i]` (or the page URL when none was nearby).
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub title: String,
    pub dates: Vec<NaiveDateTime>,
    pub links: Vec<String>,
    /// Venue name when the page states one near the heading.
    pub location_hint: Option<String>,
    /// First paragraph after the heading, if any.
    pub description_hint: Option<String>,
}

impl RawEvent {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            dates: Vec::new(),
            links: Vec::new(),
            location_hint: None,
            description_hint: None,
        }
    }
}
