//! Domain types shared across the pipeline.

mod event;
mod raw;
mod report;
mod source;

pub use event::{is_unknown, Event, EventCategory, Location, UNKNOWN, UNKNOWN_TOKENS};
pub use raw::RawEvent;
pub use report::ScrapeReport;
pub use source::{
    ScrapeStrategy, ScrapingMode, Source, SourceStatus, SourceType, SourceUpdate,
};
