//! Scraper for family event calendars.
//!
//! Takes a list of configured sources (theatre, museum and community
//! sites, mostly Hamburg), finds each source's calendar page, extracts
//! events with a mix of deterministic parsing and LLM extraction,
//! resolves venue addresses and coordinates, and writes deduplicated
//! events to a store.
//!
//! The building blocks are usable on their own; [`batch::run_batch`]
//! wires them into the full nightly run.

pub mod batch;
pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod geocode;
pub mod llm;
pub mod navigate;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
mod urls;

pub use batch::{cleanup_old_events, run_batch, BatchSummary};
pub use config::ScraperConfig;
pub use error::{Result, ScrapeError};
pub use pipeline::Pipeline;
pub use types::{Event, EventCategory, Location, ScrapeReport, Source};
