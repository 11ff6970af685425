//! Venue address enrichment. Extraction often yields a venue name with no
//! address ("Zinnschmelze"); well-known Hamburg venues can be resolved from
//! LLM world knowledge, and resolved addresses are cached on disk so each
//! venue is paid for once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use llm_client::extract_first_json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::extract::prompts::format_venue_lookup_prompt;
use crate::traits::{CompletionRequest, KeyValueCache, LanguageModel};
use crate::types::{is_unknown, Event};

const VENUE_LOOKUP_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichmentOutcome {
    pub enriched: usize,
    pub tokens_used: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VenueEntry {
    address: String,
    #[serde(default)]
    district: Option<String>,
}

pub struct LocationEnricher {
    llm: Arc<dyn LanguageModel>,
    cache: Arc<dyn KeyValueCache>,
}

impl LocationEnricher {
    pub fn new(llm: Arc<dyn LanguageModel>, cache: Arc<dyn KeyValueCache>) -> Self {
        Self { llm, cache }
    }

    /// Fill in addresses for events whose venue is named but address is
    /// unknown. Cache first, then one LLM call for all remaining venues.
    /// Failures leave events untouched.
    pub async fn enrich(&self, events: &mut [Event]) -> EnrichmentOutcome {
        let mut outcome = EnrichmentOutcome::default();
        let mut misses = Vec::new();

        for index in 0..events.len() {
            if !events[index].location.needs_address() {
                continue;
            }
            let key = venue_key(&events[index].location.name);
            match self.cache.get(&key).await {
                Some(value) => match serde_json::from_value::<VenueEntry>(value) {
                    Ok(entry) => {
                        if apply_entry(&mut events[index], &entry) {
                            outcome.enriched += 1;
                        }
                    }
                    Err(err) => {
                        warn!(key, error = %err, "unusable venue cache entry");
                        misses.push(index);
                    }
                },
                None => misses.push(index),
            }
        }
        if misses.is_empty() {
            return outcome;
        }

        let mut names = Vec::new();
        let mut seen = HashSet::new();
        for &index in &misses {
            let name = events[index].location.name.clone();
            if seen.insert(venue_key(&name)) {
                names.push(name);
            }
        }
        debug!(venues = names.len(), "looking up venue addresses");

        let request = CompletionRequest::new(format_venue_lookup_prompt(&names))
            .with_max_tokens(VENUE_LOOKUP_MAX_TOKENS);
        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!(error = %err, "venue lookup failed, addresses stay unknown");
                return outcome;
            }
        };
        outcome.tokens_used += completion.tokens_used;

        let Some(resolved) = parse_venue_map(&completion.text) else {
            warn!("venue lookup response was not a name/address map");
            return outcome;
        };

        for &index in &misses {
            let name = events[index].location.name.clone();
            let Some(Some(entry)) = resolved.get(&name) else {
                continue;
            };
            if apply_entry(&mut events[index], entry) {
                outcome.enriched += 1;
                self.cache
                    .put(
                        &venue_key(&name),
                        json!({"address": entry.address, "district": entry.district}),
                    )
                    .await;
            }
        }

        if let Err(err) = self.cache.flush().await {
            warn!(error = %err, "venue cache flush failed");
        }
        outcome
    }
}

fn venue_key(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unsure answers (empty or placeholder addresses) are never applied.
fn apply_entry(event: &mut Event, entry: &VenueEntry) -> bool {
    if entry.address.trim().is_empty() || is_unknown(&entry.address) {
        return false;
    }
    event.location.address = entry.address.clone();
    if let Some(district) = &entry.district {
        if !district.trim().is_empty() {
            event.location.district = Some(district.clone());
        }
    }
    true
}

fn parse_venue_map(text: &str) -> Option<HashMap<String, Option<VenueEntry>>> {
    let value = extract_first_json(text).ok()?;
    serde_json::from_value(value).ok()
}
