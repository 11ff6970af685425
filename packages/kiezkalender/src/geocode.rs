//! Nominatim geocoding with an on-disk cache and a global rate limit.
//!
//! Nominatim's usage policy allows at most one request per second, so the
//! limiter sits in front of every outbound request. Cache hits, including
//! cached misses, never touch the network.

use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::traits::KeyValueCache;
use crate::types::{is_unknown, Event, Location};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeEntry {
    lat: Option<f64>,
    lng: Option<f64>,
    #[serde(default)]
    miss: bool,
}

pub struct Geocoder {
    client: reqwest::Client,
    cache: Arc<dyn KeyValueCache>,
    limiter: DirectRateLimiter,
    base_url: String,
    region: String,
    enabled: bool,
}

impl Geocoder {
    pub fn new(config: &ScraperConfig, cache: Arc<dyn KeyValueCache>) -> Result<Self> {
        let quota = Quota::with_period(config.geocoding_min_delay).ok_or_else(|| {
            ScrapeError::Config("GEOCODING_MIN_DELAY_MS must be greater than zero".to_string())
        })?;
        let client = reqwest::Client::builder()
            .user_agent(&config.geocoding_user_agent)
            .timeout(config.geocoding_timeout)
            .build()
            .map_err(|err| ScrapeError::Geocode(err.to_string()))?;
        Ok(Self {
            client,
            cache,
            limiter: RateLimiter::direct(quota),
            base_url: config.geocoding_base_url.clone(),
            region: config.region.clone(),
            enabled: config.geocoding_enabled,
        })
    }

    /// Resolve coordinates for events that have none. Returns how many
    /// events got coordinates; failures are cached and skipped, never
    /// propagated.
    pub async fn enrich_events(&self, events: &mut [Event]) -> usize {
        if !self.enabled || events.is_empty() {
            return 0;
        }
        let mut geocoded = 0;
        for event in events.iter_mut() {
            if event.location.has_coordinates() {
                continue;
            }
            let Some(query) = build_query(&event.location, &self.region) else {
                continue;
            };
            let key = cache_key(&query);

            if let Some(value) = self.cache.get(&key).await {
                if let Ok(entry) = serde_json::from_value::<GeocodeEntry>(value) {
                    if entry.miss {
                        debug!(query, "cached geocoding miss");
                        continue;
                    }
                    if let (Some(lat), Some(lng)) = (entry.lat, entry.lng) {
                        event.location.lat = Some(lat);
                        event.location.lng = Some(lng);
                        geocoded += 1;
                        continue;
                    }
                }
                // malformed entry, re-query and overwrite
            }

            match self.lookup(&query).await {
                Ok(Some((lat, lng))) => {
                    event.location.lat = Some(lat);
                    event.location.lng = Some(lng);
                    geocoded += 1;
                    self.cache.put(&key, json!({"lat": lat, "lng": lng})).await;
                }
                Ok(None) => {
                    debug!(query, "no geocoding result");
                    self.cache.put(&key, json!({"miss": true})).await;
                }
                Err(err) => {
                    warn!(query, error = %err, "geocoding failed");
                    self.cache.put(&key, json!({"miss": true})).await;
                }
            }
        }
        if let Err(err) = self.cache.flush().await {
            warn!(error = %err, "geocode cache flush failed");
        }
        geocoded
    }

    async fn lookup(&self, query: &str) -> Result<Option<(f64, f64)>> {
        self.limiter.until_ready().await;
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("format", "json"),
                ("q", query),
                ("limit", "1"),
                ("addressdetails", "0"),
            ])
            .send()
            .await
            .map_err(|err| ScrapeError::Geocode(err.to_string()))?
            .error_for_status()
            .map_err(|err| ScrapeError::Geocode(err.to_string()))?;
        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|err| ScrapeError::Geocode(err.to_string()))?;
        let Some(place) = places.first() else {
            return Ok(None);
        };
        let lat = place
            .lat
            .parse::<f64>()
            .map_err(|err| ScrapeError::Geocode(err.to_string()))?;
        let lng = place
            .lon
            .parse::<f64>()
            .map_err(|err| ScrapeError::Geocode(err.to_string()))?;
        Ok(Some((lat, lng)))
    }
}

/// Best query Nominatim has a chance with: street address if known, venue
/// name otherwise, plus district and region unless already part of it.
fn build_query(location: &Location, region: &str) -> Option<String> {
    let base = if !is_unknown(&location.address) {
        location.address.trim().to_string()
    } else if !is_unknown(&location.name) {
        location.name.trim().to_string()
    } else {
        return None;
    };
    let mut parts = vec![base];
    if let Some(district) = &location.district {
        let district = district.trim();
        if !district.is_empty() && !contains_ci(&parts[0], district) {
            parts.push(district.to_string());
        }
    }
    let region = region.trim();
    if !region.is_empty() && !contains_ci(&parts.join(", "), region) {
        parts.push(title_case(region));
    }
    let mut query = parts.join(", ");
    if !query.to_lowercase().contains("germany") {
        query.push_str(", Germany");
    }
    Some(query)
}

fn cache_key(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::stores::MemoryCache;
    use crate::testing::{sample_event, test_config};

    #[test]
    fn test_build_query_prefers_address() {
        let location = Location::new("Fundus Theater", "Hasselbrookstraße 25, 22089 Hamburg");
        let query = build_query(&location, "hamburg").unwrap();
        assert_eq!(query, "Hasselbrookstraße 25, 22089 Hamburg, Germany");
    }

    #[test]
    fn test_build_query_falls_back_to_name_with_district() {
        let mut location = Location::with_unknown_address("Zinnschmelze");
        location.district = Some("Barmbek".to_string());
        let query = build_query(&location, "hamburg").unwrap();
        assert_eq!(query, "Zinnschmelze, Barmbek, Hamburg, Germany");
    }

    #[test]
    fn test_build_query_skips_redundant_parts() {
        let mut location = Location::new("Egal", "Museumstraße 23, Hamburg-Altona");
        location.district = Some("Altona".to_string());
        let query = build_query(&location, "hamburg").unwrap();
        assert_eq!(query, "Museumstraße 23, Hamburg-Altona, Germany");
    }

    #[test]
    fn test_build_query_nothing_usable() {
        assert_eq!(build_query(&Location::with_unknown_address("Unbekannt"), "hamburg"), None);
    }

    #[test]
    fn test_cache_key_normalizes() {
        assert_eq!(
            cache_key("Zinnschmelze,  Barmbek, Germany"),
            "zinnschmelze, barmbek, germany"
        );
    }

    #[tokio::test]
    async fn test_cached_coordinates_applied_without_lookup() {
        let mut config = test_config();
        // unparseable base URL: any accidental network call fails instantly
        config.geocoding_base_url = "not a url".to_string();
        let cache = Arc::new(MemoryCache::new());
        cache
            .put(
                "hasselbrookstraße 25, 22089 hamburg, germany",
                json!({"lat": 53.568, "lng": 10.042}),
            )
            .await;
        let geocoder = Geocoder::new(&config, cache).unwrap();
        let mut events = vec![sample_event("Grüffelo", "2026-05-10T16:00:00", "Fundus Theater")];
        events[0].location.address = "Hasselbrookstraße 25, 22089 Hamburg".to_string();

        let geocoded = geocoder.enrich_events(&mut events).await;

        assert_eq!(geocoded, 1);
        assert_eq!(events[0].location.lat, Some(53.568));
        assert_eq!(events[0].location.lng, Some(10.042));
    }

    #[tokio::test]
    async fn test_cached_miss_not_requeried() {
        let mut config = test_config();
        config.geocoding_base_url = "not a url".to_string();
        let cache = Arc::new(MemoryCache::new());
        cache.put("nirgendwo 1, hamburg, germany", json!({"miss": true})).await;
        let geocoder = Geocoder::new(&config, cache.clone()).unwrap();
        let mut events = vec![sample_event("Hoffest", "2026-05-12T14:00:00", "Nirgendwo")];
        events[0].location.address = "Nirgendwo 1, Hamburg".to_string();

        let geocoded = geocoder.enrich_events(&mut events).await;

        assert_eq!(geocoded, 0);
        assert!(events[0].location.lat.is_none());
        // entry survives untouched
        assert_eq!(
            cache.get("nirgendwo 1, hamburg, germany").await,
            Some(json!({"miss": true}))
        );
    }

    #[tokio::test]
    async fn test_failed_lookup_cached_as_miss() {
        let mut config = test_config();
        config.geocoding_base_url = "not a url".to_string();
        let cache = Arc::new(MemoryCache::new());
        let geocoder = Geocoder::new(&config, cache.clone()).unwrap();
        let mut events = vec![sample_event("Hoffest", "2026-05-12T14:00:00", "Zinnschmelze")];

        let geocoded = geocoder.enrich_events(&mut events).await;

        assert_eq!(geocoded, 0);
        assert_eq!(
            cache.get("zinnschmelze, hamburg, germany").await,
            Some(json!({"miss": true}))
        );
    }

    #[tokio::test]
    async fn test_disabled_geocoder_does_nothing() {
        let mut config = test_config();
        config.geocoding_enabled = false;
        let cache = Arc::new(MemoryCache::new());
        let geocoder = Geocoder::new(&config, cache).unwrap();
        let mut events = vec![sample_event("Grüffelo", "2026-05-10T16:00:00", "Fundus Theater")];

        assert_eq!(geocoder.enrich_events(&mut events).await, 0);
        assert!(events[0].location.lat.is_none());
    }

    #[tokio::test]
    async fn test_events_with_coordinates_skipped() {
        let mut config = test_config();
        config.geocoding_base_url = "not a url".to_string();
        let cache = Arc::new(MemoryCache::new());
        let geocoder = Geocoder::new(&config, cache.clone()).unwrap();
        let mut events = vec![sample_event("Grüffelo", "2026-05-10T16:00:00", "Fundus Theater")];
        events[0].location.lat = Some(53.55);
        events[0].location.lng = Some(10.0);

        assert_eq!(geocoder.enrich_events(&mut events).await, 0);
        assert!(cache.get("fundus theater, hamburg, germany").await.is_none());
    }
}
