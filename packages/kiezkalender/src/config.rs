//! Pipeline configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::error::{Result, ScrapeError};

/// Domains that serve empty markup without JavaScript and always need the
/// headless browser.
pub const DEFAULT_JS_REQUIRED_DOMAINS: &[&str] = &["kindaling.de", "kinderzeit-bremen.de"];

/// Runtime configuration for the whole pipeline.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    /// Model used for navigation, extraction and venue lookups.
    pub text_model: String,
    /// Model used for screenshot extraction.
    pub vision_model: String,
    pub http_timeout: Duration,
    pub render_timeout: Duration,
    /// How long a rendered page gets to settle before the DOM is read.
    pub settle_delay: Duration,
    pub max_iframes: usize,
    /// Character budget for markdown sent to the model.
    pub max_content_length: usize,
    /// Markdown lines whose dates all fall outside this many days are dropped.
    pub date_window_days: i64,
    pub geocoding_enabled: bool,
    /// Minimum delay between outbound geocoding requests.
    pub geocoding_min_delay: Duration,
    pub geocoding_timeout: Duration,
    pub geocoding_user_agent: String,
    pub geocoding_base_url: String,
    pub venue_cache_path: PathBuf,
    pub geocode_cache_path: PathBuf,
    pub store_path: PathBuf,
    pub region: String,
    pub js_required_domains: Vec<String>,
}

impl ScraperConfig {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default; only unparseable numeric values error.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            text_model: env::var("SCRAPER_TEXT_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            vision_model: env::var("SCRAPER_VISION_MODEL")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECONDS", 30)?),
            render_timeout: Duration::from_secs(parse_env("RENDER_TIMEOUT_SECONDS", 60)?),
            settle_delay: Duration::from_millis(parse_env("RENDER_SETTLE_MS", 2000)?),
            max_iframes: parse_env("MAX_IFRAMES", 3)?,
            max_content_length: parse_env("MAX_CONTENT_LENGTH", 15_000)?,
            date_window_days: parse_env("DATE_WINDOW_DAYS", 45)?,
            geocoding_enabled: env_flag("GEOCODING_ENABLED", true),
            geocoding_min_delay: Duration::from_millis(parse_env("GEOCODING_MIN_DELAY_MS", 1100)?),
            geocoding_timeout: Duration::from_secs(parse_env("GEOCODING_TIMEOUT_SECONDS", 10)?),
            geocoding_user_agent: env::var("GEOCODING_USER_AGENT")
                .unwrap_or_else(|_| "kiezkalender/1.0".to_string()),
            geocoding_base_url: env::var("GEOCODING_BASE_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/search".to_string()),
            venue_cache_path: env_path("VENUE_CACHE_PATH", "data/venue_addresses.json"),
            geocode_cache_path: env_path("GEOCODE_CACHE_PATH", "data/geocode_cache.json"),
            store_path: env_path("STORE_PATH", "data/store.json"),
            region: env::var("SCRAPER_REGION").unwrap_or_else(|_| "hamburg".to_string()),
            js_required_domains: env::var("JS_REQUIRED_DOMAINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|d| d.trim().to_string())
                        .filter(|d| !d.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    DEFAULT_JS_REQUIRED_DOMAINS
                        .iter()
                        .map(|d| d.to_string())
                        .collect()
                }),
        })
    }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ScrapeError::Config(format!("{name} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => !matches!(raw.trim().to_lowercase().as_str(), "false" | "0" | "no"),
        Err(_) => default,
    }
}

fn env_path(name: &str, default: &str) -> PathBuf {
    env::var(name).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}
