//! Calendar-page discovery. Theatre and museum sites rarely list events on
//! their landing page; the schedule lives behind a "Spielplan" or "Termine"
//! link. Keyword scoring finds it for free in the common case, an LLM pass
//! handles the odd navigation structures.

use std::sync::Arc;

use llm_client::truncate_to_char_boundary;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::extract::prompts::format_navigation_prompt;
use crate::fetch::PageFetcher;
use crate::traits::{CompletionRequest, LanguageModel};
use crate::types::Source;
use crate::urls::{absolutize, is_skippable_href, is_valid_http};

/// Strong calendar signals. Href hits weigh more than text hits since
/// slugs are more stable than link labels.
const PRIMARY_KEYWORDS: &[&str] = &[
    "spielplan",
    "termine",
    "kalender",
    "vorstellungen",
    "aufführungen",
    "auffuehrungen",
    "tickets",
];

const SECONDARY_KEYWORDS: &[&str] = &[
    "programm",
    "veranstaltungen",
    "events",
    "eventkalender",
    "terminkalender",
];

/// Repertoire and season overviews list productions without dates; they
/// score negative so a real schedule link always outranks them.
const DEPRIORITIZED_KEYWORDS: &[&str] = &[
    "stücke",
    "stuecke",
    "stück",
    "stueck",
    "repertoire",
    "produktionen",
    "produktion",
    "inszenierungen",
    "ensemble",
    "spielzeit",
    "aktuelles",
    "aktuelle stücke",
];

const NAV_SELECTORS: &[&str] = &["nav", "header", "footer", "menu"];
const MAX_NAV_CHARS: usize = 8000;
const MAX_FALLBACK_LINKS: usize = 50;
const NAVIGATION_MAX_TOKENS: u32 = 200;

pub struct Navigator {
    fetcher: PageFetcher,
    llm: Option<Arc<dyn LanguageModel>>,
}

impl Navigator {
    pub fn new(fetcher: PageFetcher, llm: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { fetcher, llm }
    }

    /// Find the calendar URL for a source, or `None` if neither keyword
    /// scoring nor the LLM turns one up. Never fails.
    pub async fn discover(&self, source: &Source) -> Option<String> {
        let page = self.fetcher.fetch(&source.input_url).await?;

        if let Some(url) = score_links(&page.html, &source.input_url) {
            info!(source = %source.name, url = %url, "calendar link found by keyword scoring");
            return Some(url);
        }

        let llm = self.llm.as_ref()?;
        let snippet = navigation_markup(&page.html);
        if snippet.is_empty() {
            debug!(source = %source.name, "no navigation markup to hand to the LLM");
            return None;
        }

        let request = CompletionRequest::new(format_navigation_prompt(&source.input_url, &snippet))
            .with_max_tokens(NAVIGATION_MAX_TOKENS);
        let completion = match llm.complete(request).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!(source = %source.name, error = %err, "navigation LLM call failed");
                return None;
            }
        };

        let answer = completion.text.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("none") {
            debug!(source = %source.name, "LLM found no calendar link");
            return None;
        }
        let url = if answer.starts_with('/') {
            absolutize(&source.input_url, answer)
        } else {
            answer.to_string()
        };
        if !is_valid_http(&url) {
            warn!(source = %source.name, answer, "LLM navigation answer is not a usable URL");
            return None;
        }
        info!(source = %source.name, url = %url, "calendar link found by LLM");
        Some(url)
    }
}

fn link_score(href: &str, text: &str) -> i32 {
    let mut score = 0;
    for keyword in PRIMARY_KEYWORDS {
        if href.contains(keyword) {
            score += 4;
        }
        if text.contains(keyword) {
            score += 3;
        }
    }
    for keyword in SECONDARY_KEYWORDS {
        if href.contains(keyword) {
            score += 2;
        }
        if text.contains(keyword) {
            score += 1;
        }
    }
    for keyword in DEPRIORITIZED_KEYWORDS {
        if href.contains(keyword) {
            score -= 3;
        }
        if text.contains(keyword) {
            score -= 2;
        }
    }
    score
}

/// Score every anchor on the page; highest positive score wins, earlier
/// anchors win ties.
fn score_links(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;
    let mut best: Option<(i32, String)> = None;
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if is_skippable_href(href) {
            continue;
        }
        let text = element
            .text()
            .collect::<String>()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let score = link_score(&href.to_lowercase(), &text);
        if score <= 0 {
            continue;
        }
        let url = absolutize(base_url, href);
        if !is_valid_http(&url) {
            continue;
        }
        if best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, url));
        }
    }
    best.map(|(_, url)| url)
}

/// Navigation-relevant markup for the LLM fallback: nav/header/footer/menu
/// elements, or a bare link list when the page has none of those.
fn navigation_markup(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();
    for tag in NAV_SELECTORS {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        for element in document.select(&selector) {
            parts.push(element.html());
        }
    }
    if parts.is_empty() {
        if let Ok(selector) = Selector::parse("a[href]") {
            for element in document.select(&selector).take(MAX_FALLBACK_LINKS) {
                let Some(href) = element.value().attr("href") else {
                    continue;
                };
                if href.starts_with("javascript:") || href.starts_with('#') {
                    continue;
                }
                let text = element
                    .text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                if text.is_empty() {
                    continue;
                }
                parts.push(format!("<a href=\"{href}\">{text}</a>"));
            }
        }
    }
    let markup = parts.join("\n");
    let truncated = truncate_to_char_boundary(&markup, MAX_NAV_CHARS);
    if truncated.len() < markup.len() {
        format!("{truncated}...")
    } else {
        markup
    }
}
