//! HTML to Markdown conversion for the extraction prompt.
//!
//! Produces two things per page: a compact markdown body (main content plus
//! inlined iframe content) and a plain-text link inventory the model uses to
//! pick detail links. Lines whose dates all fall outside the scrape window
//! are dropped before the markdown is truncated to the token budget.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use htmd::HtmlToMarkdown;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::extract::dates::berlin_today;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::urls::{absolutize, is_skippable_href, is_valid_http};

/// Selectors tried in order for the main content area.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    ".content",
    "#content",
    ".main",
];

/// Elements removed because they are invisible in a browser.
const HIDDEN_SELECTORS: &[&str] = &[
    "[hidden]",
    "[style*='display:none']",
    "[style*='display: none']",
];

/// Tags htmd should not render at all.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "svg", "img"];

const MAX_INVENTORY_LINKS: usize = 200;
const TRUNCATION_NOTICE: &str = "\n\n[... Content truncated ...]";
const NO_LINKS: &str = "Keine Links gefunden.";

static RE_DAY_MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b").unwrap());
static RE_ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

/// Markdown body and link inventory for one page.
#[derive(Debug, Clone)]
pub struct PageView {
    pub markdown: String,
    pub link_inventory: String,
}

/// Everything extracted from one HTML document in a single parse.
struct DocumentView {
    markdown: String,
    links: Vec<(String, String)>,
    iframe_srcs: Vec<String>,
}

pub struct MarkdownConverter {
    fetcher: PageFetcher,
    http: HttpFetcher,
    max_iframes: usize,
    max_content_length: usize,
    date_window_days: i64,
}

impl MarkdownConverter {
    pub fn new(config: &ScraperConfig, fetcher: PageFetcher, http: HttpFetcher) -> Self {
        Self {
            fetcher,
            http,
            max_iframes: config.max_iframes,
            max_content_length: config.max_content_length,
            date_window_days: config.date_window_days,
        }
    }

    /// Convert an already fetched page. Embedded iframes are fetched and
    /// appended as marked blocks, published Google Sheets as CSV.
    pub async fn page_view(&self, url: &str, html: &str) -> PageView {
        let doc = analyze_document(html, url, true);
        let mut markdown = doc.markdown;
        let mut links = doc.links;

        let mut expanded = 0usize;
        for src in doc.iframe_srcs {
            if expanded >= self.max_iframes {
                break;
            }
            if let Some(csv_url) = sheets_csv_url(&src) {
                match self.http.get_text(&csv_url).await {
                    Ok(csv) => {
                        markdown.push_str(&embedded_block(&src, csv.trim()));
                        expanded += 1;
                    }
                    Err(err) => {
                        warn!(url = %csv_url, error = %err, "published sheet fetch failed");
                    }
                }
                continue;
            }
            let Some(page) = self.fetcher.fetch(&src).await else {
                continue;
            };
            let frame = analyze_document(&page.html, &src, false);
            markdown.push_str(&embedded_block(&src, &frame.markdown));
            links.extend(frame.links);
            expanded += 1;
        }
        if expanded > 0 {
            debug!(url, iframes = expanded, "inlined embedded content");
        }

        let markdown = filter_dated_lines(&markdown, berlin_today(), self.date_window_days);
        PageView {
            markdown: truncate_content(markdown, self.max_content_length),
            link_inventory: format_link_inventory(&links),
        }
    }
}

fn analyze_document(html: &str, base_url: &str, collect_iframes: bool) -> DocumentView {
    let document = Html::parse_document(html);
    let links = collect_links(&document, base_url);
    let iframe_srcs = if collect_iframes {
        collect_iframe_srcs(&document, base_url)
    } else {
        Vec::new()
    };
    let root_html = strip_hidden(&content_root(&document));
    DocumentView {
        markdown: to_markdown(&root_html),
        links,
        iframe_srcs,
    }
}

/// Pick the main content area, falling back to the whole body.
fn content_root(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(root) = document.select(&selector).next() {
                return root.html();
            }
        }
    }
    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            return body.html();
        }
    }
    document.html()
}

/// Remove elements hidden via CSS or the `hidden` attribute by deleting
/// their serialized form from the (already re-serialized) HTML string.
fn strip_hidden(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut result = html.to_string();
    for selector_str in HIDDEN_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                result = result.replace(&element.html(), "");
            }
        }
    }
    result
}

fn to_markdown(html: &str) -> String {
    let converter = HtmlToMarkdown::builder().skip_tags(SKIP_TAGS.to_vec()).build();
    let markdown = converter.convert(html).unwrap_or_else(|_| {
        // Fallback: strip tags and keep the plain text
        let document = Html::parse_document(html);
        document.root_element().text().collect::<String>()
    });
    markdown
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_links(document: &Html, base_url: &str) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if is_skippable_href(href) {
            continue;
        }
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }
        let url = absolutize(base_url, href);
        if is_valid_http(&url) {
            links.push((text, url));
        }
    }
    links
}

fn collect_iframe_srcs(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("iframe[src]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut srcs = Vec::new();
    for element in document.select(&selector) {
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        let src = src.trim();
        if src.is_empty()
            || src.starts_with("javascript:")
            || src.starts_with("about:")
            || src.starts_with('#')
        {
            continue;
        }
        let url = absolutize(base_url, src);
        if seen.insert(url.clone()) {
            srcs.push(url);
        }
    }
    srcs
}

/// Rewrite a published Google Sheets URL to its CSV export, if possible.
fn sheets_csv_url(src: &str) -> Option<String> {
    if !src.contains("docs.google.com/spreadsheets") {
        return None;
    }
    if src.contains("/pubhtml") {
        return Some(src.replace("/pubhtml", "/pub?output=csv"));
    }
    if src.contains("/pub?") {
        return Some(format!("{src}&output=csv"));
    }
    None
}

fn embedded_block(src: &str, content: &str) -> String {
    format!("\n\n<!-- Eingebetteter Inhalt: {src} -->\n\n{content}")
}

/// Drop lines whose dates all fall outside `[today, today + window_days]`.
/// Lines without a full date are kept; the window only prunes obvious
/// archive and far-future material.
fn filter_dated_lines(content: &str, today: NaiveDate, window_days: i64) -> String {
    let window_end = today + Duration::days(window_days);
    content
        .lines()
        .filter(|line| {
            let dates = dates_in_line(line);
            dates.is_empty() || dates.iter().any(|date| (today..=window_end).contains(date))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn dates_in_line(line: &str) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    for caps in RE_DAY_MONTH_YEAR.captures_iter(line) {
        let day: u32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let year: i32 = caps[3].parse().unwrap_or(0);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            dates.push(date);
        }
    }
    for caps in RE_ISO_DATE.captures_iter(line) {
        let year: i32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let day: u32 = caps[3].parse().unwrap_or(0);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            dates.push(date);
        }
    }
    dates
}

fn truncate_content(content: String, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content;
    }
    let mut truncated: String = content.chars().take(max_chars).collect();
    truncated.push_str(TRUNCATION_NOTICE);
    truncated
}

fn format_link_inventory(links: &[(String, String)]) -> String {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for (text, url) in links {
        if lines.len() >= MAX_INVENTORY_LINKS {
            break;
        }
        if seen.insert((text.to_lowercase(), url.clone())) {
            lines.push(format!("{text} -> {url}"));
        }
    }
    if lines.is_empty() {
        NO_LINKS.to_string()
    } else {
        lines.join("\n")
    }
}
