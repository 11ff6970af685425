//! HTTP and headless-browser page fetching.

mod chrome;
mod http;
mod page;

pub use chrome::ChromeRenderer;
pub use http::{HttpFetcher, BROWSER_USER_AGENT};
pub use page::{FetchedPage, PageFetcher};
