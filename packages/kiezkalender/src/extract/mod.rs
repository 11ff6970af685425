//! Event extraction: page-to-markdown conversion, deterministic structure
//! detection, LLM extraction and screenshot extraction.

pub mod dates;
mod markdown;
pub(crate) mod prompts;
mod response;
mod semantic;
mod structured;
mod vision;

pub use markdown::{MarkdownConverter, PageView};
pub use semantic::{Extraction, SemanticExtractor};
pub use structured::extract_raw_events;
pub use vision::{VisionExtractor, VISION_WINDOW_DAYS};
