//! Trait seams between the pipeline and its collaborators.

mod cache;
mod llm;
mod render;
mod store;

pub use cache::KeyValueCache;
pub use llm::{Completion, CompletionRequest, LanguageModel, VisionRequest};
pub use render::Renderer;
pub use store::EventStore;
