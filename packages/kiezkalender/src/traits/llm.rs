//! Language model abstraction used by navigation, extraction and enrichment.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// A plain chat completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            max_tokens: 1000,
            temperature: 0.0,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A completion request carrying a PNG screenshot.
#[derive(Clone)]
pub struct VisionRequest {
    pub system: String,
    pub user: String,
    pub image_png: Vec<u8>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl VisionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, image_png: Vec<u8>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            image_png,
            max_tokens: 8000,
            temperature: 0.1,
        }
    }
}

impl fmt::Debug for VisionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionRequest")
            .field("user", &self.user)
            .field("image_bytes", &self.image_png.len())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Completion text plus token accounting.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u32,
}

/// The calls the pipeline makes against a chat model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;

    async fn complete_vision(&self, request: VisionRequest) -> Result<Completion>;
}
