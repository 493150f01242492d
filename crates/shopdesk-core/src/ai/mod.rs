pub mod inference;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ChatError;
use crate::state::ChatMessage;

pub use inference::InferenceClient;

/// Sends a fully assembled chat-completion request and returns the
/// assistant's text.
///
/// Implementors own transport and vendor details; [`crate::CompletionClient`]
/// only sees this trait, so tests can substitute a scripted transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

/// Body of a `POST /chat/completions` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1000,
        }
    }
}
