use tracing::{debug, info, warn};

use crate::ai::{ChatRequest, ChatTransport, SamplingParams};
use crate::error::ChatError;
use crate::relevance::{RelevanceFilter, DECLINE_MESSAGE};
use crate::state::{ChatMessage, ChatRole, RequestOutcome};

/// Shown when a failure carries no message of its own.
pub const GENERIC_FAILURE: &str = "Failed to get response from AI";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an e-commerce assistant. You can only help with:
- Shopping-related questions
- Product inquiries
- Order issues
- Payment problems
- Shipping and delivery
- Returns and refunds
- Online shopping guidance
Politely decline any personal, non-shopping related questions.";

/// Topic filter in front of a single chat-completion call.
pub struct CompletionClient {
    filter: RelevanceFilter,
    transport: Box<dyn ChatTransport>,
    system_prompt: String,
    model: String,
    sampling: SamplingParams,
}

impl CompletionClient {
    pub fn new(
        filter: RelevanceFilter,
        transport: Box<dyn ChatTransport>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            filter,
            transport,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: model.into(),
            sampling: SamplingParams::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer the latest user message in `history`.
    ///
    /// Off-topic messages get [`DECLINE_MESSAGE`] without touching the
    /// network. Otherwise exactly one request is made; every error is folded
    /// into [`RequestOutcome::Failure`].
    pub async fn complete(&self, history: &[ChatMessage]) -> RequestOutcome {
        match self.try_complete(history).await {
            Ok(content) => RequestOutcome::Success(content),
            Err(err) => {
                warn!("Completion failed: {}", err);
                RequestOutcome::Failure(failure_reason(&err))
            }
        }
    }

    async fn try_complete(&self, history: &[ChatMessage]) -> Result<String, ChatError> {
        let latest = match history.last() {
            Some(msg) if msg.role == ChatRole::User => msg,
            Some(msg) => {
                return Err(ChatError::invalid_history(format!(
                    "last message is from {}, expected user",
                    msg.role
                )))
            }
            None => return Err(ChatError::invalid_history("conversation is empty")),
        };

        if !self.filter.is_relevant(&latest.content) {
            debug!("Message matched no domain keyword; declining locally");
            return Ok(DECLINE_MESSAGE.to_string());
        }

        let request = self.build_request(history);
        info!(
            "Requesting completion from {} with {} history message(s)",
            self.model,
            history.len()
        );
        self.transport.chat(&request).await
    }

    /// System prompt followed by the full history, plus fixed sampling settings.
    pub fn build_request(&self, history: &[ChatMessage]) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(history.iter().cloned());

        ChatRequest {
            messages,
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            max_tokens: self.sampling.max_tokens,
            model: self.model.clone(),
        }
    }
}

fn failure_reason(err: &ChatError) -> String {
    let reason = err.reason();
    if reason.trim().is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        reason
    }
}
