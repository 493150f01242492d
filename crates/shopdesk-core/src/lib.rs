pub mod ai;
pub mod completion;
pub mod config;
pub mod controller;
pub mod error;
pub mod relevance;
pub mod state;

// Re-export main types for convenience
pub use ai::{ChatRequest, ChatTransport, InferenceClient, SamplingParams};
pub use completion::{CompletionClient, DEFAULT_SYSTEM_PROMPT, GENERIC_FAILURE};
pub use config::Config;
pub use controller::{ConversationController, Phase};
pub use error::ChatError;
pub use relevance::{RelevanceFilter, DECLINE_MESSAGE};
pub use state::{ChatMessage, ChatRole, RequestOutcome};
