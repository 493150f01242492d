//! Conversation state machine driven by the frontend.
//!
//! The frontend calls [`ConversationController::submit`], runs the returned
//! history through a [`CompletionClient`] and hands the outcome back through
//! [`ConversationController::resolve`]. At most one request is in flight:
//! `submit` refuses while loading.

use tracing::{debug, error, warn};

use crate::completion::{CompletionClient, GENERIC_FAILURE};
use crate::state::{ChatMessage, RequestOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationController {
    messages: Vec<ChatMessage>,
    input: String,
    is_loading: bool,
    last_error: Option<String>,
}

impl ConversationController {
    pub fn new() -> Self {
        Self::default()
    }

    // Read-only view for rendering
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Submitting
        } else {
            Phase::Idle
        }
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Mutable access for in-place editing. Edits while loading are allowed
    /// by the type but the frontend keeps the input disabled.
    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    /// Start a turn with the current input.
    ///
    /// Returns the history to send, or `None` when a request is already in
    /// flight or the input is blank. A rejected submit changes nothing.
    pub fn submit(&mut self) -> Option<Vec<ChatMessage>> {
        if self.is_loading {
            debug!("Submit ignored: request already in flight");
            return None;
        }
        if self.input.trim().is_empty() {
            return None;
        }

        let content = std::mem::take(&mut self.input);
        self.messages.push(ChatMessage::user(content));
        self.last_error = None;
        self.is_loading = true;

        Some(self.messages.clone())
    }

    /// Finish the in-flight turn.
    pub fn resolve(&mut self, outcome: RequestOutcome) {
        match outcome {
            RequestOutcome::Success(content) => self.resolve_success(content),
            RequestOutcome::Failure(reason) => self.resolve_failure(reason),
        }
    }

    pub fn resolve_success(&mut self, content: impl Into<String>) {
        if !self.is_loading {
            warn!("Completion resolved with no request in flight; dropping reply");
            return;
        }
        self.messages.push(ChatMessage::assistant(content));
        self.is_loading = false;
    }

    /// The user's message stays in the conversation so they can retry.
    pub fn resolve_failure(&mut self, reason: impl Into<String>) {
        if !self.is_loading {
            warn!("Completion failure reported with no request in flight; dropping it");
            return;
        }
        let reason = reason.into();
        error!("Error: {}", reason);
        self.last_error = Some(if reason.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            reason
        });
        self.is_loading = false;
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Back to an empty conversation, as after a full restart.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Submit, complete and resolve in one call. Does nothing if the submit
    /// is rejected.
    pub async fn send(&mut self, client: &CompletionClient) {
        if let Some(history) = self.submit() {
            let outcome = client.complete(&history).await;
            self.resolve(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::FakeTransport;
    use crate::error::ChatError;
    use crate::relevance::{RelevanceFilter, DECLINE_MESSAGE};
    use crate::state::ChatRole;

    fn client(transport: &FakeTransport) -> CompletionClient {
        CompletionClient::new(
            RelevanceFilter::default(),
            Box::new(transport.clone()),
            "test-model",
        )
    }

    #[test]
    fn test_submit_moves_to_submitting() {
        let mut controller = ConversationController::new();
        controller.set_input("where is my order?");

        let history = controller.submit().unwrap();
        assert_eq!(history, vec![ChatMessage::user("where is my order?")]);
        assert_eq!(controller.phase(), Phase::Submitting);
        assert!(controller.is_loading());
        assert_eq!(controller.input(), "");
    }

    #[test]
    fn test_blank_input_is_rejected() {
        let mut controller = ConversationController::new();
        controller.set_input("   \t ");

        assert!(controller.submit().is_none());
        assert!(controller.messages().is_empty());
        assert!(!controller.is_loading());
        assert_eq!(controller.input(), "   \t ");
    }

    #[test]
    fn test_submit_while_loading_is_noop() {
        let mut controller = ConversationController::new();
        controller.set_input("buy shoes");
        controller.submit().unwrap();

        controller.set_input("and socks");
        assert!(controller.submit().is_none());
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.input(), "and socks");
    }

    #[test]
    fn test_content_is_kept_as_typed() {
        let mut controller = ConversationController::new();
        controller.set_input("  refund please  ");
        controller.submit().unwrap();
        assert_eq!(controller.messages()[0].content, "  refund please  ");
    }

    #[test]
    fn test_failure_keeps_user_message() {
        let mut controller = ConversationController::new();
        controller.set_input("track my order");
        controller.submit().unwrap();
        controller.resolve(RequestOutcome::Failure("Bad credentials".into()));

        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.messages()[0].role, ChatRole::User);
        assert_eq!(controller.last_error(), Some("Bad credentials"));
        assert!(!controller.is_loading());
    }

    #[test]
    fn test_blank_failure_reason_uses_fallback() {
        let mut controller = ConversationController::new();
        controller.set_input("checkout broken");
        controller.submit().unwrap();
        controller.resolve_failure("");

        assert_eq!(controller.last_error(), Some(GENERIC_FAILURE));
    }

    #[test]
    fn test_new_submit_clears_previous_error() {
        let mut controller = ConversationController::new();
        controller.set_input("checkout broken");
        controller.submit().unwrap();
        controller.resolve_failure("timeout");

        controller.set_input("checkout still broken");
        controller.submit().unwrap();
        assert_eq!(controller.last_error(), None);
    }

    #[test]
    fn test_resolve_while_idle_is_ignored() {
        let mut controller = ConversationController::new();
        controller.resolve_success("stray");
        controller.resolve_failure("stray");

        assert!(controller.messages().is_empty());
        assert_eq!(controller.last_error(), None);
    }

    #[test]
    fn test_dismiss_and_reset() {
        let mut controller = ConversationController::new();
        controller.set_input("buy");
        controller.submit().unwrap();
        controller.resolve_failure("oops");

        controller.dismiss_error();
        assert_eq!(controller.last_error(), None);
        assert_eq!(controller.messages().len(), 1);

        controller.reset();
        assert!(controller.messages().is_empty());
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_send_success_appends_assistant_reply() {
        let transport = FakeTransport::default();
        transport.push_ok("Your order ships Friday.");
        let client = client(&transport);

        let mut controller = ConversationController::new();
        controller.set_input("when does my order ship?");
        controller.send(&client).await;

        assert_eq!(controller.messages().len(), 2);
        assert_eq!(
            controller.messages()[1],
            ChatMessage::assistant("Your order ships Friday.")
        );
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn test_send_off_topic_appends_decline() {
        let transport = FakeTransport::default();
        let client = client(&transport);

        let mut controller = ConversationController::new();
        controller.set_input("what's the weather");
        controller.send(&client).await;

        assert_eq!(controller.messages()[1].content, DECLINE_MESSAGE);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_records_error() {
        let transport = FakeTransport::default();
        transport.push_err(ChatError::transport("error sending request"));
        let client = client(&transport);

        let mut controller = ConversationController::new();
        controller.set_input("payment declined");
        controller.send(&client).await;

        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.last_error(), Some("error sending request"));
        assert!(!controller.is_loading());
    }
}
