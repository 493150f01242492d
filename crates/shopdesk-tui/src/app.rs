use std::sync::Arc;

use ratatui::text::Span;
use shopdesk_core::{CompletionClient, ConversationController, RequestOutcome, GENERIC_FAILURE};
use tokio::task::JoinHandle;
use tracing::error;

pub struct App {
    pub should_quit: bool,

    // Conversation state (messages, input text, loading flag, last error)
    pub controller: ConversationController,
    pub client: Arc<CompletionClient>,
    pub completion_task: Option<JoinHandle<RequestOutcome>>,

    // Input editing
    pub input_cursor: usize, // char index into the controller's input

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat area, updated during render
    pub chat_width: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Set when a frame fails to render; shows the recovery screen
    pub render_fault: Option<String>,

    // Shown in the header for the whole session, e.g. a missing credential
    pub startup_notice: Option<String>,
}

impl App {
    pub fn new(client: CompletionClient) -> Self {
        Self {
            should_quit: false,
            controller: ConversationController::new(),
            client: Arc::new(client),
            completion_task: None,
            input_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            render_fault: None,
            startup_notice: None,
        }
    }

    pub fn with_startup_notice(mut self, notice: impl Into<String>) -> Self {
        self.startup_notice = Some(notice.into());
        self
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Send the current input. Ignored while a request is in flight or when
    /// the input is blank.
    pub fn submit(&mut self) {
        let Some(history) = self.controller.submit() else {
            return;
        };
        self.input_cursor = 0;

        let client = Arc::clone(&self.client);
        self.completion_task = Some(tokio::spawn(async move {
            client.complete(&history).await
        }));

        self.scroll_to_bottom();
    }

    /// Fold a finished completion back into the conversation.
    pub async fn poll_completion(&mut self) {
        let finished = self
            .completion_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.completion_task.take() {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Completion task failed: {}", e);
                    RequestOutcome::Failure(GENERIC_FAILURE.to_string())
                }
            };
            self.controller.resolve(outcome);
            self.scroll_to_bottom();
        }
    }

    /// Full restart: drop the conversation and any in-flight request.
    pub fn restart(&mut self) {
        if let Some(task) = self.completion_task.take() {
            task.abort();
        }
        self.controller.reset();
        self.input_cursor = 0;
        self.chat_scroll = 0;
        self.animation_frame = 0;
        self.render_fault = None;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.controller.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing, cursor counted in chars
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(self.controller.input(), self.input_cursor);
        self.controller.input_mut().insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(self.controller.input(), self.input_cursor);
            self.controller.input_mut().remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.input_cursor < self.input_len() {
            let byte_pos = char_to_byte_index(self.controller.input(), self.input_cursor);
            self.controller.input_mut().remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input_len());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input_len();
    }

    fn input_len(&self) -> usize {
        self.controller.input().chars().count()
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.total_chat_lines().saturating_sub(self.visible_height());
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
    }

    /// Scroll chat to bottom so the newest message (or "Thinking...") is visible
    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.total_chat_lines();
        let visible_height = self.visible_height();
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Rendered line count of the conversation, matching the layout in `ui`.
    pub fn total_chat_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;
        for msg in self.controller.messages() {
            total_lines += 1; // role label
            for line in msg.content.lines() {
                total_lines += display_width(line).max(1).div_ceil(wrap_width);
            }
            total_lines += 1; // blank line after message
        }

        if self.controller.is_loading() {
            total_lines += 1; // "Thinking..."
        }

        total_lines.min(u16::MAX as usize) as u16
    }
}

/// Terminal columns taken by `s`; wide characters count double.
pub(crate) fn display_width(s: &str) -> usize {
    Span::raw(s).width()
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
