use thiserror::Error;

/// Why a completion attempt produced no assistant text.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The endpoint answered with an error payload.
    #[error("{0}")]
    Upstream(String),

    /// The request never produced a usable structured response.
    #[error("{0}")]
    Transport(String),

    #[error("Invalid history: {0}")]
    InvalidHistory(String),
}

impl ChatError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_history(msg: impl Into<String>) -> Self {
        Self::InvalidHistory(msg.into())
    }

    /// Human-readable text shown in the error banner.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
