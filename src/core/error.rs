use std::error::Error as StdError;
use std::fmt;

/// Failures surfaced by the conversation store, the completion client and
/// the session that ties them together.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    /// No usable credentials could be resolved for the endpoint.
    Credentials(String),

    /// The endpoint rejected the request or reported an error mid-stream.
    Provider {
        /// Provider error code (service exception name or HTTP status).
        code: String,
        /// Human readable provider message.
        message: String,
    },

    /// A turn violated the content-block ordering rules.
    InvalidTurn(String),

    /// The selected model cannot take image attachments.
    ImagesUnsupported {
        model_id: String,
    },

    /// A message with no text was submitted.
    EmptyMessage,

    /// A generation parameter was outside its accepted range.
    InvalidParameters(String),

    /// A request was attempted with no history to send.
    EmptyHistory,

    /// A new user turn was submitted while the previous one has no answer.
    UnansweredTurn,

    /// Retry was requested but the last turn already has an answer.
    NothingToRetry,

    /// The connection failed or the stream could not be decoded.
    Transport(String),

    /// The stream was cancelled before the endpoint finished.
    Cancelled,
}

impl ChatError {
    pub fn provider(code: impl Into<String>, message: impl Into<String>) -> Self {
        ChatError::Provider {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from the remote endpoint rather than local state.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ChatError::Provider { .. } | ChatError::Transport(_) | ChatError::Credentials(_)
        )
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Credentials(detail) => {
                write!(f, "Unable to resolve AWS credentials: {detail}")
            }
            ChatError::Provider { code, message } => {
                write!(f, "Provider error ({code}): {message}")
            }
            ChatError::InvalidTurn(detail) => write!(f, "Invalid turn: {detail}"),
            ChatError::ImagesUnsupported { model_id } => {
                write!(f, "Model {model_id} does not accept images")
            }
            ChatError::EmptyMessage => write!(f, "Message text is empty"),
            ChatError::InvalidParameters(detail) => {
                write!(f, "Invalid generation parameters: {detail}")
            }
            ChatError::EmptyHistory => write!(f, "Conversation has no user turn to send"),
            ChatError::UnansweredTurn => write!(
                f,
                "The previous message has no response yet; use /retry to resend it or /clear to start over"
            ),
            ChatError::NothingToRetry => write!(f, "Nothing to retry"),
            ChatError::Transport(detail) => write!(f, "Stream failed: {detail}"),
            ChatError::Cancelled => write!(f, "Stream cancelled"),
        }
    }
}

impl StdError for ChatError {}
