//! One chat session: the conversation, the completion client and the current
//! generation parameters, plus the turn assembly that keeps them consistent.

use tracing::{info, warn};

use crate::core::builtin_models::supports_images;
use crate::core::chat_stream::{ChatStreamService, StreamMetadata};
use crate::core::conversation::Conversation;
use crate::core::error::ChatError;
use crate::core::message::Turn;
use crate::core::params::GenerationParameters;
use crate::utils::logging::LoggingState;

/// Result of one completed assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub text: String,
    pub metadata: StreamMetadata,
}

pub struct ChatSession {
    conversation: Conversation,
    client: ChatStreamService,
    params: GenerationParameters,
    logging: LoggingState,
}

impl ChatSession {
    pub fn new(client: ChatStreamService, params: GenerationParameters) -> Result<Self, ChatError> {
        Ok(Self {
            conversation: Conversation::new(),
            client,
            params: params.validated()?,
            logging: LoggingState::disabled(),
        })
    }

    pub fn with_logging(mut self, logging: LoggingState) -> Self {
        self.logging = logging;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn params(&self) -> &GenerationParameters {
        &self.params
    }

    /// Replaces the parameters used for the next request.
    pub fn set_params(&mut self, params: GenerationParameters) -> Result<(), ChatError> {
        self.params = params.validated()?;
        Ok(())
    }

    pub fn logging(&self) -> &LoggingState {
        &self.logging
    }

    pub fn logging_mut(&mut self) -> &mut LoggingState {
        &mut self.logging
    }

    /// Stages an image for the next submitted message.
    pub fn stage_image(
        &mut self,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<(), ChatError> {
        self.ensure_images_supported()?;
        self.conversation.stage_image(media_type, bytes);
        Ok(())
    }

    /// Drops staged images without touching the history.
    pub fn discard_images(&mut self) -> usize {
        let count = self.conversation.staged_images().len();
        self.conversation.discard_staged_images();
        count
    }

    pub fn transport_name(&self) -> &'static str {
        self.client.transport_name()
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
        if let Err(err) = self.logging.log_message("## History cleared") {
            warn!("failed to log history reset: {err}");
        }
    }

    fn ensure_images_supported(&self) -> Result<(), ChatError> {
        if supports_images(&self.params.model_id) {
            Ok(())
        } else {
            Err(ChatError::ImagesUnsupported {
                model_id: self.params.model_id.clone(),
            })
        }
    }

    /// Sends a new user message and streams the reply.
    ///
    /// Staged images are attached ahead of `text`. Each fragment is passed to
    /// `on_fragment` as it arrives. The assistant turn is committed only when
    /// the stream finishes cleanly.
    pub async fn submit<F>(&mut self, text: &str, on_fragment: F) -> Result<TurnOutcome, ChatError>
    where
        F: FnMut(&str),
    {
        if self.conversation.awaiting_reply() {
            return Err(ChatError::UnansweredTurn);
        }
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if !self.conversation.staged_images().is_empty() {
            self.ensure_images_supported()?;
        }

        let turn = self.conversation.compose_user_turn(text);
        self.conversation.append(turn)?;
        if let Some(turn) = self.conversation.last() {
            if let Err(err) = self.logging.log_turn(turn) {
                warn!("failed to log user turn: {err}");
            }
        }

        self.complete(on_fragment).await
    }

    /// Re-sends the history when the last user message has no reply.
    pub async fn retry<F>(&mut self, on_fragment: F) -> Result<TurnOutcome, ChatError>
    where
        F: FnMut(&str),
    {
        if !self.conversation.awaiting_reply() {
            return Err(ChatError::NothingToRetry);
        }
        self.complete(on_fragment).await
    }

    async fn complete<F>(&mut self, mut on_fragment: F) -> Result<TurnOutcome, ChatError>
    where
        F: FnMut(&str),
    {
        let mut stream = self.client.stream(self.conversation.snapshot(), &self.params)?;

        let mut text = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            let fragment = fragment?;
            on_fragment(&fragment);
            text.push_str(&fragment);
        }
        let metadata = stream.metadata().clone();

        let turn = Turn::assistant(text.clone());
        if let Err(err) = self.logging.log_turn(&turn) {
            warn!("failed to log assistant turn: {err}");
        }
        self.conversation.append(turn)?;
        info!(
            turns = self.conversation.len(),
            chars = text.len(),
            stop_reason = metadata.stop_reason.as_deref().unwrap_or("unknown"),
            "assistant turn committed"
        );

        Ok(TurnOutcome { text, metadata })
    }
}

#[cfg(test)]
mod tests;
