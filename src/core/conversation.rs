//! Append-only conversation history and the image attachments staged for the
//! next user turn.

use crate::core::error::ChatError;
use crate::core::message::{ContentBlock, Turn};
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
    staged_images: Vec<ContentBlock>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn after checking its block layout.
    pub fn append(&mut self, turn: Turn) -> Result<(), ChatError> {
        turn.validate()?;
        debug!(
            role = turn.role.as_str(),
            blocks = turn.content.len(),
            index = self.turns.len(),
            "appending turn"
        );
        self.turns.push(turn);
        Ok(())
    }

    /// Full history in chronological order.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    /// Empties the history and drops any staged attachments.
    pub fn clear(&mut self) {
        debug!(
            turns = self.turns.len(),
            staged = self.staged_images.len(),
            "clearing conversation"
        );
        self.turns.clear();
        self.staged_images.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// True when the newest turn is a user turn still waiting for a reply.
    pub fn awaiting_reply(&self) -> bool {
        self.last().is_some_and(|turn| turn.role.is_user())
    }

    pub fn stage_image(&mut self, media_type: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.staged_images.push(ContentBlock::image(media_type, bytes));
    }

    pub fn staged_images(&self) -> &[ContentBlock] {
        &self.staged_images
    }

    pub fn discard_staged_images(&mut self) {
        self.staged_images.clear();
    }

    /// Builds the next user turn from the staged images and `text`.
    ///
    /// Staged images are consumed, so they attach to exactly one submission.
    pub fn compose_user_turn(&mut self, text: impl Into<String>) -> Turn {
        Turn::user(std::mem::take(&mut self.staged_images), text)
    }
}
