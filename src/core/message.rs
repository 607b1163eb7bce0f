use serde::{Deserialize, Serialize};

use crate::core::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("invalid role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// One unit of turn content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    Image { media_type: String, bytes: Vec<u8> },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(text.into())
    }

    pub fn image(media_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        ContentBlock::Image {
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ContentBlock::Text(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentBlock::Image { .. })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(text) => Some(text),
            ContentBlock::Image { .. } => None,
        }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Turn {
    /// Builds a user turn with `images` placed ahead of the prompt text.
    pub fn user(images: Vec<ContentBlock>, text: impl Into<String>) -> Self {
        let mut content = images;
        content.push(ContentBlock::text(text));
        Self {
            role: Role::User,
            content,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(Vec::new(), text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// The trailing text block, if the turn is well formed.
    pub fn text(&self) -> Option<&str> {
        self.content.last().and_then(ContentBlock::as_text)
    }

    pub fn images(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content.iter().filter(|block| block.is_image())
    }

    /// Checks the block layout for the turn's role.
    ///
    /// Assistant turns carry exactly one text block. User turns carry any
    /// number of images followed by exactly one text block.
    pub fn validate(&self) -> Result<(), ChatError> {
        match self.role {
            Role::Assistant => match self.content.as_slice() {
                [ContentBlock::Text(_)] => Ok(()),
                _ => Err(ChatError::InvalidTurn(format!(
                    "assistant turn must hold exactly one text block, found {} block(s)",
                    self.content.len()
                ))),
            },
            Role::User => {
                let Some((last, leading)) = self.content.split_last() else {
                    return Err(ChatError::InvalidTurn(
                        "user turn has no content".to_string(),
                    ));
                };
                if !last.is_text() {
                    return Err(ChatError::InvalidTurn(
                        "user turn must end with a text block".to_string(),
                    ));
                }
                if let Some(position) = leading.iter().position(ContentBlock::is_text) {
                    return Err(ChatError::InvalidTurn(format!(
                        "user turn has a text block at position {position} before its final block"
                    )));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_strings_round_trip() {
        assert_eq!(Role::try_from("user"), Ok(Role::User));
        assert_eq!(Role::try_from("assistant"), Ok(Role::Assistant));
        assert_eq!(String::from(Role::Assistant), "assistant");
    }

    #[test]
    fn invalid_role_strings_are_rejected() {
        assert!(Role::try_from("system").is_err());
    }

    #[test]
    fn user_turn_places_images_before_text() {
        let turn = Turn::user(vec![ContentBlock::image("image/png", vec![1, 2])], "look");
        assert!(turn.content[0].is_image());
        assert_eq!(turn.text(), Some("look"));
        assert!(turn.validate().is_ok());
    }

    #[test]
    fn user_turn_with_text_before_image_is_invalid() {
        let turn = Turn {
            role: Role::User,
            content: vec![
                ContentBlock::text("first"),
                ContentBlock::image("image/png", vec![0]),
            ],
        };
        assert!(matches!(turn.validate(), Err(ChatError::InvalidTurn(_))));
    }

    #[test]
    fn user_turn_with_two_text_blocks_is_invalid() {
        let turn = Turn {
            role: Role::User,
            content: vec![ContentBlock::text("a"), ContentBlock::text("b")],
        };
        assert!(matches!(turn.validate(), Err(ChatError::InvalidTurn(_))));
    }

    #[test]
    fn empty_user_turn_is_invalid() {
        let turn = Turn {
            role: Role::User,
            content: Vec::new(),
        };
        assert!(matches!(turn.validate(), Err(ChatError::InvalidTurn(_))));
    }

    #[test]
    fn assistant_turn_rejects_images() {
        let turn = Turn {
            role: Role::Assistant,
            content: vec![
                ContentBlock::image("image/png", vec![0]),
                ContentBlock::text("hi"),
            ],
        };
        assert!(matches!(turn.validate(), Err(ChatError::InvalidTurn(_))));
        assert!(Turn::assistant("hi").validate().is_ok());
    }
}
