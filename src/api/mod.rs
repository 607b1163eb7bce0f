//! Request and event payloads exchanged with the Claude messages endpoint on
//! Bedrock.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::core::error::ChatError;
use crate::core::message::{ContentBlock, Role, Turn};
use crate::core::params::GenerationParameters;

pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub system: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub messages: Vec<ApiMessage>,
}

impl InvokeRequest {
    pub fn new(history: &[Turn], params: &GenerationParameters) -> Self {
        Self {
            anthropic_version: ANTHROPIC_VERSION.to_string(),
            max_tokens: params.max_tokens,
            system: params.system_message.clone(),
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            messages: history.iter().map(ApiMessage::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiMessage {
    pub role: Role,
    pub content: Vec<ApiContent>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiContent {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

impl From<&ContentBlock> for ApiContent {
    fn from(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::Text(text) => ApiContent::Text { text: text.clone() },
            ContentBlock::Image { media_type, bytes } => ApiContent::Image {
                source: ImageSource {
                    kind: "base64".to_string(),
                    media_type: media_type.clone(),
                    data: base64::prelude::BASE64_STANDARD.encode(bytes),
                },
            },
        }
    }
}

impl TryFrom<ApiContent> for ContentBlock {
    type Error = ChatError;

    fn try_from(content: ApiContent) -> Result<Self, Self::Error> {
        match content {
            ApiContent::Text { text } => Ok(ContentBlock::Text(text)),
            ApiContent::Image { source } => {
                if source.kind != "base64" {
                    return Err(ChatError::InvalidTurn(format!(
                        "unsupported image source type: {}",
                        source.kind
                    )));
                }
                let bytes = base64::prelude::BASE64_STANDARD
                    .decode(source.data.as_bytes())
                    .map_err(|err| ChatError::InvalidTurn(format!("invalid image data: {err}")))?;
                Ok(ContentBlock::Image {
                    media_type: source.media_type,
                    bytes,
                })
            }
        }
    }
}

impl From<&Turn> for ApiMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.iter().map(ApiContent::from).collect(),
        }
    }
}

impl TryFrom<ApiMessage> for Turn {
    type Error = ChatError;

    fn try_from(message: ApiMessage) -> Result<Self, Self::Error> {
        let content = message
            .content
            .into_iter()
            .map(ContentBlock::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let turn = Turn {
            role: message.role,
            content,
        };
        turn.validate()?;
        Ok(turn)
    }
}

/// One decoded event from the response stream.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: MessageStartBody,
    },
    ContentBlockStart {
        #[serde(default)]
        index: u32,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: u32,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<Usage>,
    },
    MessageStop {
        #[serde(rename = "amazon-bedrock-invocationMetrics", default)]
        invocation_metrics: Option<InvocationMetrics>,
    },
    Ping,
    Error {
        error: ApiErrorBody,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MessageStartBody {
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MessageDeltaBody {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Usage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvocationMetrics {
    pub input_token_count: Option<u32>,
    pub output_token_count: Option<u32>,
    pub invocation_latency: Option<u64>,
    pub first_byte_latency: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ApiErrorBody {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> GenerationParameters {
        GenerationParameters {
            model_id: "anthropic.claude-3-sonnet-20240229-v1:0".to_string(),
            system_message: "be brief".to_string(),
            max_tokens: 1024,
            temperature: 0.5,
            top_p: 1.0,
            top_k: 250,
        }
    }

    #[test]
    fn request_body_matches_messages_format() {
        let history = vec![Turn::user_text("Hi")];
        let request = InvokeRequest::new(&history, &sample_params());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": 1024,
                "system": "be brief",
                "temperature": 0.5,
                "top_p": 1.0,
                "top_k": 250,
                "messages": [
                    {"role": "user", "content": [{"type": "text", "text": "Hi"}]}
                ]
            })
        );
    }

    #[test]
    fn image_blocks_serialize_as_base64_sources() {
        let turn = Turn::user(
            vec![ContentBlock::image("image/png", vec![0x89, b'P', b'N', b'G'])],
            "what is this?",
        );
        let value = serde_json::to_value(ApiMessage::from(&turn)).unwrap();

        assert_eq!(
            value["content"][0],
            serde_json::json!({
                "type": "image",
                "source": {"type": "base64", "media_type": "image/png", "data": "iVBORw=="}
            })
        );
        assert_eq!(value["content"][1]["text"], "what is this?");
    }

    #[test]
    fn image_turn_survives_serialization_round_trip() {
        let bytes: Vec<u8> = (0..=255).collect();
        let turn = Turn::user(
            vec![ContentBlock::image("image/png", bytes.clone())],
            "describe",
        );

        let json = serde_json::to_string(&ApiMessage::from(&turn)).unwrap();
        let decoded: ApiMessage = serde_json::from_str(&json).unwrap();
        let restored = Turn::try_from(decoded).unwrap();

        match &restored.content[0] {
            ContentBlock::Image { media_type, bytes: restored_bytes } => {
                assert_eq!(media_type, "image/png");
                assert_eq!(restored_bytes, &bytes);
            }
            other => panic!("expected image block, got {:?}", other),
        }
        assert_eq!(restored, turn);
    }

    #[test]
    fn corrupt_image_data_is_rejected() {
        let message = ApiMessage {
            role: Role::User,
            content: vec![
                ApiContent::Image {
                    source: ImageSource {
                        kind: "base64".to_string(),
                        media_type: "image/png".to_string(),
                        data: "not base64!".to_string(),
                    },
                },
                ApiContent::Text {
                    text: "x".to_string(),
                },
            ],
        };
        assert!(matches!(
            Turn::try_from(message),
            Err(ChatError::InvalidTurn(_))
        ));
    }

    #[test]
    fn text_delta_events_decode() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::TextDelta {
                    text: "Hel".to_string()
                }
            }
        );
    }

    #[test]
    fn unknown_event_and_delta_types_are_tolerated() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"brand_new_event","payload":1}"#).unwrap();
        assert_eq!(event, StreamEvent::Unknown);

        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            StreamEvent::ContentBlockDelta {
                delta: BlockDelta::Other,
                ..
            }
        ));
    }

    #[test]
    fn message_level_events_decode() {
        let delta: StreamEvent = serde_json::from_str(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn","stop_sequence":null},"usage":{"output_tokens":12}}"#,
        )
        .unwrap();
        match delta {
            StreamEvent::MessageDelta { delta, usage } => {
                assert_eq!(delta.stop_reason.as_deref(), Some("end_turn"));
                assert_eq!(usage.and_then(|u| u.output_tokens), Some(12));
            }
            other => panic!("expected message_delta, got {:?}", other),
        }

        let stop: StreamEvent = serde_json::from_str(
            r#"{"type":"message_stop","amazon-bedrock-invocationMetrics":{"inputTokenCount":9,"outputTokenCount":12,"invocationLatency":800,"firstByteLatency":300}}"#,
        )
        .unwrap();
        match stop {
            StreamEvent::MessageStop { invocation_metrics } => {
                let metrics = invocation_metrics.unwrap();
                assert_eq!(metrics.input_token_count, Some(9));
                assert_eq!(metrics.output_token_count, Some(12));
            }
            other => panic!("expected message_stop, got {:?}", other),
        }
    }
}
