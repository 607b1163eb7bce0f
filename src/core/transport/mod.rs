//! Transports that carry a serialized completion request to the inference
//! endpoint and hand raw event payloads back to the stream decoder.
//!
//! Implementations hide the wire differences between the Bedrock runtime API
//! and HTTP gateways so the fragment stream only ever sees JSON events.

use async_trait::async_trait;

use crate::core::chat_stream::EventSink;
use crate::core::error::ChatError;

pub mod bedrock;
pub mod http;
#[cfg(test)]
pub mod stub;

pub use bedrock::{AwsCredentialSettings, BedrockTransport};
pub use http::HttpTransport;

#[async_trait]
/// Contract between the fragment stream and the network.
pub trait CompletionTransport: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Sends `body` to `model_id` and pushes every event payload into `sink`
    /// in arrival order.
    ///
    /// Returns once the endpoint closes the stream or `sink` asks to stop.
    /// Errors before or during the stream are returned, never pushed.
    async fn invoke_stream(
        &self,
        model_id: &str,
        body: Vec<u8>,
        sink: &EventSink,
    ) -> Result<(), ChatError>;
}
