use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_sdk_bedrockruntime::Client;
use tracing::{debug, info, trace};

use super::CompletionTransport;
use crate::core::chat_stream::EventSink;
use crate::core::error::ChatError;

const CREDENTIALS_PROVIDER_NAME: &str = "bedrock-chat";

/// Explicit AWS settings; anything left empty falls back to the default
/// provider chain (environment, profile, instance metadata).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AwsCredentialSettings {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
}

impl AwsCredentialSettings {
    fn non_empty(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Access and secret key, only when both are present.
    pub fn static_keys(&self) -> Option<(&str, &str)> {
        match (
            Self::non_empty(&self.access_key),
            Self::non_empty(&self.secret_key),
        ) {
            (Some(access), Some(secret)) => Some((access, secret)),
            _ => None,
        }
    }

    pub fn region(&self) -> Option<&str> {
        Self::non_empty(&self.region)
    }

    /// One key without the other is almost certainly a typo.
    pub fn check_complete(&self) -> Result<(), ChatError> {
        let access = Self::non_empty(&self.access_key).is_some();
        let secret = Self::non_empty(&self.secret_key).is_some();
        if access != secret {
            return Err(ChatError::Credentials(
                "both an access key and a secret key are required when either is given"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for AwsCredentialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentialSettings")
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .finish()
    }
}

/// Streams completions through the Bedrock runtime
/// `InvokeModelWithResponseStream` API.
pub struct BedrockTransport {
    client: Client,
}

impl BedrockTransport {
    /// Resolves credentials and builds a runtime client.
    ///
    /// Credentials are resolved eagerly so that a missing or broken setup is
    /// reported before the first message is sent.
    pub async fn connect(settings: &AwsCredentialSettings) -> Result<Self, ChatError> {
        settings.check_complete()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = settings.region() {
            loader = loader.region(Region::new(region.to_string()));
        }
        if let Some((access_key, secret_key)) = settings.static_keys() {
            debug!("using explicit AWS access keys");
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                CREDENTIALS_PROVIDER_NAME,
            ));
        }
        let sdk_config = loader.load().await;

        let provider = sdk_config.credentials_provider().ok_or_else(|| {
            ChatError::Credentials("no AWS credential provider is configured".to_string())
        })?;
        provider
            .provide_credentials()
            .await
            .map_err(|err| ChatError::Credentials(DisplayErrorContext(&err).to_string()))?;

        let region = sdk_config.region().ok_or_else(|| {
            ChatError::Credentials(
                "no AWS region configured; pass --region or set AWS_REGION".to_string(),
            )
        })?;
        info!(region = %region, "connected to Bedrock runtime");

        Ok(Self {
            client: Client::new(&sdk_config),
        })
    }
}

fn sdk_error<E, R>(err: SdkError<E, R>) -> ChatError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: fmt::Debug,
{
    if let Some(code) = err.code() {
        let message = err.message().unwrap_or("no message provided").to_string();
        return ChatError::provider(code, message);
    }
    ChatError::Transport(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl CompletionTransport for BedrockTransport {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    async fn invoke_stream(
        &self,
        model_id: &str,
        body: Vec<u8>,
        sink: &EventSink,
    ) -> Result<(), ChatError> {
        let output = self
            .client
            .invoke_model_with_response_stream()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(sdk_error)?;

        let mut events = output.body;
        loop {
            match events.recv().await.map_err(sdk_error)? {
                Some(ResponseStream::Chunk(part)) => {
                    let Some(bytes) = part.bytes() else {
                        continue;
                    };
                    if sink.push_payload(bytes.as_ref()) {
                        return Ok(());
                    }
                }
                Some(other) => trace!("ignoring Bedrock stream member: {other:?}"),
                None => return Ok(()),
            }
        }
    }
}
