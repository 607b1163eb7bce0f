use async_trait::async_trait;
use futures_util::StreamExt;
use memchr::memchr;
use tracing::{debug, warn};

use super::CompletionTransport;
use crate::core::chat_stream::EventSink;
use crate::core::error::ChatError;

/// Streams completions from a Bedrock-compatible HTTP gateway that relays
/// the model events as server-sent events.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, token)
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn stream_url(&self, model_id: &str) -> String {
        construct_api_url(
            &self.endpoint,
            &format!("model/{model_id}/invoke-with-response-stream"),
        )
    }
}

/// Joins `base_url` and `endpoint` with exactly one slash between them.
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Feeds one SSE line to the sink. Returns true when reading should stop.
fn process_sse_line(line: &str, sink: &EventSink) -> bool {
    match extract_data_payload(line) {
        Some("[DONE]") => true,
        Some(payload) => sink.push_payload(payload.as_bytes()),
        None => false,
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .or_else(|| value.get("Message"))
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

fn extract_error_code(value: &serde_json::Value) -> Option<String> {
    value
        .pointer("/error/type")
        .or_else(|| value.get("__type"))
        .or_else(|| value.get("code"))
        .and_then(|v| v.as_str())
        .map(|code| code.rsplit('#').next().unwrap_or(code).to_string())
}

/// Builds a provider error from a rejected HTTP response.
fn provider_error(status: reqwest::StatusCode, body: &str) -> ChatError {
    let trimmed = body.trim();
    let status_code = status.as_u16().to_string();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let code = extract_error_code(&value).unwrap_or(status_code);
        let message = extract_error_summary(&value)
            .filter(|summary| !summary.is_empty())
            .unwrap_or_else(|| value.to_string());
        return ChatError::provider(code, message);
    }

    let message = if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    };
    ChatError::provider(status_code, message)
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn invoke_stream(
        &self,
        model_id: &str,
        body: Vec<u8>,
        sink: &EventSink,
    ) -> Result<(), ChatError> {
        let url = self.stream_url(model_id);
        debug!(%url, "posting completion request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|err| ChatError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(provider_error(status, &error_text));
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk_bytes = chunk.map_err(|err| ChatError::Transport(err.to_string()))?;
            buffer.extend_from_slice(&chunk_bytes);

            while let Some(newline_pos) = memchr(b'\n', &buffer) {
                let line_str = match std::str::from_utf8(&buffer[..newline_pos]) {
                    Ok(s) => s.trim(),
                    Err(e) => {
                        warn!("invalid UTF-8 in stream: {e}");
                        buffer.drain(..=newline_pos);
                        continue;
                    }
                };

                let should_end = process_sse_line(line_str, sink);
                buffer.drain(..=newline_pos);
                if should_end {
                    return Ok(());
                }
            }
        }

        // A final event may arrive without a trailing newline.
        if let Ok(rest) = std::str::from_utf8(&buffer) {
            process_sse_line(rest.trim(), sink);
        }
        Ok(())
    }
}
