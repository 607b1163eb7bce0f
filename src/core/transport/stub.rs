use std::sync::Mutex;

use async_trait::async_trait;

use super::CompletionTransport;
use crate::core::chat_stream::EventSink;
use crate::core::error::ChatError;

/// Scripted transport that replays canned event payloads.
pub struct StubTransport {
    payloads: Vec<String>,
    failure: Option<ChatError>,
    hang: bool,
    requests: Mutex<Vec<(String, serde_json::Value)>>,
}

impl StubTransport {
    pub fn with_payloads(payloads: Vec<String>) -> Self {
        Self {
            payloads,
            failure: None,
            hang: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A well-formed message stream carrying `deltas` as text.
    pub fn with_text_deltas(deltas: &[&str]) -> Self {
        Self::with_payloads(text_delta_events(deltas))
    }

    /// Rejects the request before any event is produced.
    pub fn failing(err: ChatError) -> Self {
        Self::with_payloads(Vec::new()).then_fail(err)
    }

    pub fn then_fail(mut self, err: ChatError) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<(String, serde_json::Value)> {
        self.requests.lock().unwrap().last().cloned()
    }
}

pub fn text_delta_events(deltas: &[&str]) -> Vec<String> {
    let mut events = vec![
        serde_json::json!({
            "type": "message_start",
            "message": {"role": "assistant", "usage": {"input_tokens": 8, "output_tokens": 1}}
        })
        .to_string(),
        serde_json::json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "text", "text": ""}
        })
        .to_string(),
    ];
    for delta in deltas {
        events.push(
            serde_json::json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "text_delta", "text": delta}
            })
            .to_string(),
        );
    }
    events.push(serde_json::json!({"type": "content_block_stop", "index": 0}).to_string());
    events.push(
        serde_json::json!({
            "type": "message_delta",
            "delta": {"stop_reason": "end_turn", "stop_sequence": null},
            "usage": {"output_tokens": deltas.len()}
        })
        .to_string(),
    );
    events.push(serde_json::json!({"type": "message_stop"}).to_string());
    events
}

#[async_trait]
impl CompletionTransport for StubTransport {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn invoke_stream(
        &self,
        model_id: &str,
        body: Vec<u8>,
        sink: &EventSink,
    ) -> Result<(), ChatError> {
        let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        self.requests
            .lock()
            .unwrap()
            .push((model_id.to_string(), body));

        for payload in &self.payloads {
            if sink.push_payload(payload.as_bytes()) {
                return Ok(());
            }
            tokio::task::yield_now().await;
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
