use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::api::{BlockDelta, InvokeRequest, StreamEvent};
use crate::core::error::ChatError;
use crate::core::message::Turn;
use crate::core::params::GenerationParameters;
use crate::core::transport::CompletionTransport;

#[derive(Clone, Debug)]
pub enum StreamMessage {
    Chunk(String),
    Metadata(StreamMetadata),
    Error(ChatError),
    End,
}

/// Message-level details reported alongside the text deltas.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamMetadata {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl StreamMetadata {
    pub fn merge(&mut self, other: StreamMetadata) {
        if other.stop_reason.is_some() {
            self.stop_reason = other.stop_reason;
        }
        if other.stop_sequence.is_some() {
            self.stop_sequence = other.stop_sequence;
        }
        if other.input_tokens.is_some() {
            self.input_tokens = other.input_tokens;
        }
        if other.output_tokens.is_some() {
            self.output_tokens = other.output_tokens;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == StreamMetadata::default()
    }
}

/// Receives raw event payloads from a transport and forwards the decoded
/// pieces to the fragment stream.
pub struct EventSink {
    tx: mpsc::UnboundedSender<StreamMessage>,
}

impl EventSink {
    fn new(tx: mpsc::UnboundedSender<StreamMessage>) -> Self {
        Self { tx }
    }

    /// Decodes one event payload. Returns true when the transport should stop
    /// reading: the payload carried an error or nobody is listening anymore.
    pub fn push_payload(&self, payload: &[u8]) -> bool {
        handle_event_payload(payload, &self.tx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn end(&self) {
        let _ = self.tx.send(StreamMessage::End);
    }

    fn fail(&self, err: ChatError) {
        let _ = self.tx.send(StreamMessage::Error(err));
    }
}

fn handle_event_payload(payload: &[u8], tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    let event = match serde_json::from_slice::<StreamEvent>(payload) {
        Ok(event) => event,
        Err(err) => {
            if payload.iter().all(u8::is_ascii_whitespace) {
                return false;
            }
            let text = String::from_utf8_lossy(payload);
            warn!("undecodable stream event: {err}: {text}");
            let _ = tx.send(StreamMessage::Error(ChatError::Transport(format!(
                "undecodable stream event: {err}"
            ))));
            return true;
        }
    };

    let message = match event {
        StreamEvent::ContentBlockDelta {
            delta: BlockDelta::TextDelta { text },
            ..
        } => StreamMessage::Chunk(text),
        StreamEvent::MessageStart { message } => {
            let usage = message.usage.unwrap_or_default();
            StreamMessage::Metadata(StreamMetadata {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                ..StreamMetadata::default()
            })
        }
        StreamEvent::MessageDelta { delta, usage } => StreamMessage::Metadata(StreamMetadata {
            stop_reason: delta.stop_reason,
            stop_sequence: delta.stop_sequence,
            input_tokens: None,
            output_tokens: usage.and_then(|usage| usage.output_tokens),
        }),
        StreamEvent::MessageStop {
            invocation_metrics: Some(metrics),
        } => StreamMessage::Metadata(StreamMetadata {
            input_tokens: metrics.input_token_count,
            output_tokens: metrics.output_token_count,
            ..StreamMetadata::default()
        }),
        StreamEvent::Error { error } => {
            let err = ChatError::provider(
                error.kind.unwrap_or_else(|| "error".to_string()),
                error
                    .message
                    .unwrap_or_else(|| "unknown stream error".to_string()),
            );
            let _ = tx.send(StreamMessage::Error(err));
            return true;
        }
        other => {
            trace!("discarding stream event: {other:?}");
            return tx.is_closed();
        }
    };

    tx.send(message).is_err()
}

/// Lazy, forward-only sequence of assistant text fragments for one request.
///
/// Yields fragments in arrival order and ends when the endpoint closes the
/// stream. The first error ends the sequence. Dropping the stream cancels the
/// request and releases the connection.
pub struct FragmentStream {
    rx: mpsc::UnboundedReceiver<StreamMessage>,
    cancel_token: CancellationToken,
    metadata: StreamMetadata,
    finished: bool,
}

impl FragmentStream {
    pub async fn next_fragment(&mut self) -> Option<Result<String, ChatError>> {
        self.next().await
    }

    /// Drains the stream and concatenates every fragment.
    pub async fn collect_text(mut self) -> Result<String, ChatError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    /// Stop reason and token usage seen so far.
    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Stream for FragmentStream {
    type Item = Result<String, ChatError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.finished {
                return Poll::Ready(None);
            }
            let message = match this.rx.poll_recv(cx) {
                Poll::Ready(message) => message,
                Poll::Pending => return Poll::Pending,
            };
            match message {
                Some(StreamMessage::Chunk(text)) => return Poll::Ready(Some(Ok(text))),
                Some(StreamMessage::Metadata(update)) => this.metadata.merge(update),
                Some(StreamMessage::Error(err)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Some(StreamMessage::End) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                None => {
                    this.finished = true;
                    let err = if this.cancel_token.is_cancelled() {
                        ChatError::Cancelled
                    } else {
                        ChatError::Transport("stream closed before completion".to_string())
                    };
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }
}

impl Drop for FragmentStream {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Turns a history snapshot plus parameters into one streamed request.
#[derive(Clone)]
pub struct ChatStreamService {
    transport: Arc<dyn CompletionTransport>,
}

impl ChatStreamService {
    pub fn new(transport: Arc<dyn CompletionTransport>) -> Self {
        Self { transport }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Starts streaming a reply to `history`.
    ///
    /// Must be called from within a tokio runtime; the request runs on a
    /// spawned task that feeds the returned stream.
    pub fn stream(
        &self,
        history: &[Turn],
        params: &GenerationParameters,
    ) -> Result<FragmentStream, ChatError> {
        match history.last() {
            None => return Err(ChatError::EmptyHistory),
            Some(turn) if !turn.role.is_user() => {
                return Err(ChatError::InvalidTurn(
                    "the last turn of a request must come from the user".to_string(),
                ))
            }
            Some(_) => {}
        }
        let params = params.clone().validated()?;

        let request = InvokeRequest::new(history, &params);
        let body = serde_json::to_vec(&request)
            .map_err(|err| ChatError::Transport(format!("failed to encode request: {err}")))?;
        debug!(
            transport = self.transport.name(),
            model = %params.model_id,
            turns = history.len(),
            bytes = body.len(),
            "starting completion stream"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();
        let transport = Arc::clone(&self.transport);
        let model_id = params.model_id;

        tokio::spawn(async move {
            let sink = EventSink::new(tx);
            tokio::select! {
                result = transport.invoke_stream(&model_id, body, &sink) => {
                    match result {
                        Ok(()) => sink.end(),
                        Err(err) => {
                            warn!("completion stream failed: {err}");
                            sink.fail(err);
                        }
                    }
                }
                _ = task_token.cancelled() => {
                    debug!("completion stream cancelled");
                }
            }
        });

        Ok(FragmentStream {
            rx,
            cancel_token,
            metadata: StreamMetadata::default(),
            finished: false,
        })
    }
}
