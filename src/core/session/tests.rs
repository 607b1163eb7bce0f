use super::*;
use crate::core::message::{ContentBlock, Role};
use crate::core::transport::stub::StubTransport;
use std::sync::Arc;

fn reference_params() -> GenerationParameters {
    GenerationParameters {
        max_tokens: 1024,
        temperature: 0.5,
        top_p: 1.0,
        top_k: 250,
        ..GenerationParameters::default()
    }
}

fn session_with(transport: StubTransport) -> (ChatSession, Arc<StubTransport>) {
    let transport = Arc::new(transport);
    let client = ChatStreamService::new(transport.clone());
    let session = ChatSession::new(client, reference_params()).unwrap();
    (session, transport)
}

#[tokio::test]
async fn committed_turn_is_concatenation_of_fragments() {
    let (mut session, _) = session_with(StubTransport::with_text_deltas(&["Hel", "lo!"]));

    let mut rendered = Vec::new();
    let outcome = session
        .submit("Hi", |fragment| rendered.push(fragment.to_string()))
        .await
        .unwrap();

    assert_eq!(rendered, vec!["Hel", "lo!"]);
    assert_eq!(outcome.text, "Hello!");
    assert_eq!(outcome.metadata.stop_reason.as_deref(), Some("end_turn"));

    let history = session.conversation().snapshot();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], Turn::user_text("Hi"));
    assert_eq!(history[1], Turn::assistant("Hello!"));
}

#[tokio::test]
async fn empty_stream_commits_empty_assistant_text() {
    let (mut session, _) = session_with(StubTransport::with_text_deltas(&[]));

    let outcome = session.submit("Hi", |_| {}).await.unwrap();

    assert_eq!(outcome.text, "");
    assert_eq!(session.conversation().last(), Some(&Turn::assistant("")));
}

#[tokio::test]
async fn provider_rejection_leaves_history_unchanged_after_stream_call() {
    let (mut session, transport) = session_with(StubTransport::failing(ChatError::provider(
        "AccessDeniedException",
        "You don't have access to the model with the specified model ID.",
    )));

    let err = session.submit("Hi", |_| {}).await.unwrap_err();
    assert!(matches!(err, ChatError::Provider { ref code, .. } if code == "AccessDeniedException"));

    // Only the user turn is present; no assistant turn was committed.
    let history = session.conversation().snapshot();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn partial_stream_failure_commits_nothing() {
    let (mut session, _) = session_with(
        StubTransport::with_text_deltas(&["half", " an answ"])
            .then_fail(ChatError::Transport("connection reset by peer".to_string())),
    );

    let mut rendered = String::new();
    let err = session
        .submit("two", |fragment| rendered.push_str(fragment))
        .await
        .unwrap_err();
    assert_eq!(err, ChatError::Transport("connection reset by peer".to_string()));
    assert_eq!(rendered, "half an answ");
    let snapshot_after_submit = session.conversation().snapshot().to_vec();
    assert_eq!(snapshot_after_submit, vec![Turn::user_text("two")]);

    // A retry that fails the same way leaves the store exactly as it was.
    let _ = session.retry(|_| {}).await;
    assert_eq!(
        session.conversation().snapshot(),
        snapshot_after_submit.as_slice()
    );
}

#[tokio::test]
async fn new_submission_after_failure_requires_retry_or_clear() {
    let (mut session, _) = session_with(StubTransport::failing(ChatError::provider(
        "ThrottlingException",
        "Too many requests",
    )));

    assert!(session.submit("Hi", |_| {}).await.is_err());
    assert_eq!(
        session.submit("Hello?", |_| {}).await,
        Err(ChatError::UnansweredTurn)
    );
    assert_eq!(session.conversation().len(), 1);

    session.clear();
    assert!(session.conversation().is_empty());
}

#[tokio::test]
async fn retry_resends_identical_history() {
    let (mut session, transport) = session_with(StubTransport::failing(ChatError::provider(
        "ThrottlingException",
        "slow down",
    )));
    let _ = session.submit("Hi", |_| {}).await;
    let (_, first_body) = transport.last_request().unwrap();

    let _ = session.retry(|_| {}).await;
    let (_, second_body) = transport.last_request().unwrap();

    assert_eq!(transport.request_count(), 2);
    assert_eq!(first_body, second_body);
}

#[tokio::test]
async fn retry_without_pending_turn_is_rejected() {
    let (mut session, _) = session_with(StubTransport::with_text_deltas(&["ok"]));
    assert_eq!(session.retry(|_| {}).await, Err(ChatError::NothingToRetry));

    session.submit("Hi", |_| {}).await.unwrap();
    assert_eq!(session.retry(|_| {}).await, Err(ChatError::NothingToRetry));
}

#[tokio::test]
async fn history_grows_across_turns_in_requests() {
    let (mut session, transport) = session_with(StubTransport::with_text_deltas(&["ok"]));

    session.submit("first", |_| {}).await.unwrap();
    session.submit("second", |_| {}).await.unwrap();

    let (_, body) = transport.last_request().unwrap();
    let roles: Vec<_> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(roles, vec!["user", "assistant", "user"]);
    assert_eq!(body["messages"][2]["content"][0]["text"], "second");
}

#[tokio::test]
async fn staged_images_are_sent_once_then_dropped() {
    let (mut session, transport) = session_with(StubTransport::with_text_deltas(&["a cat"]));

    session.stage_image("image/png", vec![1, 2, 3]).unwrap();
    session.submit("what is this?", |_| {}).await.unwrap();

    let first = &session.conversation().snapshot()[0];
    assert_eq!(
        first.content,
        vec![
            ContentBlock::image("image/png", vec![1, 2, 3]),
            ContentBlock::text("what is this?")
        ]
    );
    let (_, body) = transport.last_request().unwrap();
    assert_eq!(body["messages"][0]["content"][0]["source"]["data"], "AQID");

    session.submit("and now?", |_| {}).await.unwrap();
    let third = &session.conversation().snapshot()[2];
    assert_eq!(third.images().count(), 0);
}

#[tokio::test]
async fn clear_discards_staged_images() {
    let (mut session, _) = session_with(StubTransport::with_text_deltas(&["ok"]));

    session.stage_image("image/jpeg", vec![7; 16]).unwrap();
    session.clear();
    session.submit("fresh question", |_| {}).await.unwrap();

    let history = session.conversation().snapshot();
    assert_eq!(history[0].content, vec![ContentBlock::text("fresh question")]);
}

#[tokio::test]
async fn discarded_images_are_not_sent() {
    let (mut session, _) = session_with(StubTransport::with_text_deltas(&["ok"]));

    session.stage_image("image/gif", vec![1]).unwrap();
    session.stage_image("image/gif", vec![2]).unwrap();
    assert_eq!(session.discard_images(), 2);
    session.submit("plain question", |_| {}).await.unwrap();

    assert_eq!(session.conversation().snapshot()[0].images().count(), 0);
    assert_eq!(session.transport_name(), "stub");
}

#[tokio::test]
async fn images_are_refused_for_text_only_models() {
    let transport = Arc::new(StubTransport::with_text_deltas(&["ok"]));
    let params = GenerationParameters {
        model_id: "anthropic.claude-v2".to_string(),
        ..reference_params()
    };
    let mut session = ChatSession::new(ChatStreamService::new(transport), params).unwrap();

    assert!(matches!(
        session.stage_image("image/png", vec![0]),
        Err(ChatError::ImagesUnsupported { ref model_id }) if model_id == "anthropic.claude-v2"
    ));
    assert!(session.conversation().staged_images().is_empty());
}

#[tokio::test]
async fn blank_messages_are_rejected_without_touching_history() {
    let (mut session, transport) = session_with(StubTransport::with_text_deltas(&["ok"]));

    assert!(matches!(
        session.submit("   ", |_| {}).await,
        Err(ChatError::EmptyMessage)
    ));
    assert!(session.conversation().is_empty());
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn invalid_parameters_are_rejected_up_front() {
    let client = ChatStreamService::new(Arc::new(StubTransport::with_text_deltas(&[])));
    let params = GenerationParameters {
        max_tokens: 0,
        ..reference_params()
    };
    assert!(matches!(
        ChatSession::new(client, params),
        Err(ChatError::InvalidParameters(_))
    ));
}

#[tokio::test]
async fn new_parameters_apply_to_the_next_request() {
    let (mut session, transport) = session_with(StubTransport::with_text_deltas(&["ok"]));
    session.submit("first", |_| {}).await.unwrap();

    session
        .set_params(GenerationParameters {
            model_id: "anthropic.claude-v2:1".to_string(),
            top_k: 40,
            temperature: 0.9,
            ..reference_params()
        })
        .unwrap();
    session.submit("second", |_| {}).await.unwrap();

    let (model_id, body) = transport.last_request().unwrap();
    assert_eq!(model_id, "anthropic.claude-v2:1");
    assert_eq!(body["top_k"], 40);
    assert!((body["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn out_of_range_parameters_leave_the_session_unchanged() {
    let (mut session, _) = session_with(StubTransport::with_text_deltas(&["ok"]));

    let result = session.set_params(GenerationParameters {
        max_tokens: 5,
        ..reference_params()
    });
    assert!(matches!(result, Err(ChatError::InvalidParameters(_))));
    assert_eq!(session.params(), &reference_params());
}

#[tokio::test]
async fn switching_to_a_text_only_model_refuses_staged_images() {
    let (mut session, transport) = session_with(StubTransport::with_text_deltas(&["ok"]));
    session.stage_image("image/png", vec![1, 2, 3]).unwrap();

    session
        .set_params(GenerationParameters {
            model_id: "anthropic.claude-v2".to_string(),
            ..reference_params()
        })
        .unwrap();

    assert!(matches!(
        session.submit("what is this?", |_| {}).await,
        Err(ChatError::ImagesUnsupported { ref model_id }) if model_id == "anthropic.claude-v2"
    ));
    assert!(session.conversation().is_empty());
    assert_eq!(session.conversation().staged_images().len(), 1);
    assert_eq!(transport.request_count(), 0);

    assert_eq!(session.discard_images(), 1);
    session.submit("plain text then", |_| {}).await.unwrap();
    assert_eq!(transport.request_count(), 1);
}
