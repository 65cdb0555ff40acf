//! End-to-end tests for `BedrockRuntimeClient` against a mock Bedrock endpoint.

use aws_smithy_eventstream::frame::write_message_to;
use aws_smithy_types::event_stream::{Header, HeaderValue, Message};
use bedrock_converse::{
    converse, system_text, text_message, BedrockConfig, BedrockRuntimeClient, ConverseError,
    ConverseOptions, InferenceConfig, Role, StreamEvent,
};
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVENT_STREAM: &str = "application/vnd.amazon.eventstream";

fn client_for(server: &MockServer) -> BedrockRuntimeClient {
    let config = BedrockConfig::new("us-east-1")
        .with_endpoint_url(server.uri())
        .with_bearer_token("test-key");
    BedrockRuntimeClient::from_config(&config).expect("client")
}

fn frame(
    message_type: &str,
    type_header: &'static str,
    kind: &str,
    payload: serde_json::Value,
) -> Vec<u8> {
    let string = |v: &str| HeaderValue::String(v.to_string().into());
    let message = Message::new(payload.to_string())
        .add_header(Header::new(type_header, string(kind)))
        .add_header(Header::new(":content-type", string("application/json")))
        .add_header(Header::new(":message-type", string(message_type)));
    let mut out = Vec::new();
    write_message_to(&message, &mut out).expect("encode frame");
    out
}

fn event(kind: &str, payload: serde_json::Value) -> Vec<u8> {
    frame("event", ":event-type", kind, payload)
}

#[tokio::test]
async fn converse_posts_body_without_model_id_and_parses_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/model/test-model/converse"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "messages": [{"role": "user", "content": [{"text": "Hello, how are you?"}]}],
            "system": [{"text": "Be brief."}],
            "inferenceConfig": {"maxTokens": 256}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {
                "message": {
                    "role": "assistant",
                    "content": [{"text": "Doing great!"}]
                }
            },
            "stopReason": "end_turn",
            "usage": {"inputTokens": 16, "outputTokens": 4, "totalTokens": 20},
            "metrics": {"latencyMs": 301}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let reply = converse(
        &client,
        "test-model",
        vec![text_message(Role::User, "Hello, how are you?")],
        ConverseOptions::new()
            .with_streaming(false)
            .with_system(vec![system_text("Be brief.")])
            .with_inference_config(InferenceConfig::default().with_max_tokens(256)),
    )
    .await
    .expect("converse");

    let response = reply.into_response().expect("complete reply");
    assert_eq!(response.first_text(), Some("Doing great!"));
    assert_eq!(response.stop_reason, "end_turn");
    assert_eq!(response.usage.total_tokens, 20);
    assert_eq!(response.metrics.map(|m| m.latency_ms), Some(301));
}

#[tokio::test]
async fn converse_stream_decodes_event_frames() {
    let server = MockServer::start().await;

    let mut body = Vec::new();
    body.extend(event("messageStart", json!({"p": "abcd", "role": "assistant"})));
    for text in ["1. Flowers", " - Miley Cyrus\n", "2. Espresso"] {
        body.extend(event(
            "contentBlockDelta",
            json!({"contentBlockIndex": 0, "delta": {"text": text}}),
        ));
    }
    body.extend(event("contentBlockStop", json!({"contentBlockIndex": 0})));
    body.extend(event("messageStop", json!({"stopReason": "end_turn"})));
    body.extend(event(
        "metadata",
        json!({
            "usage": {"inputTokens": 17, "outputTokens": 21, "totalTokens": 38},
            "metrics": {"latencyMs": 812}
        }),
    ));

    Mock::given(method("POST"))
        .and(path("/model/test-model/converse-stream"))
        .and(header("accept", EVENT_STREAM))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, EVENT_STREAM))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let reply = converse(
        &client,
        "test-model",
        vec![text_message(Role::User, "Create a list of 3 pop songs.")],
        ConverseOptions::default(),
    )
    .await
    .expect("converse-stream");

    let events: Vec<StreamEvent> = reply
        .into_stream()
        .expect("streaming reply")
        .map(|e| e.expect("event"))
        .collect()
        .await;

    let kinds: Vec<&str> = events.iter().map(StreamEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            "messageStart",
            "contentBlockDelta",
            "contentBlockDelta",
            "contentBlockDelta",
            "contentBlockStop",
            "messageStop",
            "metadata"
        ]
    );

    let text: String = events.iter().filter_map(StreamEvent::text).collect();
    assert_eq!(text, "1. Flowers - Miley Cyrus\n2. Espresso");

    match &events[5] {
        StreamEvent::MessageStop(stop) => assert_eq!(stop.stop_reason, "end_turn"),
        other => panic!("expected messageStop, got {other:?}"),
    }
    match &events[6] {
        StreamEvent::Metadata(meta) => {
            let usage = meta.usage.as_ref().expect("usage");
            assert_eq!(
                (usage.input_tokens, usage.output_tokens, usage.total_tokens),
                (17, 21, 38)
            );
            assert_eq!(meta.metrics.as_ref().expect("metrics").latency_ms, 812);
        }
        other => panic!("expected metadata, got {other:?}"),
    }
}

#[tokio::test]
async fn validation_error_surfaces_service_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/model/bogus-model/converse"))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header(
                    "x-amzn-ErrorType",
                    "ValidationException:http://internal.amazon.com/coral/com.amazon.bedrock/",
                )
                .set_body_json(json!({"message": "The provided model identifier is invalid."})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = converse(
        &client,
        "bogus-model",
        vec![text_message(Role::User, "hi")],
        ConverseOptions::new().with_streaming(false),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.code(), Some("ValidationException"));
    assert_eq!(err.message(), "The provided model identifier is invalid.");
    assert!(!err.is_throttling());
}

#[tokio::test]
async fn throttling_on_stream_call_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/model/test-model/converse-stream"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "__type": "ThrottlingException",
            "message": "Too many requests, please wait before trying again."
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = converse(
        &client,
        "test-model",
        vec![text_message(Role::User, "hi")],
        ConverseOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(err.is_throttling());
    assert_eq!(err.code(), Some("ThrottlingException"));
}

#[tokio::test]
async fn in_stream_exception_ends_the_stream() {
    let server = MockServer::start().await;

    let mut body = event("messageStart", json!({"role": "assistant"}));
    body.extend(frame(
        "exception",
        ":exception-type",
        "modelStreamErrorException",
        json!({"message": "Model stream failed"}),
    ));

    Mock::given(method("POST"))
        .and(path("/model/test-model/converse-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, EVENT_STREAM))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut stream = converse(
        &client,
        "test-model",
        vec![text_message(Role::User, "hi")],
        ConverseOptions::default(),
    )
    .await
    .expect("stream opens")
    .into_stream()
    .expect("streaming reply");

    let first = stream.next_event().await.expect("first item").expect("event");
    assert_eq!(first.kind(), "messageStart");

    match stream.next_event().await {
        Some(Err(ConverseError::Service { status, code, message })) => {
            assert_eq!(status, None);
            assert_eq!(code, "modelStreamErrorException");
            assert_eq!(message, "Model stream failed");
        }
        other => panic!("expected in-stream exception, got {other:?}"),
    }
    assert!(stream.next_event().await.is_none());
}

#[tokio::test]
async fn no_authorization_header_without_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/model/test-model/converse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"message": {"role": "assistant", "content": [{"text": "ok"}]}},
            "stopReason": "end_turn"
        })))
        .mount(&server)
        .await;

    let client = BedrockRuntimeClient::new("us-east-1").with_base_url(server.uri());
    converse(
        &client,
        "test-model",
        vec![text_message(Role::User, "hi")],
        ConverseOptions::new().with_streaming(false),
    )
    .await
    .expect("converse");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}
