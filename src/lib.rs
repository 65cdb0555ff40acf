pub mod bedrock;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod types;

use serde_json::Value;
use tracing::warn;

pub use bedrock::BedrockRuntimeClient;
pub use client::{ConverseClient, ConverseStream};
pub use config::BedrockConfig;
pub use error::ConverseError;
pub use events::{
    ContentBlockDelta, ContentBlockStart, ContentBlockStop, Delta, MessageStart, MessageStop,
    StreamEvent, StreamMetadata, ToolUseDelta,
};
pub use types::{
    system_text, text_message, ConverseOptions, ConverseRequest, ConverseResponse,
    InferenceConfig, Metrics, Role, TokenUsage,
};

/// What [`converse`] hands back: the whole reply, or a stream of its pieces.
#[derive(Debug)]
pub enum ConverseReply {
    Complete(ConverseResponse),
    Streaming(ConverseStream),
}

impl ConverseReply {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ConverseReply::Streaming(_))
    }

    pub fn into_response(self) -> Option<ConverseResponse> {
        match self {
            ConverseReply::Complete(resp) => Some(resp),
            ConverseReply::Streaming(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<ConverseStream> {
        match self {
            ConverseReply::Streaming(stream) => Some(stream),
            ConverseReply::Complete(_) => None,
        }
    }
}

/// Send one conversation to `model_id` through `client`.
///
/// Builds the request from `messages` and the non-empty parts of `options`,
/// then makes exactly one call: `converse_stream` when `options.streaming` is
/// set (the default), `converse` otherwise. The stream comes back unread.
/// Client errors are logged and returned as-is; nothing is retried.
pub async fn converse<C>(
    client: &C,
    model_id: impl Into<String>,
    messages: Vec<Value>,
    options: ConverseOptions,
) -> Result<ConverseReply, ConverseError>
where
    C: ConverseClient + ?Sized,
{
    let streaming = options.streaming;
    let request = ConverseRequest::new(model_id, messages).with_options(options);

    let result = if streaming {
        client
            .converse_stream(&request)
            .await
            .map(ConverseReply::Streaming)
    } else {
        client.converse(&request).await.map(ConverseReply::Complete)
    };

    if let Err(ref e) = result {
        warn!(
            model = %request.model_id,
            streaming,
            code = e.code().unwrap_or("-"),
            "a client error occurred: {}",
            e.message()
        );
    }

    result
}
