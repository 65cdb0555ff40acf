use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use aws_smithy_eventstream::frame::{DecodedFrame, MessageFrameDecoder};
use aws_smithy_types::event_stream::Message;
use bytes::{Buf, Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ConverseError;
use crate::events::StreamEvent;
use crate::types::{ConverseRequest, ConverseResponse};

/// A handle that can reach the Converse API. Request in, response out; auth,
/// transport and timeouts are the implementation's business.
#[async_trait]
pub trait ConverseClient: Send + Sync {
    /// Single round trip, returns once the whole reply is in.
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse, ConverseError>;

    /// Returns once the service accepts the call. Events are read as the
    /// stream is polled.
    async fn converse_stream(
        &self,
        request: &ConverseRequest,
    ) -> Result<ConverseStream, ConverseError>;
}

/// Blanket impl so `Box<dyn ConverseClient>` can be passed to [`crate::converse`].
#[async_trait]
impl ConverseClient for Box<dyn ConverseClient> {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse, ConverseError> {
        (**self).converse(request).await
    }

    async fn converse_stream(
        &self,
        request: &ConverseRequest,
    ) -> Result<ConverseStream, ConverseError> {
        (**self).converse_stream(request).await
    }
}

/// Lazy, consume-once sequence of [`StreamEvent`]s.
///
/// Ends after the last event, or right after the first error.
pub struct ConverseStream {
    inner: BoxStream<'static, Result<StreamEvent, ConverseError>>,
}

impl ConverseStream {
    pub fn new<S>(events: S) -> Self
    where
        S: Stream<Item = Result<StreamEvent, ConverseError>> + Send + 'static,
    {
        Self {
            inner: events.boxed(),
        }
    }

    /// Decode an `application/vnd.amazon.eventstream` body. Nothing is read
    /// from `body` until the returned stream is polled.
    pub fn from_body<S, E>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let state = DecodeState {
            body: body.boxed(),
            buffer: BytesMut::new(),
            decoder: MessageFrameDecoder::new(),
            partial: false,
            done: false,
        };

        Self::new(stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            let item = state.next_event().await?;
            if item.is_err() {
                state.done = true;
            }
            Some((item, state))
        }))
    }

    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, ConverseError>> {
        self.inner.next().await
    }
}

impl Stream for ConverseStream {
    type Item = Result<StreamEvent, ConverseError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for ConverseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverseStream").finish_non_exhaustive()
    }
}

struct DecodeState<E> {
    body: BoxStream<'static, Result<Bytes, E>>,
    buffer: BytesMut,
    decoder: MessageFrameDecoder,
    /// Bytes of an unfinished frame have been read, either still in `buffer`
    /// or already taken by the decoder as a prelude.
    partial: bool,
    done: bool,
}

impl<E: fmt::Display> DecodeState<E> {
    async fn next_event(&mut self) -> Option<Result<StreamEvent, ConverseError>> {
        loop {
            match self.decoder.decode_frame(&mut self.buffer) {
                Ok(DecodedFrame::Complete(message)) => {
                    self.partial = self.buffer.has_remaining();
                    match event_from_message(&message) {
                        Ok(Some(event)) => return Some(Ok(event)),
                        Ok(None) => continue,
                        Err(e) => return Some(Err(e)),
                    }
                }
                Ok(DecodedFrame::Incomplete) => {}
                Err(e) => {
                    return Some(Err(ConverseError::Stream(format!(
                        "malformed event-stream frame: {e}"
                    ))))
                }
            }

            match self.body.next().await {
                Some(Ok(chunk)) => {
                    if !chunk.is_empty() {
                        self.partial = true;
                        self.buffer.extend_from_slice(&chunk);
                    }
                }
                Some(Err(e)) => return Some(Err(ConverseError::Request(e.to_string()))),
                None if self.partial => {
                    return Some(Err(ConverseError::Stream(
                        "response body ended mid-frame".into(),
                    )))
                }
                None => return None,
            }
        }
    }
}

fn header_str<'a>(message: &'a Message, name: &str) -> Option<&'a str> {
    message
        .headers()
        .iter()
        .find(|h| h.name().as_str() == name)
        .and_then(|h| h.value().as_string().ok())
        .map(|v| v.as_str())
}

/// Map one frame to an event. Unknown event types come back as `Ok(None)`.
fn event_from_message(message: &Message) -> Result<Option<StreamEvent>, ConverseError> {
    let payload = message.payload();
    match header_str(message, ":message-type").unwrap_or("event") {
        "event" => {
            let kind = header_str(message, ":event-type").ok_or_else(|| {
                ConverseError::Stream("event frame without :event-type header".into())
            })?;
            if !StreamEvent::KINDS.contains(&kind) {
                debug!(kind, "skipping unknown stream event");
                return Ok(None);
            }

            let body: Value = if payload.is_empty() {
                Value::Object(Map::new())
            } else {
                serde_json::from_slice(payload).map_err(|e| {
                    ConverseError::Parse(format!("{kind} event payload: {e}"))
                })?
            };

            let mut tagged = Map::new();
            tagged.insert(kind.to_string(), body);
            serde_json::from_value(Value::Object(tagged))
                .map(Some)
                .map_err(|e| ConverseError::Parse(format!("{kind} event: {e}")))
        }
        "exception" => {
            let code = header_str(message, ":exception-type")
                .unwrap_or("UnknownException")
                .to_string();
            let text = serde_json::from_slice::<Value>(payload)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| String::from_utf8_lossy(payload).into_owned());
            Err(ConverseError::Service {
                status: None,
                code,
                message: text,
            })
        }
        "error" => Err(ConverseError::Service {
            status: None,
            code: header_str(message, ":error-code")
                .unwrap_or("UnknownError")
                .to_string(),
            message: header_str(message, ":error-message")
                .unwrap_or_default()
                .to_string(),
        }),
        other => Err(ConverseError::Stream(format!(
            "unexpected message type '{other}'"
        ))),
    }
}
