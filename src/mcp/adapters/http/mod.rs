//! Network sessions over HTTP: streamable HTTP and the legacy SSE variant.

mod dialer;
mod legacy_sse;
mod streamable;

pub use dialer::HttpDialer;
pub use legacy_sse::LegacySseSession;
pub use streamable::StreamableHttpSession;

use crate::mcp::{
    domain::NetworkTransportConfig,
    ports::{SessionError, SessionResult},
};
use eventsource_stream::{EventStream, Eventsource};
use futures::Stream;
use reqwest::Response;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Media type of a server-sent event stream.
pub(crate) const EVENT_STREAM: &str = "text/event-stream";
/// Event type of JSON-RPC payloads on an event stream.
pub(crate) const MESSAGE_EVENT: &str = "message";

/// Builds the configured header set sent with every request of a session.
pub(crate) fn configured_headers(config: &NetworkTransportConfig) -> SessionResult<HeaderMap> {
    config
        .headers()
        .iter()
        .map(|(name, value)| {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(SessionError::transport)?;
            let header_value = HeaderValue::from_str(value).map_err(SessionError::transport)?;
            Ok((header_name, header_value))
        })
        .collect()
}

/// Fails with [`SessionError::HttpStatus`] unless the status is 2xx.
pub(crate) async fn ensure_success(response: Response) -> SessionResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SessionError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

/// Returns whether the response body is an event stream.
pub(crate) fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().starts_with(EVENT_STREAM))
}

/// Decodes a chunked body as server-sent events.
pub(crate) fn server_events<S, B, E>(body: S) -> EventStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    body.eventsource()
}

/// Returns whether an event carries a JSON-RPC message.
pub(crate) fn is_message_event(event: &str) -> bool {
    event.is_empty() || event == MESSAGE_EVENT
}
