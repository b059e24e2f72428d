//! Legacy HTTP+SSE session.
//!
//! The client holds a GET event stream open. The server first announces a
//! message endpoint in an `endpoint` event; requests are posted there and
//! their responses come back as `message` events on the stream.

use super::{configured_headers, ensure_success, is_message_event};
use crate::mcp::{
    adapters::protocol::{
        self, Incoming, IncomingMessage, JsonRpcNotification, JsonRpcReply, JsonRpcRequest,
        RpcExchange,
    },
    domain::{CallOptions, InvocationOutput, NetworkTransportConfig, OperationDescriptor, SessionId},
    ports::{McpSession, SessionError, SessionResult, TransportProtocol},
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource, retry::Never};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

const ENDPOINT_EVENT: &str = "endpoint";

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<SessionResult<Value>>>>>;

/// Session over the legacy SSE transport.
#[derive(Debug)]
pub struct LegacySseSession {
    id: SessionId,
    poster: Poster,
    pending: PendingReplies,
    pump: JoinHandle<()>,
    next_id: u64,
    open: bool,
}

#[derive(Debug, Clone)]
struct Poster {
    client: Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl Poster {
    async fn post(&self, body: &impl Serialize) -> SessionResult<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await
            .map_err(SessionError::transport)?;
        ensure_success(response).await.map(drop)
    }
}

impl LegacySseSession {
    /// Opens the event stream, waits for the message endpoint, and performs
    /// the protocol handshake.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the stream cannot be opened, ends before
    /// announcing an endpoint, or the handshake fails.
    pub async fn open(client: Client, config: &NetworkTransportConfig) -> SessionResult<Self> {
        let headers = configured_headers(config)?;
        let request = client.get(config.url().clone()).headers(headers.clone());
        let mut source = EventSource::new(request).map_err(|_| {
            SessionError::transport_message("event stream request cannot be cloned")
        })?;
        source.set_retry_policy(Box::new(Never));

        let announced = protocol::within(
            config.options(),
            ENDPOINT_EVENT,
            await_endpoint(&mut source, config.url()),
        )
        .await;
        let endpoint = match announced {
            Ok(endpoint) => endpoint,
            Err(err) => {
                source.close();
                return Err(err);
            }
        };

        let poster = Poster {
            client,
            endpoint,
            headers,
        };
        let pending = PendingReplies::default();
        let pump = tokio::spawn(pump_events(source, poster.clone(), Arc::clone(&pending)));

        let mut session = Self {
            id: SessionId::new(),
            poster,
            pending,
            pump,
            next_id: 1,
            open: true,
        };
        tracing::debug!(
            session_id = %session.id,
            endpoint = %session.poster.endpoint,
            "legacy SSE stream established"
        );

        if let Err(err) = protocol::handshake(&mut session, config.options()).await {
            session.shutdown().await;
            return Err(err);
        }
        Ok(session)
    }

    async fn shutdown(&mut self) {
        self.open = false;
        self.pump.abort();
        self.pending.lock().await.clear();
    }
}

async fn await_endpoint(source: &mut EventSource, base: &Url) -> SessionResult<Url> {
    while let Some(next) = source.next().await {
        match next {
            Ok(Event::Message(event)) if event.event == ENDPOINT_EVENT => {
                return base.join(event.data.trim()).map_err(|err| {
                    SessionError::MalformedResponse(format!(
                        "invalid endpoint '{}': {err}",
                        event.data
                    ))
                });
            }
            Ok(Event::Open | Event::Message(_)) => {}
            Err(err) => return Err(stream_failure(err).await),
        }
    }
    Err(ended_before_endpoint())
}

fn ended_before_endpoint() -> SessionError {
    SessionError::MalformedResponse("event stream ended before announcing an endpoint".to_owned())
}

async fn stream_failure(err: EventSourceError) -> SessionError {
    match err {
        EventSourceError::InvalidStatusCode(status, response) => SessionError::HttpStatus {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        },
        EventSourceError::StreamEnded => ended_before_endpoint(),
        other => SessionError::transport_message(other.to_string()),
    }
}

async fn pump_events(mut source: EventSource, poster: Poster, pending: PendingReplies) {
    while let Some(next) = source.next().await {
        match next {
            Ok(Event::Open) => {}
            Ok(Event::Message(event)) if is_message_event(&event.event) => {
                route_message(&event.data, &poster, &pending).await;
            }
            Ok(Event::Message(event)) => {
                tracing::debug!(event = %event.event, "ignoring stream event");
            }
            Err(EventSourceError::StreamEnded) => {
                tracing::debug!("server closed the event stream");
                break;
            }
            Err(err) => {
                tracing::debug!(error = %err, "event stream failed");
                break;
            }
        }
    }
    source.close();
    // Dropping the senders fails every waiting request with `Closed`.
    pending.lock().await.clear();
}

async fn route_message(data: &str, poster: &Poster, pending: &PendingReplies) {
    let Ok(message) = serde_json::from_str::<IncomingMessage>(data) else {
        tracing::debug!("ignoring non-JSON message event");
        return;
    };

    match message.classify() {
        Some(Incoming::Response { id, outcome }) => {
            let Some(waiter) = pending.lock().await.remove(&id) else {
                tracing::debug!(id, "response for unknown request");
                return;
            };
            if waiter.send(outcome).is_err() {
                tracing::debug!(id, "request was abandoned before its response");
            }
        }
        Some(Incoming::Request { id, method }) => {
            let reply = JsonRpcReply::to_server_request(id, &method);
            if let Err(err) = poster.post(&reply).await {
                tracing::debug!(method = %method, error = %err, "failed to answer server request");
            }
        }
        Some(Incoming::Notification { method }) => {
            tracing::debug!(method = %method, "server notification");
        }
        None => tracing::debug!("ignoring unclassifiable message"),
    }
}

#[async_trait]
impl RpcExchange for LegacySseSession {
    async fn request(&mut self, method: &str, params: Option<Value>) -> SessionResult<Value> {
        if !self.open {
            return Err(SessionError::Closed);
        }
        let id = self.next_id;
        self.next_id += 1;

        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(id, sender);
        if let Err(err) = self
            .poster
            .post(&JsonRpcRequest::new(id, method, params))
            .await
        {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        receiver.await.map_err(|_| SessionError::Closed)?
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> SessionResult<()> {
        if !self.open {
            return Err(SessionError::Closed);
        }
        self.poster
            .post(&JsonRpcNotification::new(method, params))
            .await
    }
}

#[async_trait]
impl McpSession for LegacySseSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::Sse
    }

    fn is_open(&self) -> bool {
        self.open && !self.pump.is_finished()
    }

    async fn list_operations(
        &mut self,
        options: &CallOptions,
    ) -> SessionResult<Vec<OperationDescriptor>> {
        protocol::list_operations(self, options).await
    }

    async fn call_operation(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
        options: &CallOptions,
    ) -> SessionResult<InvocationOutput> {
        protocol::call_operation(self, name, arguments, options).await
    }

    async fn close(&mut self) -> SessionResult<()> {
        if self.open {
            self.shutdown().await;
            tracing::debug!(session_id = %self.id, "legacy SSE session closed");
        }
        Ok(())
    }
}

impl Drop for LegacySseSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
