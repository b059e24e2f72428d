//! Streamable HTTP session: every message is a POST to one endpoint.
//!
//! Responses arrive either as a single JSON body or as an event stream that
//! ends with the matching response.

use super::{EVENT_STREAM, configured_headers, ensure_success, is_event_stream, server_events};
use crate::mcp::{
    adapters::protocol::{
        self, Incoming, IncomingMessage, JsonRpcNotification, JsonRpcReply, JsonRpcRequest,
        PROTOCOL_VERSION, RpcExchange,
    },
    domain::{CallOptions, InvocationOutput, NetworkTransportConfig, OperationDescriptor, SessionId},
    ports::{McpSession, SessionError, SessionResult, TransportProtocol},
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Serialize;
use serde_json::{Map, Value};

/// Header carrying the server-assigned session identifier.
pub const SESSION_HEADER: &str = "mcp-session-id";
/// Header carrying the negotiated protocol revision.
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

const ACCEPTED_MEDIA: &str = "application/json, text/event-stream";

/// Session over the streamable HTTP transport.
#[derive(Debug)]
pub struct StreamableHttpSession {
    id: SessionId,
    client: Client,
    endpoint: Url,
    headers: HeaderMap,
    server_session: Option<HeaderValue>,
    negotiated: bool,
    next_id: u64,
    open: bool,
}

impl StreamableHttpSession {
    /// Connects and performs the protocol handshake.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the endpoint rejects the handshake or
    /// answers with something other than JSON-RPC.
    pub async fn open(client: Client, config: &NetworkTransportConfig) -> SessionResult<Self> {
        let mut session = Self {
            id: SessionId::new(),
            client,
            endpoint: config.url().clone(),
            headers: configured_headers(config)?,
            server_session: None,
            negotiated: false,
            next_id: 1,
            open: true,
        };

        protocol::handshake(&mut session, config.options()).await?;
        session.negotiated = true;
        tracing::debug!(
            session_id = %session.id,
            endpoint = %session.endpoint,
            server_session = session.server_session.is_some(),
            "streamable HTTP session established"
        );
        Ok(session)
    }

    fn post(&self, body: &impl Serialize) -> RequestBuilder {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .header(ACCEPT, ACCEPTED_MEDIA)
            .json(body);
        if let Some(server_session) = &self.server_session {
            request = request.header(SESSION_HEADER, server_session.clone());
        }
        if self.negotiated {
            request = request.header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION);
        }
        request
    }

    async fn send(&mut self, body: &impl Serialize) -> SessionResult<Response> {
        if !self.open {
            return Err(SessionError::Closed);
        }
        let response = self
            .post(body)
            .send()
            .await
            .map_err(SessionError::transport)?;
        if self.server_session.is_none()
            && let Some(assigned) = response.headers().get(SESSION_HEADER)
        {
            self.server_session = Some(assigned.clone());
        }
        ensure_success(response).await
    }

    async fn answer_server_request(&self, id: Value, method: &str) -> SessionResult<()> {
        let reply = JsonRpcReply::to_server_request(id, method);
        let response = self
            .post(&reply)
            .send()
            .await
            .map_err(SessionError::transport)?;
        ensure_success(response).await.map(drop)
    }

    async fn read_event_stream(&self, response: Response, id: u64) -> SessionResult<Value> {
        let mut events = std::pin::pin!(server_events(response.bytes_stream()));
        while let Some(next) = events.next().await {
            let event = next.map_err(|err| SessionError::transport_message(err.to_string()))?;
            let Ok(message) = serde_json::from_str::<IncomingMessage>(&event.data) else {
                tracing::debug!(event = %event.event, "ignoring non-JSON stream event");
                continue;
            };
            match message.classify() {
                Some(Incoming::Response {
                    id: answered,
                    outcome,
                }) if answered == id => return outcome,
                Some(Incoming::Request {
                    id: server_id,
                    method,
                }) => self.answer_server_request(server_id, &method).await?,
                Some(Incoming::Notification { method }) => {
                    tracing::debug!(method = %method, "server notification");
                }
                Some(Incoming::Response { id: other, .. }) => {
                    tracing::debug!(id = other, "ignoring response to another request");
                }
                None => tracing::debug!("ignoring unclassifiable stream event"),
            }
        }
        Err(SessionError::MalformedResponse(
            "event stream ended before the response arrived".to_owned(),
        ))
    }
}

#[async_trait]
impl RpcExchange for StreamableHttpSession {
    async fn request(&mut self, method: &str, params: Option<Value>) -> SessionResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let response = self.send(&JsonRpcRequest::new(id, method, params)).await?;
        if is_event_stream(&response) {
            return self.read_event_stream(response, id).await;
        }

        let message: IncomingMessage = response.json().await.map_err(|err| {
            SessionError::MalformedResponse(format!("expected JSON or {EVENT_STREAM}: {err}"))
        })?;
        match message.classify() {
            Some(Incoming::Response {
                id: answered,
                outcome,
            }) if answered == id => outcome,
            _ => Err(SessionError::MalformedResponse(format!(
                "response body does not answer request {id}"
            ))),
        }
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> SessionResult<()> {
        self.send(&JsonRpcNotification::new(method, params))
            .await
            .map(drop)
    }
}

#[async_trait]
impl McpSession for StreamableHttpSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::StreamableHttp
    }

    fn is_open(&self) -> bool {
        self.open
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
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let Some(server_session) = self.server_session.take() else {
            return Ok(());
        };
        let outcome = self
            .client
            .delete(self.endpoint.clone())
            .headers(self.headers.clone())
            .header(SESSION_HEADER, server_session)
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION)
            .send()
            .await;
        match outcome {
            Ok(response) => tracing::debug!(
                session_id = %self.id,
                status = response.status().as_u16(),
                "terminated server session"
            ),
            Err(err) => tracing::debug!(
                session_id = %self.id,
                error = %err,
                "failed to terminate server session"
            ),
        }
        Ok(())
    }
}
