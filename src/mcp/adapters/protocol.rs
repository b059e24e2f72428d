//! JSON-RPC 2.0 framing and the MCP method subset used by every transport.
//!
//! Each session type implements [`RpcExchange`] for its own wire, and the
//! handshake, listing, and call logic here is shared between them.

use crate::mcp::{
    domain::{CallOptions, InvocationOutput, OperationDescriptor},
    ports::{SessionError, SessionResult},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::future::Future;

/// Protocol revision announced during the handshake.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Client name announced during the handshake.
pub const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");

/// Handshake request.
pub const METHOD_INITIALIZE: &str = "initialize";
/// Handshake completion notification.
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
/// Catalog request.
pub const METHOD_LIST_TOOLS: &str = "tools/list";
/// Invocation request.
pub const METHOD_CALL_TOOL: &str = "tools/call";
/// Liveness probe that servers may send to clients.
pub const METHOD_PING: &str = "ping";

/// JSON-RPC code for an unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;

const JSONRPC_VERSION: &str = "2.0";

/// Outgoing JSON-RPC request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    /// Creates a request.
    #[must_use]
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Outgoing JSON-RPC notification.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    /// Creates a notification.
    #[must_use]
    pub const fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Reply sent back to a request the server initiated.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcReply {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcErrorObject>,
}

impl JsonRpcReply {
    /// Answers `ping` with an empty result and anything else with
    /// method-not-found.
    #[must_use]
    pub fn to_server_request(id: Value, method: &str) -> Self {
        if method == METHOD_PING {
            return Self {
                jsonrpc: JSONRPC_VERSION,
                id,
                result: Some(json!({})),
                error: None,
            };
        }

        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcErrorObject {
                code: METHOD_NOT_FOUND,
                message: format!("client does not handle '{method}'"),
                data: None,
            }),
        }
    }
}

/// Any message received from the server, before classification.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

/// A classified server message.
#[derive(Debug)]
pub enum Incoming {
    /// Response to one of our requests.
    Response {
        /// Identifier of the request being answered.
        id: u64,
        /// Result or remote error.
        outcome: SessionResult<Value>,
    },
    /// Request initiated by the server.
    Request {
        /// Server-chosen identifier to echo back.
        id: Value,
        /// Requested method.
        method: String,
    },
    /// Notification from the server.
    Notification {
        /// Notified method.
        method: String,
    },
}

impl IncomingMessage {
    /// Classifies the message, or returns `None` when it fits no JSON-RPC
    /// shape this client understands.
    #[must_use]
    pub fn classify(self) -> Option<Incoming> {
        match (self.method, self.id) {
            (Some(method), Some(id)) => Some(Incoming::Request { id, method }),
            (Some(method), None) => Some(Incoming::Notification { method }),
            (None, Some(raw_id)) => {
                let id = raw_id.as_u64()?;
                let result = self.result;
                let outcome = self.error.map_or_else(
                    || Ok(result.unwrap_or(Value::Null)),
                    |error| {
                        Err(SessionError::Remote {
                            code: error.code,
                            message: error.message,
                            data: error.data,
                        })
                    },
                );
                Some(Incoming::Response { id, outcome })
            }
            (None, None) => None,
        }
    }
}

/// Request/notification exchange over one wire.
#[async_trait]
pub trait RpcExchange: Send {
    /// Sends a request and waits for its result.
    async fn request(&mut self, method: &str, params: Option<Value>) -> SessionResult<Value>;

    /// Sends a notification.
    async fn notify(&mut self, method: &str, params: Option<Value>) -> SessionResult<()>;
}

/// Runs `operation`, failing with [`SessionError::Timeout`] when the options
/// carry a timeout and it elapses first.
///
/// # Errors
///
/// Returns the operation's error or a timeout.
pub async fn within<T>(
    options: &CallOptions,
    method: &str,
    operation: impl Future<Output = SessionResult<T>> + Send,
) -> SessionResult<T> {
    match options.timeout() {
        Some(timeout) => tokio::time::timeout(timeout, operation)
            .await
            .map_err(|_| SessionError::Timeout {
                method: method.to_owned(),
                timeout,
            })?,
        None => operation.await,
    }
}

/// Performs the initialize request and completion notification.
///
/// # Errors
///
/// Returns transport, remote, or timeout errors from either message.
pub async fn handshake<E>(exchange: &mut E, options: &CallOptions) -> SessionResult<()>
where
    E: RpcExchange + ?Sized,
{
    let params = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {"name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION")}
    });
    let result = within(
        options,
        METHOD_INITIALIZE,
        exchange.request(METHOD_INITIALIZE, Some(params)),
    )
    .await?;

    if !result.is_object() {
        return Err(SessionError::MalformedResponse(
            "initialize result is not an object".to_owned(),
        ));
    }
    let server_name = result
        .pointer("/serverInfo/name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let negotiated_version = result
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    tracing::debug!(
        server = server_name,
        protocol_version = negotiated_version,
        "protocol handshake completed"
    );

    within(
        options,
        METHOD_INITIALIZED,
        exchange.notify(METHOD_INITIALIZED, None),
    )
    .await
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    tools: Vec<OperationDescriptor>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

/// Requests the operation catalog with a single `tools/list` call.
///
/// # Errors
///
/// Returns transport, remote, timeout, or decoding errors.
pub async fn list_operations<E>(
    exchange: &mut E,
    options: &CallOptions,
) -> SessionResult<Vec<OperationDescriptor>>
where
    E: RpcExchange + ?Sized,
{
    let result = within(
        options,
        METHOD_LIST_TOOLS,
        exchange.request(METHOD_LIST_TOOLS, Some(json!({}))),
    )
    .await?;

    let listed: ListToolsResult = serde_json::from_value(result)
        .map_err(|err| SessionError::MalformedResponse(format!("tools/list result: {err}")))?;
    if let Some(cursor) = listed.next_cursor {
        tracing::debug!(cursor, "server reported further catalog pages; not requested");
    }
    Ok(listed.tools)
}

/// Invokes an operation with a single `tools/call` request.
///
/// # Errors
///
/// Returns transport, remote, timeout, or decoding errors.
pub async fn call_operation<E>(
    exchange: &mut E,
    name: &str,
    arguments: Map<String, Value>,
    options: &CallOptions,
) -> SessionResult<InvocationOutput>
where
    E: RpcExchange + ?Sized,
{
    let params = json!({"name": name, "arguments": arguments});
    let result = within(
        options,
        METHOD_CALL_TOOL,
        exchange.request(METHOD_CALL_TOOL, Some(params)),
    )
    .await?;

    serde_json::from_value(result)
        .map_err(|err| SessionError::MalformedResponse(format!("tools/call result: {err}")))
}
