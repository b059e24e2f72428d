//! Session port: one open, stateful connection to a tool server.

use crate::mcp::domain::{CallOptions, InvocationOutput, OperationDescriptor, SessionId};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Concrete wire transport carrying a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProtocol {
    /// Line-delimited JSON-RPC over a child process's stdio.
    Stdio,
    /// Streamable HTTP (POST with JSON or event-stream responses).
    StreamableHttp,
    /// Legacy HTTP with a server-sent event stream.
    Sse,
}

impl TransportProtocol {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::StreamableHttp => "streamable_http",
            Self::Sse => "sse",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Protocol operations available on an open session.
///
/// A session is owned by whoever opened it and must be closed by that owner
/// on every exit path. Once closed it rejects further requests with
/// [`SessionError::Closed`].
#[async_trait]
pub trait McpSession: Send {
    /// Returns the session identifier.
    fn id(&self) -> SessionId;

    /// Returns the transport carrying this session.
    fn protocol(&self) -> TransportProtocol;

    /// Returns whether the session can still carry requests.
    fn is_open(&self) -> bool;

    /// Requests the server's operation catalog.
    async fn list_operations(
        &mut self,
        options: &CallOptions,
    ) -> SessionResult<Vec<OperationDescriptor>>;

    /// Invokes one operation with an argument bag.
    async fn call_operation(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
        options: &CallOptions,
    ) -> SessionResult<InvocationOutput>;

    /// Closes the session and releases its transport resource.
    async fn close(&mut self) -> SessionResult<()>;
}

/// Errors returned by session implementations.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The underlying channel failed.
    #[error("transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),

    /// An HTTP endpoint answered with a non-success status.
    #[error("server responded with HTTP {status}: {body}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// A response could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The server answered with a JSON-RPC error object.
    #[error("server error [{code}]: {message}")]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
        /// Optional structured detail.
        data: Option<Value>,
    },

    /// A request exceeded its configured timeout.
    #[error("request '{method}' timed out after {timeout:?}")]
    Timeout {
        /// Protocol method that timed out.
        method: String,
        /// Configured limit.
        timeout: Duration,
    },

    /// The session was closed or its channel ended.
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// Wraps a channel failure.
    #[must_use]
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }

    /// Wraps a channel failure described only by text.
    #[must_use]
    pub fn transport_message(message: impl Into<String>) -> Self {
        Self::transport(std::io::Error::other(message.into()))
    }
}
