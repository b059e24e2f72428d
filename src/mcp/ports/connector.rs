//! Connector port: turns a connection configuration into an open session.

use super::{McpSession, SessionError, TransportProtocol};
use crate::mcp::domain::{SafetyRejection, ServerConnectionConfig};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Opens sessions to a tool server.
///
/// Each call opens exactly one transport resource; the caller owns the
/// returned session and is responsible for closing it.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Opens a new session.
    async fn connect(&self, config: &ServerConnectionConfig)
    -> ConnectorResult<Box<dyn McpSession>>;
}

/// Errors returned while opening a session.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// A process argument failed the safety screen; nothing was spawned.
    #[error(transparent)]
    Rejected(#[from] SafetyRejection),

    /// The transport could not be established.
    ///
    /// For network configurations this is the failure of the last protocol
    /// attempted.
    #[error("failed to connect over {protocol}: {source}")]
    Connection {
        /// Protocol of the failed attempt.
        protocol: TransportProtocol,
        /// Underlying failure.
        #[source]
        source: SessionError,
    },
}
