//! Network dialer port: opens sessions over each candidate network protocol.

use super::{McpSession, SessionResult};
use crate::mcp::domain::NetworkTransportConfig;
use async_trait::async_trait;

/// Opens network sessions for a single protocol at a time.
///
/// Implementations attach the configured headers to every request they make,
/// including the request that opens an event stream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkDialer: Send + Sync {
    /// Opens and initializes a streamable HTTP session.
    async fn open_streamable_http(
        &self,
        config: &NetworkTransportConfig,
    ) -> SessionResult<Box<dyn McpSession>>;

    /// Opens and initializes a legacy SSE session.
    async fn open_event_stream(
        &self,
        config: &NetworkTransportConfig,
    ) -> SessionResult<Box<dyn McpSession>>;
}
