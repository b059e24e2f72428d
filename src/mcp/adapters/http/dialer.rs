//! `reqwest`-backed implementation of the network dialer port.

use super::{LegacySseSession, StreamableHttpSession};
use crate::mcp::{
    domain::NetworkTransportConfig,
    ports::{McpSession, NetworkDialer, SessionResult},
};
use async_trait::async_trait;
use reqwest::Client;

/// Opens HTTP sessions with a shared connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpDialer {
    client: Client,
}

impl HttpDialer {
    /// Creates a dialer with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dialer around a preconfigured client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NetworkDialer for HttpDialer {
    async fn open_streamable_http(
        &self,
        config: &NetworkTransportConfig,
    ) -> SessionResult<Box<dyn McpSession>> {
        let session = StreamableHttpSession::open(self.client.clone(), config).await?;
        Ok(Box::new(session))
    }

    async fn open_event_stream(
        &self,
        config: &NetworkTransportConfig,
    ) -> SessionResult<Box<dyn McpSession>> {
        let session = LegacySseSession::open(self.client.clone(), config).await?;
        Ok(Box::new(session))
    }
}
