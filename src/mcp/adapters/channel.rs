//! Newline-delimited JSON-RPC channel over a pair of byte streams.

use super::protocol::{
    Incoming, IncomingMessage, JsonRpcNotification, JsonRpcReply, JsonRpcRequest, RpcExchange,
};
use crate::mcp::ports::{SessionError, SessionResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// One JSON message per line in each direction.
///
/// Lines that are not JSON are skipped so that servers which log to stdout
/// do not break the exchange. Request identifiers are unique per channel.
#[derive(Debug)]
pub struct LineChannel<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
}

impl<R, W> LineChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps a reader and writer.
    #[must_use]
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
        }
    }

    const fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn write_message(&mut self, message: &impl Serialize) -> SessionResult<()> {
        let mut line = serde_json::to_string(message).map_err(SessionError::transport)?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(SessionError::transport)?;
        self.writer.flush().await.map_err(SessionError::transport)
    }

    async fn read_message(&mut self) -> SessionResult<IncomingMessage> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(SessionError::transport)?;
            if read == 0 {
                return Err(SessionError::Closed);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(message) => return Ok(message),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping non-protocol output line");
                }
            }
        }
    }
}

#[async_trait]
impl<R, W> RpcExchange for LineChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn request(&mut self, method: &str, params: Option<Value>) -> SessionResult<Value> {
        let id = self.allocate_id();
        self.write_message(&JsonRpcRequest::new(id, method, params))
            .await?;

        loop {
            match self.read_message().await?.classify() {
                Some(Incoming::Response {
                    id: answered,
                    outcome,
                }) if answered == id => return outcome,
                Some(Incoming::Response { id: answered, .. }) => {
                    tracing::debug!(answered, expected = id, "ignoring stale response");
                }
                Some(Incoming::Request {
                    id: server_id,
                    method: server_method,
                }) => {
                    let reply = JsonRpcReply::to_server_request(server_id, &server_method);
                    self.write_message(&reply).await?;
                }
                Some(Incoming::Notification { method: notified }) => {
                    tracing::debug!(method = %notified, "server notification");
                }
                None => tracing::debug!("ignoring unrecognised message"),
            }
        }
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> SessionResult<()> {
        self.write_message(&JsonRpcNotification::new(method, params))
            .await
    }
}
