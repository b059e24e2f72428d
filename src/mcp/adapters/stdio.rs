//! Session over a spawned child process speaking JSON-RPC on stdio.

use super::{
    channel::LineChannel,
    protocol::{self, RpcExchange},
};
use crate::mcp::{
    domain::{CallOptions, InvocationOutput, OperationDescriptor, ProcessTransportConfig, SessionId},
    ports::{McpSession, SessionError, SessionResult, TransportProtocol},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// Time a child gets to exit after its stdin closes before it is killed.
const EXIT_GRACE_PERIOD: Duration = Duration::from_secs(2);

type StdioChannel = LineChannel<BufReader<ChildStdout>, ChildStdin>;

/// Session backed by a child process.
///
/// The child sees only the configured environment plus a short list of host
/// defaults such as `PATH` and `HOME`.
/// It is killed if the session is dropped without being closed.
#[derive(Debug)]
pub struct StdioSession {
    id: SessionId,
    child: Child,
    channel: Option<StdioChannel>,
}

impl StdioSession {
    /// Spawns the configured process and performs the protocol handshake.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the process cannot be spawned or the
    /// handshake fails. The child is terminated in the latter case.
    pub async fn spawn(config: &ProcessTransportConfig) -> SessionResult<Self> {
        let mut child = Command::new(config.command())
            .args(config.args())
            .env_clear()
            .envs(config.effective_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SessionError::transport)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::transport_message("child stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::transport_message("child stdout was not captured"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, config.command().to_owned()));
        }

        let mut session = Self {
            id: SessionId::new(),
            child,
            channel: Some(LineChannel::new(BufReader::new(stdout), stdin)),
        };
        tracing::debug!(
            session_id = %session.id,
            command = config.command(),
            "spawned tool server process"
        );

        if let Err(err) = protocol::handshake(&mut session, config.options()).await {
            if let Err(close_err) = session.close().await {
                tracing::debug!(error = %close_err, "failed to stop process after handshake error");
            }
            return Err(err);
        }
        Ok(session)
    }

    fn channel(&mut self) -> SessionResult<&mut StdioChannel> {
        self.channel.as_mut().ok_or(SessionError::Closed)
    }
}

#[async_trait]
impl RpcExchange for StdioSession {
    async fn request(&mut self, method: &str, params: Option<Value>) -> SessionResult<Value> {
        self.channel()?.request(method, params).await
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> SessionResult<()> {
        self.channel()?.notify(method, params).await
    }
}

#[async_trait]
impl McpSession for StdioSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::Stdio
    }

    fn is_open(&self) -> bool {
        self.channel.is_some()
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
        // Dropping the channel closes the child's stdin.
        if self.channel.take().is_none() {
            return Ok(());
        }

        match tokio::time::timeout(EXIT_GRACE_PERIOD, self.child.wait()).await {
            Ok(waited) => {
                let status = waited.map_err(SessionError::transport)?;
                tracing::debug!(session_id = %self.id, %status, "tool server process exited");
                Ok(())
            }
            Err(_) => {
                tracing::debug!(session_id = %self.id, "tool server process did not exit; killing");
                self.child.kill().await.map_err(SessionError::transport)
            }
        }
    }
}

async fn forward_stderr(stderr: ChildStderr, command: String) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(command = %command, "{line}"),
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(command = %command, error = %err, "stopped reading stderr");
                break;
            }
        }
    }
}
