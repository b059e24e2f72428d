//! In-memory tool server for toolkit and adapter tests.

use crate::mcp::{
    domain::{
        CallOptions, InvocationOutput, OperationDescriptor, ServerConnectionConfig, SessionId,
        TransportKind,
    },
    ports::{
        ConnectorError, ConnectorResult, McpSession, SessionConnector, SessionError,
        SessionResult, TransportProtocol,
    },
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// JSON-RPC code returned for an operation missing from the catalog.
const INVALID_PARAMS: i64 = -32602;

/// One recorded operation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRecord {
    /// Session that carried the call.
    pub session_id: SessionId,
    /// Operation name.
    pub operation: String,
    /// Arguments as received.
    pub arguments: Map<String, Value>,
}

/// Scripted tool server reachable through [`SessionConnector`].
///
/// It never spawns processes or opens sockets. Operations without a scripted
/// result echo their arguments back as a single text block.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMcpServer {
    state: Arc<RwLock<ServerState>>,
}

#[derive(Debug, Default)]
struct ServerState {
    catalog: Vec<OperationDescriptor>,
    results: HashMap<String, InvocationOutput>,
    failures: HashMap<String, SessionError>,
    connect_failure: Option<SessionError>,
    list_failure: Option<SessionError>,
    opened: usize,
    closed: usize,
    invocations: Vec<InvocationRecord>,
}

impl InMemoryMcpServer {
    /// Creates a server with an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a server advertising `catalog`.
    #[must_use]
    pub fn with_catalog(catalog: Vec<OperationDescriptor>) -> Self {
        let state = ServerState {
            catalog,
            ..ServerState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    fn read(&self) -> SessionResult<RwLockReadGuard<'_, ServerState>> {
        self.state
            .read()
            .map_err(|err| SessionError::transport_message(err.to_string()))
    }

    fn write(&self) -> SessionResult<RwLockWriteGuard<'_, ServerState>> {
        self.state
            .write()
            .map_err(|err| SessionError::transport_message(err.to_string()))
    }

    /// Replaces the advertised catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when lock acquisition fails.
    pub fn set_catalog(&self, catalog: Vec<OperationDescriptor>) -> SessionResult<()> {
        self.write()?.catalog = catalog;
        Ok(())
    }

    /// Scripts the result returned for an operation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when lock acquisition fails.
    pub fn set_result(
        &self,
        operation: impl Into<String>,
        output: InvocationOutput,
    ) -> SessionResult<()> {
        self.write()?.results.insert(operation.into(), output);
        Ok(())
    }

    /// Scripts a failure for every call to an operation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when lock acquisition fails.
    pub fn set_failure(
        &self,
        operation: impl Into<String>,
        failure: SessionError,
    ) -> SessionResult<()> {
        self.write()?.failures.insert(operation.into(), failure);
        Ok(())
    }

    /// Makes every subsequent connection attempt fail.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when lock acquisition fails.
    pub fn set_connect_failure(&self, failure: Option<SessionError>) -> SessionResult<()> {
        self.write()?.connect_failure = failure;
        Ok(())
    }

    /// Makes catalog listing fail.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when lock acquisition fails.
    pub fn set_list_failure(&self, failure: Option<SessionError>) -> SessionResult<()> {
        self.write()?.list_failure = failure;
        Ok(())
    }

    /// Returns how many sessions were opened.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when lock acquisition fails.
    pub fn opened_sessions(&self) -> SessionResult<usize> {
        Ok(self.read()?.opened)
    }

    /// Returns how many sessions were closed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when lock acquisition fails.
    pub fn closed_sessions(&self) -> SessionResult<usize> {
        Ok(self.read()?.closed)
    }

    /// Returns every recorded operation call in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when lock acquisition fails.
    pub fn invocations(&self) -> SessionResult<Vec<InvocationRecord>> {
        Ok(self.read()?.invocations.clone())
    }
}

const fn protocol_for(config: &ServerConnectionConfig) -> TransportProtocol {
    match config.kind() {
        TransportKind::Process => TransportProtocol::Stdio,
        TransportKind::Network => TransportProtocol::StreamableHttp,
    }
}

#[async_trait]
impl SessionConnector for InMemoryMcpServer {
    async fn connect(
        &self,
        config: &ServerConnectionConfig,
    ) -> ConnectorResult<Box<dyn McpSession>> {
        let protocol = protocol_for(config);
        let connection_error = |source| ConnectorError::Connection { protocol, source };

        let mut state = self.write().map_err(connection_error)?;
        if let Some(failure) = state.connect_failure.clone() {
            return Err(connection_error(failure));
        }
        state.opened += 1;

        Ok(Box::new(InMemorySession {
            id: SessionId::new(),
            protocol,
            server: self.clone(),
            open: true,
        }))
    }
}

struct InMemorySession {
    id: SessionId,
    protocol: TransportProtocol,
    server: InMemoryMcpServer,
    open: bool,
}

impl InMemorySession {
    const fn ensure_open(&self) -> SessionResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }
}

#[async_trait]
impl McpSession for InMemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn protocol(&self) -> TransportProtocol {
        self.protocol
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn list_operations(
        &mut self,
        _options: &CallOptions,
    ) -> SessionResult<Vec<OperationDescriptor>> {
        self.ensure_open()?;
        let state = self.server.read()?;
        state
            .list_failure
            .as_ref()
            .map_or_else(|| Ok(state.catalog.clone()), |failure| Err(failure.clone()))
    }

    async fn call_operation(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
        _options: &CallOptions,
    ) -> SessionResult<InvocationOutput> {
        self.ensure_open()?;
        let mut state = self.server.write()?;
        state.invocations.push(InvocationRecord {
            session_id: self.id,
            operation: name.to_owned(),
            arguments: arguments.clone(),
        });

        if let Some(failure) = state.failures.get(name) {
            return Err(failure.clone());
        }
        if let Some(output) = state.results.get(name) {
            return Ok(output.clone());
        }
        if !state.catalog.iter().any(|entry| entry.name() == name) {
            return Err(SessionError::Remote {
                code: INVALID_PARAMS,
                message: format!("unknown tool: {name}"),
                data: None,
            });
        }

        let echoed = serde_json::to_string(&arguments)
            .map_err(|err| SessionError::MalformedResponse(err.to_string()))?;
        Ok(InvocationOutput::text(echoed))
    }

    async fn close(&mut self) -> SessionResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.server.write()?.closed += 1;
        Ok(())
    }
}
