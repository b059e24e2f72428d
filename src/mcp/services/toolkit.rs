//! Toolkit manager: lazy, idempotent catalog construction for one server.

use super::{
    AdapterBuildError, Catalog, OperationAdapter, SessionPolicy, adapter::close_quietly,
    discover_operations,
};
use crate::mcp::{
    adapters::TransportConnector,
    domain::{ConnectionConfigError, OperationDescriptor, ServerConnectionConfig},
    ports::{ConnectorError, SessionConnector, SessionError},
};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Toolkit-wide behaviour settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolkitSettings {
    session_policy: SessionPolicy,
}

impl ToolkitSettings {
    /// Creates default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            session_policy: SessionPolicy::PerInvocation,
        }
    }

    /// Sets how adapters obtain sessions.
    #[must_use]
    pub const fn with_session_policy(mut self, session_policy: SessionPolicy) -> Self {
        self.session_policy = session_policy;
        self
    }

    /// Returns the session policy.
    #[must_use]
    pub const fn session_policy(&self) -> SessionPolicy {
        self.session_policy
    }
}

/// Errors returned by [`McpToolkit`].
#[derive(Debug, Clone, Error)]
pub enum ToolkitError {
    /// The connection configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConnectionConfigError),

    /// The discovery session could not be opened.
    #[error(transparent)]
    Connection(#[from] ConnectorError),

    /// The server's operation list could not be retrieved.
    #[error("operation discovery failed: {0}")]
    Discovery(#[source] SessionError),

    /// Adapters were requested before [`McpToolkit::initialize`] succeeded.
    #[error("toolkit is not initialized; call initialize() first")]
    NotInitialized,
}

/// Result type for toolkit operations.
pub type ToolkitResult<T> = Result<T, ToolkitError>;

/// Discovers a server's operations once and exposes them as adapters.
#[derive(Debug)]
pub struct McpToolkit<C = TransportConnector>
where
    C: SessionConnector + 'static,
{
    config: Arc<ServerConnectionConfig>,
    connector: Arc<C>,
    settings: ToolkitSettings,
    catalog: OnceCell<Catalog>,
}

impl McpToolkit {
    /// Creates a toolkit that reaches the server through real transports.
    #[must_use]
    pub fn new(config: ServerConnectionConfig) -> Self {
        Self::with_connector(config, TransportConnector::new())
    }

    /// Parses a structural configuration and creates a toolkit.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::Config`] when the configuration is invalid.
    pub fn from_value(raw: &Value) -> ToolkitResult<Self> {
        Ok(Self::new(ServerConnectionConfig::from_value(raw)?))
    }
}

impl<C> McpToolkit<C>
where
    C: SessionConnector + 'static,
{
    /// Creates a toolkit around a custom connector.
    #[must_use]
    pub fn with_connector(config: ServerConnectionConfig, connector: C) -> Self {
        Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
            settings: ToolkitSettings::new(),
            catalog: OnceCell::new(),
        }
    }

    /// Replaces the toolkit settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: ToolkitSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the connection configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConnectionConfig {
        &self.config
    }

    /// Builds the catalog on first call and returns it.
    ///
    /// Later calls, including concurrent ones, return the same catalog
    /// without contacting the server. A failed attempt leaves the toolkit
    /// uninitialized so it can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::Connection`] or [`ToolkitError::Discovery`]
    /// when the server cannot be reached or listed.
    pub async fn initialize(&self) -> ToolkitResult<&Catalog> {
        self.catalog.get_or_try_init(|| self.load_catalog()).await
    }

    /// Returns the catalog if initialization has completed.
    #[must_use]
    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.get()
    }

    /// Returns the usable adapters.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::NotInitialized`] before a successful
    /// [`initialize`](Self::initialize).
    pub fn tools(&self) -> ToolkitResult<&[OperationAdapter]> {
        self.catalog
            .get()
            .map(Catalog::tools)
            .ok_or(ToolkitError::NotInitialized)
    }

    /// Looks up one adapter by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolkitError::NotInitialized`] before a successful
    /// [`initialize`](Self::initialize).
    pub fn tool(&self, name: &str) -> ToolkitResult<Option<&OperationAdapter>> {
        self.catalog
            .get()
            .map(|catalog| catalog.tool(name))
            .ok_or(ToolkitError::NotInitialized)
    }

    /// Closes sessions kept open by adapters under [`SessionPolicy::Shared`].
    pub async fn cleanup(&self) {
        let Some(catalog) = self.catalog.get() else {
            return;
        };
        join_all(catalog.tools().iter().map(OperationAdapter::close_shared_session)).await;
    }

    async fn load_catalog(&self) -> ToolkitResult<Catalog> {
        let mut session = self.connector.connect(&self.config).await?;
        let listed = discover_operations(session.as_mut(), self.config.options()).await;
        close_quietly(session.as_mut()).await;

        let descriptors = listed.map_err(ToolkitError::Discovery)?;
        Ok(self.build_catalog(descriptors).await)
    }

    async fn build_catalog(&self, descriptors: Vec<OperationDescriptor>) -> Catalog {
        let connector: Arc<dyn SessionConnector> = self.connector.clone();
        let policy = self.settings.session_policy();

        let builds = descriptors.iter().cloned().map(|descriptor| {
            let config = Arc::clone(&self.config);
            let adapter_connector = Arc::clone(&connector);
            async move { OperationAdapter::build(descriptor, config, adapter_connector, policy) }
        });
        let outcomes = join_all(builds).await;

        let mut seen = HashSet::new();
        let mut tools = Vec::new();
        let mut rejected = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(adapter) if seen.insert(adapter.name().to_owned()) => tools.push(adapter),
                Ok(adapter) => {
                    rejected.push(AdapterBuildError::DuplicateName(adapter.name().to_owned()));
                }
                Err(err) => rejected.push(err),
            }
        }

        for err in &rejected {
            tracing::warn!(operation = err.operation(), error = %err, "operation dropped");
        }
        tracing::info!(
            listed = descriptors.len(),
            available = tools.len(),
            dropped = rejected.len(),
            "operation catalog ready"
        );
        Catalog::new(descriptors, tools, rejected)
    }
}
