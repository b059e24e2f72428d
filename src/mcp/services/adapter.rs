//! Host-facing adapter for one remote operation.

use crate::mcp::{
    domain::{
        ArgumentValidationError, InvocationOutput, OperationDescriptor, SchemaTranslationError,
        ServerConnectionConfig, Validator, translate_input_schema,
    },
    ports::{ConnectorError, McpSession, SessionConnector, SessionError},
};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// How adapters obtain sessions for their calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionPolicy {
    /// Open a fresh session for every call and close it afterwards.
    #[default]
    PerInvocation,
    /// Keep one session per adapter across calls.
    ///
    /// Calls on the same adapter are serialized. The session is replaced when
    /// it is found closed or a call through it fails.
    Shared,
}

/// Errors that prevent an operation from entering the catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterBuildError {
    /// The input schema could not be translated.
    #[error("operation '{operation}' was dropped: {source}")]
    Translation {
        /// Operation name.
        operation: String,
        /// Translation failure.
        #[source]
        source: SchemaTranslationError,
    },

    /// Another operation with the same name was already accepted.
    #[error("operation '{0}' is listed more than once; later entries were dropped")]
    DuplicateName(String),
}

impl AdapterBuildError {
    /// Returns the name of the affected operation.
    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::Translation { operation, .. } | Self::DuplicateName(operation) => operation,
        }
    }
}

/// Errors returned by [`OperationAdapter::invoke`].
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Arguments failed validation; nothing was sent.
    #[error("invalid arguments for '{operation}': {source}")]
    InvalidArguments {
        /// Operation name.
        operation: String,
        /// Collected validation issues.
        #[source]
        source: ArgumentValidationError,
    },

    /// No session could be opened for the call.
    #[error("could not reach server for '{operation}': {source}")]
    Connection {
        /// Operation name.
        operation: String,
        /// Connector failure.
        #[source]
        source: ConnectorError,
    },

    /// The call failed after the session was opened.
    #[error("operation '{operation}' failed: {source}")]
    Remote {
        /// Operation name.
        operation: String,
        /// Session failure, unchanged.
        #[source]
        source: SessionError,
    },

    /// The result content could not be encoded.
    #[error("could not encode result of '{operation}': {source}")]
    Serialization {
        /// Operation name.
        operation: String,
        /// Encoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Callable wrapper around one remote operation.
///
/// Cloning is cheap; clones share the same descriptor, validator, and shared
/// session slot.
#[derive(Clone)]
pub struct OperationAdapter {
    inner: Arc<AdapterInner>,
}

struct AdapterInner {
    descriptor: OperationDescriptor,
    validator: Validator,
    config: Arc<ServerConnectionConfig>,
    connector: Arc<dyn SessionConnector>,
    policy: SessionPolicy,
    shared: Mutex<Option<Box<dyn McpSession>>>,
}

impl fmt::Debug for OperationAdapter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OperationAdapter")
            .field("name", &self.name())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl OperationAdapter {
    /// Builds an adapter by translating the descriptor's input schema.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterBuildError::Translation`] when the schema cannot be
    /// translated.
    pub fn build(
        descriptor: OperationDescriptor,
        config: Arc<ServerConnectionConfig>,
        connector: Arc<dyn SessionConnector>,
        policy: SessionPolicy,
    ) -> Result<Self, AdapterBuildError> {
        let validator = translate_input_schema(descriptor.input_schema()).map_err(|source| {
            AdapterBuildError::Translation {
                operation: descriptor.name().to_owned(),
                source,
            }
        })?;

        Ok(Self {
            inner: Arc::new(AdapterInner {
                descriptor,
                validator,
                config,
                connector,
                policy,
                shared: Mutex::new(None),
            }),
        })
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.descriptor.name()
    }

    /// Returns the operation description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.inner.descriptor.description()
    }

    /// Returns the argument validator.
    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.inner.validator
    }

    /// Returns the descriptor this adapter was built from.
    #[must_use]
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.inner.descriptor
    }

    /// Returns the session policy.
    #[must_use]
    pub fn session_policy(&self) -> SessionPolicy {
        self.inner.policy
    }

    /// Validates `arguments`, calls the remote operation, and returns its
    /// content blocks encoded as JSON text.
    ///
    /// Under [`SessionPolicy::PerInvocation`] the session opened for the call
    /// is closed on every path, including failures.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError`] when validation, connection, the remote
    /// call, or result encoding fails.
    pub async fn invoke(&self, arguments: &Value) -> Result<String, InvocationError> {
        let accepted = self
            .inner
            .validator
            .validate_arguments(arguments)
            .map_err(|source| InvocationError::InvalidArguments {
                operation: self.name().to_owned(),
                source,
            })?;

        let output = match self.inner.policy {
            SessionPolicy::PerInvocation => self.call_in_fresh_session(accepted).await?,
            SessionPolicy::Shared => self.call_in_shared_session(accepted).await?,
        };
        if output.is_error() {
            tracing::warn!(operation = self.name(), "operation reported an error result");
        }

        output
            .to_text()
            .map_err(|source| InvocationError::Serialization {
                operation: self.name().to_owned(),
                source,
            })
    }

    /// Closes the shared session, if one is open.
    pub async fn close_shared_session(&self) {
        let parked = self.inner.shared.lock().await.take();
        if let Some(mut session) = parked {
            close_quietly(session.as_mut()).await;
        }
    }

    async fn connect(&self) -> Result<Box<dyn McpSession>, InvocationError> {
        self.inner
            .connector
            .connect(&self.inner.config)
            .await
            .map_err(|source| InvocationError::Connection {
                operation: self.name().to_owned(),
                source,
            })
    }

    async fn call_in_fresh_session(
        &self,
        arguments: Map<String, Value>,
    ) -> Result<InvocationOutput, InvocationError> {
        let mut session = self.connect().await?;
        let outcome = session
            .call_operation(self.name(), arguments, self.inner.config.options())
            .await;
        close_quietly(session.as_mut()).await;
        outcome.map_err(|source| self.remote_error(source))
    }

    async fn call_in_shared_session(
        &self,
        arguments: Map<String, Value>,
    ) -> Result<InvocationOutput, InvocationError> {
        let mut slot = self.inner.shared.lock().await;
        let mut session = match slot.take() {
            Some(parked) if parked.is_open() => parked,
            Some(mut stale) => {
                close_quietly(stale.as_mut()).await;
                self.connect().await?
            }
            None => self.connect().await?,
        };

        match session
            .call_operation(self.name(), arguments, self.inner.config.options())
            .await
        {
            Ok(output) => {
                *slot = Some(session);
                Ok(output)
            }
            Err(source) => {
                close_quietly(session.as_mut()).await;
                Err(self.remote_error(source))
            }
        }
    }

    fn remote_error(&self, source: SessionError) -> InvocationError {
        InvocationError::Remote {
            operation: self.name().to_owned(),
            source,
        }
    }
}

/// Closes a session, logging rather than returning a failure.
pub(crate) async fn close_quietly(session: &mut dyn McpSession) {
    if let Err(err) = session.close().await {
        tracing::warn!(
            session_id = %session.id(),
            protocol = %session.protocol(),
            error = %err,
            "failed to close session"
        );
    }
}
