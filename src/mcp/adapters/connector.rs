//! Transport connector: picks a wire for a configuration and opens it.

use super::{http::HttpDialer, stdio::StdioSession};
use crate::mcp::{
    domain::{
        NetworkTransportConfig, ProcessTransportConfig, ServerConnectionConfig,
        ensure_safe_arguments,
    },
    ports::{
        ConnectorError, ConnectorResult, McpSession, NetworkDialer, SessionConnector,
        TransportProtocol,
    },
};
use async_trait::async_trait;

/// Whether process arguments come from a trusted source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TrustMode {
    /// Arguments are screened before anything is spawned.
    #[default]
    Untrusted,
    /// Arguments are passed through unscreened.
    Trusted,
}

/// Opens stdio sessions directly and network sessions through a dialer.
///
/// Network configurations try streamable HTTP first and fall back to the
/// legacy SSE transport once, with the same headers, when it fails.
#[derive(Debug, Clone, Default)]
pub struct TransportConnector<D = HttpDialer> {
    dialer: D,
    trust: TrustMode,
}

impl TransportConnector {
    /// Creates a connector backed by the HTTP dialer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: NetworkDialer> TransportConnector<D> {
    /// Creates a connector with a custom network dialer.
    #[must_use]
    pub const fn with_dialer(dialer: D) -> Self {
        Self {
            dialer,
            trust: TrustMode::Untrusted,
        }
    }

    /// Sets the trust mode applied to process arguments.
    #[must_use]
    pub const fn with_trust_mode(mut self, trust: TrustMode) -> Self {
        self.trust = trust;
        self
    }

    /// Returns the configured trust mode.
    #[must_use]
    pub const fn trust_mode(&self) -> TrustMode {
        self.trust
    }

    async fn connect_process(
        &self,
        config: &ProcessTransportConfig,
    ) -> ConnectorResult<Box<dyn McpSession>> {
        if self.trust == TrustMode::Untrusted {
            ensure_safe_arguments(config.args())?;
        }

        let session = StdioSession::spawn(config)
            .await
            .map_err(|source| ConnectorError::Connection {
                protocol: TransportProtocol::Stdio,
                source,
            })?;
        Ok(Box::new(session))
    }

    async fn connect_network(
        &self,
        config: &NetworkTransportConfig,
    ) -> ConnectorResult<Box<dyn McpSession>> {
        match self.dialer.open_streamable_http(config).await {
            Ok(session) => return Ok(session),
            Err(err) => tracing::warn!(
                url = %config.url(),
                error = %err,
                "streamable HTTP connection failed; falling back to SSE"
            ),
        }

        self.dialer
            .open_event_stream(config)
            .await
            .map_err(|source| ConnectorError::Connection {
                protocol: TransportProtocol::Sse,
                source,
            })
    }
}

#[async_trait]
impl<D: NetworkDialer> SessionConnector for TransportConnector<D> {
    async fn connect(
        &self,
        config: &ServerConnectionConfig,
    ) -> ConnectorResult<Box<dyn McpSession>> {
        let session = match config {
            ServerConnectionConfig::Process(process) => self.connect_process(process).await?,
            ServerConnectionConfig::Network(network) => self.connect_network(network).await?,
        };
        tracing::debug!(
            session_id = %session.id(),
            protocol = %session.protocol(),
            "session opened"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{
        domain::{CallOptions, InvocationOutput, OperationDescriptor, RejectionReason, SessionId},
        ports::{MockNetworkDialer, SessionError, SessionResult},
    };
    use mockall::Sequence;
    use rstest::rstest;
    use serde_json::{Map, Value, json};

    struct StubSession {
        id: SessionId,
        protocol: TransportProtocol,
    }

    impl StubSession {
        fn boxed(protocol: TransportProtocol) -> Box<dyn McpSession> {
            Box::new(Self {
                id: SessionId::new(),
                protocol,
            })
        }
    }

    #[async_trait]
    impl McpSession for StubSession {
        fn id(&self) -> SessionId {
            self.id
        }

        fn protocol(&self) -> TransportProtocol {
            self.protocol
        }

        fn is_open(&self) -> bool {
            true
        }

        async fn list_operations(
            &mut self,
            _options: &CallOptions,
        ) -> SessionResult<Vec<OperationDescriptor>> {
            Ok(Vec::new())
        }

        async fn call_operation(
            &mut self,
            _name: &str,
            _arguments: Map<String, Value>,
            _options: &CallOptions,
        ) -> SessionResult<InvocationOutput> {
            Ok(InvocationOutput::default())
        }

        async fn close(&mut self) -> SessionResult<()> {
            Ok(())
        }
    }

    fn network_config() -> ServerConnectionConfig {
        ServerConnectionConfig::try_from(json!({
            "url": "http://127.0.0.1:9/mcp",
            "headers": {"Authorization": "Bearer secret", "X-Trace": "abc"}
        }))
        .expect("network config should parse")
    }

    fn refused() -> SessionError {
        SessionError::transport_message("connection refused")
    }

    #[tokio::test]
    async fn streamable_http_is_preferred() {
        let mut dialer = MockNetworkDialer::new();
        dialer
            .expect_open_streamable_http()
            .times(1)
            .returning(|_| Ok(StubSession::boxed(TransportProtocol::StreamableHttp)));
        dialer.expect_open_event_stream().never();

        let connector = TransportConnector::with_dialer(dialer);
        let session = connector
            .connect(&network_config())
            .await
            .expect("connection should succeed");

        assert_eq!(session.protocol(), TransportProtocol::StreamableHttp);
    }

    #[tokio::test]
    async fn failed_streamable_http_falls_back_with_identical_headers() {
        let config = network_config();
        let ServerConnectionConfig::Network(expected) = config.clone() else {
            panic!("expected a network config");
        };
        let first_expected = expected.clone();

        let mut sequence = Sequence::new();
        let mut dialer = MockNetworkDialer::new();
        dialer
            .expect_open_streamable_http()
            .withf(move |attempt| attempt.headers() == first_expected.headers())
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Err(refused()));
        dialer
            .expect_open_event_stream()
            .withf(move |attempt| attempt.headers() == expected.headers())
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(StubSession::boxed(TransportProtocol::Sse)));

        let connector = TransportConnector::with_dialer(dialer);
        let session = connector
            .connect(&config)
            .await
            .expect("fallback should succeed");

        assert_eq!(session.protocol(), TransportProtocol::Sse);
    }

    #[tokio::test]
    async fn second_failure_is_reported_against_sse() {
        let mut dialer = MockNetworkDialer::new();
        dialer
            .expect_open_streamable_http()
            .times(1)
            .returning(|_| Err(refused()));
        dialer
            .expect_open_event_stream()
            .times(1)
            .returning(|_| {
                Err(SessionError::HttpStatus {
                    status: 404,
                    body: String::new(),
                })
            });

        let connector = TransportConnector::with_dialer(dialer);
        let Err(error) = connector.connect(&network_config()).await else {
            panic!("connection should fail");
        };

        assert!(matches!(
            error,
            ConnectorError::Connection {
                protocol: TransportProtocol::Sse,
                source: SessionError::HttpStatus { status: 404, .. },
            }
        ));
    }

    fn process_config(args: &[&str]) -> ServerConnectionConfig {
        ServerConnectionConfig::try_from(json!({
            "command": "toolbridge-test-no-such-command",
            "args": args,
        }))
        .expect("process config should parse")
    }

    #[rstest]
    #[case(&["../secret"], RejectionReason::ParentTraversal)]
    #[case(&["ok", "/etc/passwd"], RejectionReason::AbsolutePath)]
    #[tokio::test]
    async fn untrusted_arguments_are_rejected_before_spawning(
        #[case] args: &[&str],
        #[case] reason: RejectionReason,
    ) {
        let mut dialer = MockNetworkDialer::new();
        dialer.expect_open_streamable_http().never();
        dialer.expect_open_event_stream().never();

        let connector = TransportConnector::with_dialer(dialer);
        let Err(error) = connector.connect(&process_config(args)).await else {
            panic!("connection should be rejected");
        };

        assert!(matches!(error, ConnectorError::Rejected(rejection) if rejection.reason == reason));
    }

    #[tokio::test]
    async fn trusted_arguments_skip_the_screen() {
        let connector =
            TransportConnector::with_dialer(MockNetworkDialer::new()).with_trust_mode(TrustMode::Trusted);

        let Err(error) = connector.connect(&process_config(&["../secret"])).await else {
            panic!("spawning a missing command should fail");
        };

        assert!(matches!(
            error,
            ConnectorError::Connection {
                protocol: TransportProtocol::Stdio,
                ..
            }
        ));
    }
}
