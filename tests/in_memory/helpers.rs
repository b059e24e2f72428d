//! Shared fixtures for in-memory toolkit integration tests.

use rstest::fixture;
use serde_json::{Value, json};
use toolbridge::mcp::{
    adapters::InMemoryMcpServer,
    domain::{OperationDescriptor, ServerConnectionConfig},
    services::McpToolkit,
};

/// Toolkit wired to the in-memory server.
pub type TestToolkit = McpToolkit<InMemoryMcpServer>;

/// Builds a root input schema with the given properties and required list.
#[must_use]
pub fn object_schema(properties: Value, required: Value) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

/// Catalog with two usable operations and two that cannot be translated.
#[must_use]
pub fn mixed_catalog() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "read_file",
            "Reads a file from the workspace",
            object_schema(json!({"path": {"type": "string"}}), json!(["path"])),
        ),
        OperationDescriptor::new(
            "broken",
            "Declares a non-object root",
            json!({"type": "string"}),
        ),
        OperationDescriptor::new(
            "search",
            "Searches indexed notes",
            object_schema(
                json!({
                    "query": {"type": "string"},
                    "limit": {"type": "number"}
                }),
                json!(["query"]),
            ),
        ),
        OperationDescriptor::new(
            "empty",
            "Declares no properties",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

/// Process-style configuration; the in-memory server never spawns it.
#[fixture]
pub fn config() -> ServerConnectionConfig {
    ServerConnectionConfig::try_from(json!({
        "command": "workspace-tools",
        "args": ["--stdio"]
    }))
    .expect("test configuration should parse")
}

/// In-memory server advertising [`mixed_catalog`].
#[fixture]
pub fn server() -> InMemoryMcpServer {
    InMemoryMcpServer::with_catalog(mixed_catalog())
}

/// Server and a toolkit wired to it; both share recorded state.
pub struct TestContext {
    /// Scripted server.
    pub server: InMemoryMcpServer,
    /// Toolkit under test.
    pub toolkit: TestToolkit,
}

impl TestContext {
    /// Wires a toolkit to `server` with default settings.
    #[must_use]
    pub fn new(server: InMemoryMcpServer, config: ServerConnectionConfig) -> Self {
        let toolkit = McpToolkit::with_connector(config, server.clone());
        Self { server, toolkit }
    }

    /// Returns how many sessions the server has opened.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.server.opened_sessions().expect("opened count should be readable")
    }

    /// Returns how many sessions the server has closed.
    #[must_use]
    pub fn closed(&self) -> usize {
        self.server.closed_sessions().expect("closed count should be readable")
    }
}

/// Toolkit over the mixed catalog.
#[fixture]
pub fn context(server: InMemoryMcpServer, config: ServerConnectionConfig) -> TestContext {
    TestContext::new(server, config)
}
