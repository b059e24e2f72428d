//! Catalog construction and initialization state tests.

use super::helpers::{TestContext, config, context, object_schema};
use rstest::rstest;
use serde_json::json;
use toolbridge::mcp::{
    adapters::InMemoryMcpServer,
    domain::{
        ConnectionConfigError, OperationDescriptor, SchemaTranslationError,
        ServerConnectionConfig,
    },
    ports::{ConnectorError, SessionError},
    services::{AdapterBuildError, McpToolkit, OperationAdapter, ToolkitError},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn untranslatable_operations_are_dropped(context: TestContext) {
    let catalog = context
        .toolkit
        .initialize()
        .await
        .expect("initialization should succeed");

    let names: Vec<&str> = catalog.tools().iter().map(OperationAdapter::name).collect();
    assert_eq!(names, ["read_file", "search"]);
    assert_eq!(catalog.descriptors().len(), 4);

    let dropped: Vec<&str> = catalog
        .rejected()
        .iter()
        .map(AdapterBuildError::operation)
        .collect();
    assert_eq!(dropped, ["broken", "empty"]);
    assert!(matches!(
        catalog.rejected().first(),
        Some(AdapterBuildError::Translation {
            source: SchemaTranslationError::RootNotObject { .. },
            ..
        })
    ));
    assert!(matches!(
        catalog.rejected().get(1),
        Some(AdapterBuildError::Translation {
            source: SchemaTranslationError::EmptyRootProperties,
            ..
        })
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tools_before_initialize_is_a_state_error(context: TestContext) {
    assert!(matches!(
        context.toolkit.tools(),
        Err(ToolkitError::NotInitialized)
    ));
    assert!(matches!(
        context.toolkit.tool("search"),
        Err(ToolkitError::NotInitialized)
    ));
    assert!(context.toolkit.catalog().is_none());
    assert_eq!(context.opened(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_initialize_reuses_the_catalog(context: TestContext) {
    let first = context.toolkit.initialize().await.expect("first initialize");
    let second = context.toolkit.initialize().await.expect("second initialize");

    assert!(std::ptr::eq(first, second));
    assert_eq!(context.opened(), 1);
    assert_eq!(context.closed(), 1);
    assert_eq!(context.toolkit.tools().expect("initialized").len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_initialize_discovers_once(context: TestContext) {
    let (first, second) = tokio::join!(context.toolkit.initialize(), context.toolkit.initialize());

    let first_catalog = first.expect("first initialize");
    let second_catalog = second.expect("second initialize");
    assert!(std::ptr::eq(first_catalog, second_catalog));
    assert_eq!(context.opened(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn listing_failure_aborts_initialization(context: TestContext) {
    context
        .server
        .set_list_failure(Some(SessionError::MalformedResponse("not json".to_owned())))
        .expect("script failure");

    let outcome = context.toolkit.initialize().await;

    assert!(matches!(
        outcome,
        Err(ToolkitError::Discovery(SessionError::MalformedResponse(_)))
    ));
    assert_eq!(context.closed(), 1, "discovery session should be closed");
    assert!(matches!(
        context.toolkit.tools(),
        Err(ToolkitError::NotInitialized)
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn connection_failure_aborts_initialization(context: TestContext) {
    context
        .server
        .set_connect_failure(Some(SessionError::transport_message("connection refused")))
        .expect("script failure");

    let outcome = context.toolkit.initialize().await;

    assert!(matches!(
        outcome,
        Err(ToolkitError::Connection(ConnectorError::Connection { .. }))
    ));
    assert_eq!(context.opened(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_catalog_initializes_with_no_tools(config: ServerConnectionConfig) {
    let context = TestContext::new(InMemoryMcpServer::new(), config);

    let catalog = context.toolkit.initialize().await.expect("initialize");

    assert!(catalog.is_empty());
    assert!(catalog.rejected().is_empty());
    assert!(context.toolkit.tools().expect("initialized").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tool_lookup_finds_accepted_operations(context: TestContext) {
    context.toolkit.initialize().await.expect("initialize");

    let search = context
        .toolkit
        .tool("search")
        .expect("initialized")
        .expect("search should be available");
    assert_eq!(search.description(), "Searches indexed notes");
    assert!(context.toolkit.tool("broken").expect("initialized").is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn catalog_changes_after_initialize_are_not_seen(context: TestContext) {
    context.toolkit.initialize().await.expect("initialize");
    context
        .server
        .set_catalog(vec![OperationDescriptor::new(
            "late",
            "Added after discovery",
            object_schema(json!({"x": {"type": "boolean"}}), json!([])),
        )])
        .expect("replace catalog");

    let catalog = context.toolkit.initialize().await.expect("initialize");

    assert!(catalog.tool("late").is_none());
    assert_eq!(catalog.len(), 2);
}

#[test]
fn invalid_configuration_is_rejected_before_connecting() {
    let outcome = McpToolkit::from_value(&json!({"url": "ftp://files.example.com"}));

    assert!(matches!(
        outcome,
        Err(ToolkitError::Config(ConnectionConfigError::UnsupportedScheme(_)))
    ));
}
