//! Invocation tests: session isolation, error propagation, and result text.

use super::helpers::{TestContext, config, context, mixed_catalog, server};
use rstest::rstest;
use serde_json::{Value, json};
use std::collections::HashSet;
use toolbridge::mcp::{
    adapters::InMemoryMcpServer,
    domain::{InvocationOutput, ServerConnectionConfig},
    ports::{ConnectorError, SessionError},
    services::{InvocationError, OperationAdapter, SessionPolicy, ToolkitSettings},
};

async fn adapter(context: &TestContext, name: &str) -> OperationAdapter {
    context
        .toolkit
        .initialize()
        .await
        .expect("initialization should succeed")
        .tool(name)
        .cloned()
        .expect("operation should be in the catalog")
}

fn parse(text: &str) -> Value {
    serde_json::from_str(text).expect("result text should be JSON")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_call_gets_its_own_session(context: TestContext) {
    let read_file = adapter(&context, "read_file").await;

    for path in ["a.md", "b.md", "c.md"] {
        read_file
            .invoke(&json!({"path": path}))
            .await
            .expect("call should succeed");
    }

    let records = context.server.invocations().expect("records");
    let sessions: HashSet<_> = records.iter().map(|record| record.session_id).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(sessions.len(), 3);
    assert_eq!(context.opened(), 4, "one discovery session plus one per call");
    assert_eq!(context.closed(), 4);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_calls_use_distinct_sessions(context: TestContext) {
    let read_file = adapter(&context, "read_file").await;
    let search = adapter(&context, "search").await;

    let read_arguments = json!({"path": "todo.md"});
    let search_arguments = json!({"query": "deadline", "limit": 5});
    let (read, found) = tokio::join!(
        read_file.invoke(&read_arguments),
        search.invoke(&search_arguments),
    );
    read.expect("read_file should succeed");
    found.expect("search should succeed");

    let records = context.server.invocations().expect("records");
    let sessions: HashSet<_> = records.iter().map(|record| record.session_id).collect();
    assert_eq!(sessions.len(), 2);
    assert_eq!(context.opened(), 3, "one discovery session plus one per call");
    assert_eq!(context.opened(), context.closed());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn echoed_result_is_returned_as_json_text(context: TestContext) {
    let search = adapter(&context, "search").await;

    let text = search
        .invoke(&json!({"query": "rust", "limit": 3}))
        .await
        .expect("call should succeed");

    let blocks = parse(&text);
    let echoed = blocks
        .pointer("/0/text")
        .and_then(Value::as_str)
        .expect("first block should carry text");
    assert_eq!(parse(echoed), json!({"query": "rust", "limit": 3}));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn result_text_is_deterministic(context: TestContext) {
    context
        .server
        .set_result(
            "search",
            InvocationOutput::new(vec![json!({
                "type": "text",
                "text": "3 hits",
                "annotations": {"z": 1, "a": 2}
            })]),
        )
        .expect("script result");
    let search = adapter(&context, "search").await;

    let first = search.invoke(&json!({"query": "x"})).await.expect("first");
    let second = search.invoke(&json!({"query": "x"})).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(
        first,
        r#"[{"annotations":{"a":2,"z":1},"text":"3 hits","type":"text"}]"#
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_arguments_never_reach_the_server(context: TestContext) {
    let search = adapter(&context, "search").await;

    let outcome = search.invoke(&json!({"query": 42, "unexpected": true})).await;

    let Err(InvocationError::InvalidArguments { operation, source }) = outcome else {
        panic!("expected invalid arguments, got {outcome:?}");
    };
    assert_eq!(operation, "search");
    assert_eq!(source.issues.len(), 2);
    assert_eq!(context.opened(), 1, "only the discovery session was opened");
    assert!(context.server.invocations().expect("records").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn remote_failure_is_propagated_and_session_closed(context: TestContext) {
    context
        .server
        .set_failure(
            "read_file",
            SessionError::Remote {
                code: -32000,
                message: "permission denied".to_owned(),
                data: Some(json!({"path": "/etc/shadow"})),
            },
        )
        .expect("script failure");
    let read_file = adapter(&context, "read_file").await;

    let outcome = read_file.invoke(&json!({"path": "secret.txt"})).await;

    assert!(matches!(
        outcome,
        Err(InvocationError::Remote {
            source: SessionError::Remote { code: -32000, .. },
            ..
        })
    ));
    assert_eq!(context.opened(), 2);
    assert_eq!(context.closed(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn connection_failure_after_initialize_is_reported(context: TestContext) {
    let read_file = adapter(&context, "read_file").await;
    context
        .server
        .set_connect_failure(Some(SessionError::transport_message("server went away")))
        .expect("script failure");

    let outcome = read_file.invoke(&json!({"path": "a.md"})).await;

    assert!(matches!(
        outcome,
        Err(InvocationError::Connection {
            source: ConnectorError::Connection { .. },
            ..
        })
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn one_failing_operation_leaves_others_usable(context: TestContext) {
    context
        .server
        .set_failure("search", SessionError::Closed)
        .expect("script failure");
    let search = adapter(&context, "search").await;
    let read_file = adapter(&context, "read_file").await;

    assert!(search.invoke(&json!({"query": "x"})).await.is_err());
    assert!(read_file.invoke(&json!({"path": "a.md"})).await.is_ok());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shared_policy_reuses_one_session_until_cleanup(
    server: InMemoryMcpServer,
    config: ServerConnectionConfig,
) {
    let mut context = TestContext::new(server, config);
    context.toolkit = context
        .toolkit
        .with_settings(ToolkitSettings::new().with_session_policy(SessionPolicy::Shared));
    let read_file = adapter(&context, "read_file").await;
    assert_eq!(read_file.session_policy(), SessionPolicy::Shared);

    for path in ["a.md", "b.md", "c.md"] {
        read_file
            .invoke(&json!({"path": path}))
            .await
            .expect("call should succeed");
    }
    assert_eq!(context.opened(), 2, "discovery plus one shared session");
    assert_eq!(context.closed(), 1);

    context.toolkit.cleanup().await;
    assert_eq!(context.closed(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_operation_is_reported_by_the_server() {
    let server = InMemoryMcpServer::with_catalog(mixed_catalog());
    let context = TestContext::new(server, config());
    let read_file = adapter(&context, "read_file").await;
    context
        .server
        .set_catalog(Vec::new())
        .expect("clear catalog");

    let outcome = read_file.invoke(&json!({"path": "a.md"})).await;

    assert!(matches!(
        outcome,
        Err(InvocationError::Remote {
            source: SessionError::Remote { code: -32602, .. },
            ..
        })
    ));
}
