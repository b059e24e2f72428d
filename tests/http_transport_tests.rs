//! End-to-end tests for the HTTP transports against local stub servers.

use eyre::{Result, ensure, eyre};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use toolbridge::mcp::{
    adapters::{PROTOCOL_VERSION, TransportConnector, http::HttpDialer},
    domain::ServerConnectionConfig,
    ports::{ConnectorError, SessionConnector, TransportProtocol},
    services::McpToolkit,
};

const SERVER_SESSION: &str = "stub-session-1";
const API_KEY: &str = "secret-key";

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Option<Value>,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    fn rpc_method(&self) -> Option<&str> {
        self.body.as_ref()?.get("method")?.as_str()
    }
}

type RequestLog = Arc<Mutex<Vec<RecordedRequest>>>;

fn recorded(log: &RequestLog) -> Vec<RecordedRequest> {
    log.lock().expect("request log lock").clone()
}

async fn read_request(reader: &mut BufReader<TcpStream>) -> io::Result<Option<RecordedRequest>> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 {
        return Ok(None);
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_owned();
    let path = parts.next().unwrap_or_default().to_owned();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
    }

    let length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut raw_body = vec![0; length];
    reader.read_exact(&mut raw_body).await?;

    Ok(Some(RecordedRequest {
        method,
        path,
        headers,
        body: serde_json::from_slice(&raw_body).ok(),
    }))
}

async fn write_response(
    reader: &mut BufReader<TcpStream>,
    status: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");

    let stream = reader.get_mut();
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.flush().await
}

/// Answers the protocol requests both stubs understand.
fn rpc_response(request: &RecordedRequest) -> Option<Value> {
    let body = request.body.as_ref()?;
    let id = body.get("id")?.clone();
    let result = match body.get("method")?.as_str()? {
        "initialize" => json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "stub", "version": "0.0.1"}
        }),
        "tools/list" => json!({
            "tools": [
                {
                    "name": "echo",
                    "description": "Echoes text",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"text": {"type": "string"}},
                        "required": ["text"]
                    }
                },
                {"name": "scalar", "inputSchema": {"type": "string"}}
            ]
        }),
        "tools/call" => {
            let text = body
                .pointer("/params/arguments/text")
                .and_then(Value::as_str)
                .unwrap_or_default();
            json!({"content": [{"type": "text", "text": format!("echo: {text}")}]})
        }
        _ => return None,
    };
    Some(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

async fn serve<F, Fut>(listener: TcpListener, handler: F)
where
    F: Fn(TcpStream) -> Fut,
    Fut: std::future::Future<Output = io::Result<()>> + Send + 'static,
{
    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(handler(stream));
    }
}

async fn bind() -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    Ok((listener, address))
}

fn network_config(address: SocketAddr) -> Result<ServerConnectionConfig> {
    Ok(ServerConnectionConfig::from_value(&json!({
        "url": format!("http://{address}/mcp"),
        "headers": {"x-api-key": API_KEY},
        "options": {"timeout": 5000}
    }))?)
}

/// Connector whose HTTP client ignores proxy settings from the environment.
fn loopback_connector() -> Result<TransportConnector> {
    let client = reqwest::Client::builder().no_proxy().build()?;
    Ok(TransportConnector::with_dialer(HttpDialer::with_client(client)))
}

async fn handle_streamable(stream: TcpStream, log: RequestLog) -> io::Result<()> {
    let mut reader = BufReader::new(stream);
    let Some(request) = read_request(&mut reader).await? else {
        return Ok(());
    };
    log.lock().expect("request log lock").push(request.clone());

    if request.method == "DELETE" {
        return write_response(&mut reader, "200 OK", &[], "").await;
    }
    let Some(response) = rpc_response(&request) else {
        return write_response(&mut reader, "202 Accepted", &[], "").await;
    };
    match request.rpc_method() {
        Some("initialize") => {
            let headers = [
                ("Content-Type", "application/json"),
                ("Mcp-Session-Id", SERVER_SESSION),
            ];
            write_response(&mut reader, "200 OK", &headers, &response.to_string()).await
        }
        Some("tools/list") => {
            let ping = json!({"jsonrpc": "2.0", "id": "srv-ping", "method": "ping"});
            let body = format!(
                ": stream opened\n\nevent: message\ndata: {ping}\n\ndata: {response}\n\n"
            );
            let headers = [("Content-Type", "text/event-stream")];
            write_response(&mut reader, "200 OK", &headers, &body).await
        }
        _ => {
            let headers = [("Content-Type", "application/json")];
            write_response(&mut reader, "200 OK", &headers, &response.to_string()).await
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn streamable_http_discovers_and_invokes() -> Result<()> {
    let (listener, address) = bind().await?;
    let log = RequestLog::default();
    let server_log = Arc::clone(&log);
    let server = tokio::spawn(serve(listener, move |stream| {
        handle_streamable(stream, Arc::clone(&server_log))
    }));

    let toolkit = McpToolkit::with_connector(network_config(address)?, loopback_connector()?);
    let catalog = toolkit.initialize().await?;
    ensure!(catalog.len() == 1, "expected one usable operation");
    ensure!(catalog.rejected().len() == 1, "expected scalar to be dropped");
    let echo = catalog
        .tool("echo")
        .ok_or_else(|| eyre!("echo should be available"))?;
    let text = echo.invoke(&json!({"text": "hello"})).await?;
    server.abort();

    ensure!(text.contains("echo: hello"), "unexpected result {text}");

    let requests = recorded(&log);
    ensure!(
        requests
            .iter()
            .all(|request| request.header("x-api-key") == Some(API_KEY)),
        "configured headers should be sent with every request"
    );
    for request in requests.iter().filter(|request| request.method == "POST") {
        let session = request.header("mcp-session-id");
        if request.rpc_method() == Some("initialize") {
            ensure!(session.is_none(), "initialize should not carry a session id");
            continue;
        }
        ensure!(
            session == Some(SERVER_SESSION),
            "post-handshake request missing session id: {request:?}"
        );
    }
    ensure!(
        requests
            .iter()
            .filter(|request| matches!(request.rpc_method(), Some("tools/list" | "tools/call")))
            .all(|request| request.header("mcp-protocol-version") == Some(PROTOCOL_VERSION)),
        "negotiated requests should carry the protocol version"
    );
    ensure!(
        requests.iter().any(|request| request
            .body
            .as_ref()
            .is_some_and(|body| body.get("id") == Some(&json!("srv-ping"))
                && body.get("result") == Some(&json!({})))),
        "server ping should be answered"
    );
    let deletes = requests
        .iter()
        .filter(|request| request.method == "DELETE")
        .count();
    ensure!(deletes == 2, "expected both sessions to be terminated, got {deletes}");
    Ok(())
}

#[derive(Clone, Default)]
struct LegacyStub {
    log: RequestLog,
    events: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
}

async fn handle_legacy(stream: TcpStream, stub: LegacyStub) -> io::Result<()> {
    let mut reader = BufReader::new(stream);
    let Some(request) = read_request(&mut reader).await? else {
        return Ok(());
    };
    stub.log
        .lock()
        .expect("request log lock")
        .push(request.clone());

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/mcp") => stream_events(reader, &stub).await,
        ("POST", path) if path.starts_with("/messages") => {
            if let Some(response) = rpc_response(&request) {
                let sender = stub.events.lock().expect("event sender lock").clone();
                if let Some(events) = sender {
                    events.send(response.to_string()).map_err(io::Error::other)?;
                }
            }
            write_response(&mut reader, "202 Accepted", &[], "").await
        }
        _ => write_response(&mut reader, "405 Method Not Allowed", &[], "").await,
    }
}

async fn stream_events(mut reader: BufReader<TcpStream>, stub: &LegacyStub) -> io::Result<()> {
    let (sender, mut receiver) = mpsc::unbounded_channel();
    *stub.events.lock().expect("event sender lock") = Some(sender);

    let stream = reader.get_mut();
    stream
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        )
        .await?;
    stream
        .write_all(b"event: endpoint\ndata: /messages?sessionId=legacy-1\n\n")
        .await?;
    stream.flush().await?;

    while let Some(message) = receiver.recv().await {
        stream
            .write_all(format!("event: message\ndata: {message}\n\n").as_bytes())
            .await?;
        stream.flush().await?;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn legacy_event_stream_is_used_when_streamable_http_fails() -> Result<()> {
    let (listener, address) = bind().await?;
    let stub = LegacyStub::default();
    let server_stub = stub.clone();
    let server = tokio::spawn(serve(listener, move |stream| {
        handle_legacy(stream, server_stub.clone())
    }));
    let config = network_config(address)?;

    let mut session = loopback_connector()?.connect(&config).await?;
    ensure!(
        session.protocol() == TransportProtocol::Sse,
        "expected the legacy transport, got {}",
        session.protocol()
    );
    session.close().await?;

    let toolkit = McpToolkit::with_connector(config, loopback_connector()?);
    let text = toolkit
        .initialize()
        .await?
        .tool("echo")
        .ok_or_else(|| eyre!("echo should be available"))?
        .invoke(&json!({"text": "over sse"}))
        .await?;
    server.abort();

    ensure!(text.contains("echo: over sse"), "unexpected result {text}");
    let requests = recorded(&stub.log);
    let first = requests
        .first()
        .ok_or_else(|| eyre!("stub should have seen requests"))?;
    ensure!(
        first.method == "POST" && first.path == "/mcp",
        "streamable HTTP should be attempted first"
    );
    ensure!(
        requests
            .iter()
            .filter(|request| request.method == "GET")
            .all(|request| request.header("x-api-key") == Some(API_KEY)),
        "fallback should reuse the configured headers"
    );
    Ok(())
}

async fn handle_rejecting(stream: TcpStream) -> io::Result<()> {
    let mut reader = BufReader::new(stream);
    if read_request(&mut reader).await?.is_none() {
        return Ok(());
    }
    write_response(&mut reader, "404 Not Found", &[], "no MCP here").await
}

#[tokio::test(flavor = "multi_thread")]
async fn second_transport_failure_is_reported() -> Result<()> {
    let (listener, address) = bind().await?;
    let server = tokio::spawn(serve(listener, handle_rejecting));

    let outcome = loopback_connector()?
        .connect(&network_config(address)?)
        .await;
    server.abort();

    match outcome {
        Err(ConnectorError::Connection { protocol, .. }) => {
            ensure!(protocol == TransportProtocol::Sse, "expected the SSE failure, got {protocol}");
            Ok(())
        }
        Err(other) => Err(eyre!("unexpected connector error: {other}")),
        Ok(_) => Err(eyre!("connection should fail")),
    }
}
