//! Connects to an MCP tool server, prints its operation catalog, and
//! optionally invokes one operation.
//!
//! Usage:
//!
//! ```text
//! mcp_probe [--trusted] <config-path> [operation [arguments-json]]
//! ```
//!
//! The file at `config-path` holds a connection configuration, either a
//! process form or a network form:
//!
//! ```json
//! {"command": "npx", "args": ["-y", "@modelcontextprotocol/server-everything"]}
//! ```
//!
//! ```json
//! {"url": "http://localhost:3000/mcp", "headers": {"Authorization": "Bearer token"}}
//! ```
//!
//! The catalog is written to stdout as JSON. When an operation is named its
//! result text follows on a separate line. Process arguments are screened
//! unless `--trusted` is given. Diagnostics go to stderr and are filtered with
//! `RUST_LOG`.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Serialize;
use serde_json::Value;
use std::env;
use std::io::{self, Write};
use thiserror::Error;
use tokio::runtime::Builder;
use toolbridge::mcp::{
    adapters::{TransportConnector, TrustMode},
    domain::{OperationDescriptor, ServerConnectionConfig},
    services::{Catalog, InvocationError, McpToolkit, ToolkitError},
};
use tracing_subscriber::EnvFilter;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

const TRUSTED_FLAG: &str = "--trusted";

#[derive(Debug, Error)]
enum ProbeError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("failed to read config '{path}': {source}")]
    ConfigRead {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("operation arguments are not valid JSON: {0}")]
    ArgumentsParse(#[source] serde_json::Error),
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),
    #[error("operation '{0}' is not in the catalog")]
    UnknownOperation(String),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] io::Error),
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

#[derive(Debug)]
struct ProbeArgs {
    trust: TrustMode,
    config_path: Utf8PathBuf,
    operation: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Serialize)]
struct CatalogReport<'a> {
    tools: Vec<&'a OperationDescriptor>,
    rejected: Vec<RejectedReport>,
}

#[derive(Debug, Serialize)]
struct RejectedReport {
    operation: String,
    reason: String,
}

impl<'a> From<&'a Catalog> for CatalogReport<'a> {
    fn from(catalog: &'a Catalog) -> Self {
        Self {
            tools: catalog.tools().iter().map(|tool| tool.descriptor()).collect(),
            rejected: catalog
                .rejected()
                .iter()
                .map(|err| RejectedReport {
                    operation: err.operation().to_owned(),
                    reason: err.to_string(),
                })
                .collect(),
        }
    }
}

fn main() -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    run(collect_args()?).map_err(|err| {
        tracing::error!(error = %err, "probe failed");
        err.into()
    })
}

fn collect_args() -> Result<Vec<String>, ProbeError> {
    env::args_os()
        .skip(1)
        .map(|arg_os| {
            arg_os
                .into_string()
                .map_err(|_| ProbeError::InvalidArgs("argument is not valid UTF-8".into()))
        })
        .collect()
}

fn parse_args(args: Vec<String>) -> Result<ProbeArgs, ProbeError> {
    let mut trust = TrustMode::Untrusted;
    let mut positional = Vec::new();
    for arg in args {
        if arg == TRUSTED_FLAG {
            trust = TrustMode::Trusted;
        } else {
            positional.push(arg);
        }
    }

    let mut remaining = positional.into_iter();
    let config_path = remaining
        .next()
        .map(Utf8PathBuf::from)
        .ok_or_else(|| ProbeError::InvalidArgs("missing config path argument".into()))?;
    let operation = remaining.next();
    let arguments = remaining.next();
    if let Some(extra) = remaining.next() {
        return Err(ProbeError::InvalidArgs(format!(
            "unexpected extra argument: {extra}"
        )));
    }

    Ok(ProbeArgs {
        trust,
        config_path,
        operation,
        arguments,
    })
}

fn run(args: Vec<String>) -> Result<(), ProbeError> {
    let probe = parse_args(args)?;
    let config = load_config(&probe.config_path)?;
    let arguments = probe
        .arguments
        .as_deref()
        .map_or_else(|| Ok(Value::Object(serde_json::Map::new())), serde_json::from_str)
        .map_err(ProbeError::ArgumentsParse)?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ProbeError::RuntimeInit)?;

    runtime.block_on(async {
        let connector = TransportConnector::new().with_trust_mode(probe.trust);
        let toolkit = McpToolkit::with_connector(config, connector);
        let outcome = probe_server(&toolkit, probe.operation.as_deref(), &arguments).await;
        toolkit.cleanup().await;
        outcome
    })
}

async fn probe_server(
    toolkit: &McpToolkit,
    operation: Option<&str>,
    arguments: &Value,
) -> Result<(), ProbeError> {
    let catalog = toolkit.initialize().await?;
    let report = serde_json::to_string_pretty(&CatalogReport::from(catalog))
        .map_err(|err| ProbeError::Output(io::Error::other(err)))?;
    write_line(&report)?;

    let Some(name) = operation else {
        return Ok(());
    };
    let adapter = catalog
        .tool(name)
        .ok_or_else(|| ProbeError::UnknownOperation(name.to_owned()))?;
    let result = adapter.invoke(arguments).await?;
    write_line(&result)
}

fn load_config(path: &Utf8Path) -> Result<ServerConnectionConfig, ProbeError> {
    let text = read_config_file(path).map_err(|source| ProbeError::ConfigRead {
        path: path.to_owned(),
        source,
    })?;
    let raw: Value = serde_json::from_str(&text).map_err(ProbeError::ConfigParse)?;
    ServerConnectionConfig::from_value(&raw).map_err(|err| ProbeError::Toolkit(err.into()))
}

fn read_config_file(path: &Utf8Path) -> io::Result<String> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read_to_string(file_name)
}

fn write_line(text: &str) -> Result<(), ProbeError> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}").map_err(ProbeError::Output)
}
