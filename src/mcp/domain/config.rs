//! Server connection configuration value objects.
//!
//! The transport kind is decided once, from the presence of the `command`
//! key, and never changes afterwards.

use super::ConnectionConfigError;
use reqwest::Url;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Name of the executable search-path variable inherited from the host.
pub const SEARCH_PATH_VARIABLE: &str = "PATH";

/// Host variables a child process inherits unless the overlay sets them.
#[cfg(windows)]
pub const INHERITED_VARIABLES: &[&str] = &[
    "APPDATA",
    "HOMEDRIVE",
    "HOMEPATH",
    "LOCALAPPDATA",
    "PATH",
    "PROCESSOR_ARCHITECTURE",
    "SYSTEMDRIVE",
    "SYSTEMROOT",
    "TEMP",
    "USERNAME",
    "USERPROFILE",
];

/// Host variables a child process inherits unless the overlay sets them.
#[cfg(not(windows))]
pub const INHERITED_VARIABLES: &[&str] = &["HOME", "LOGNAME", "PATH", "SHELL", "TERM", "USER"];

/// Per-request limits forwarded with every protocol call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    timeout: Option<Duration>,
}

impl CallOptions {
    /// Creates options with no limits.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout: None }
    }

    /// Bounds each request by `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the per-request timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Settings for a server launched as a local process over stdio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTransportConfig {
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    options: CallOptions,
}

impl ProcessTransportConfig {
    /// Creates a process configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionConfigError::EmptyCommand`] when `command` is empty
    /// after trimming.
    pub fn new(command: impl Into<String>) -> Result<Self, ConnectionConfigError> {
        let normalized_command = command.into().trim().to_owned();
        if normalized_command.is_empty() {
            return Err(ConnectionConfigError::EmptyCommand);
        }

        Ok(Self {
            command: normalized_command,
            args: Vec::new(),
            env: BTreeMap::new(),
            options: CallOptions::new(),
        })
    }

    /// Replaces command-line arguments.
    #[must_use]
    pub fn with_args(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.args = values.into_iter().collect();
        self
    }

    /// Replaces the environment overlay.
    #[must_use]
    pub fn with_env(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = values.into_iter().collect();
        self
    }

    /// Sets per-request options.
    #[must_use]
    pub const fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the executable command.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns command-line arguments in order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the configured environment overlay.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns per-request options.
    #[must_use]
    pub const fn options(&self) -> &CallOptions {
        &self.options
    }

    /// Returns the environment the child process is spawned with.
    ///
    /// The host's [`INHERITED_VARIABLES`], `PATH` among them, are added
    /// unless the overlay already defines them.
    #[must_use]
    pub fn effective_env(&self) -> BTreeMap<String, String> {
        overlay_host_environment(&self.env, |name| std::env::var(name).ok())
    }
}

/// Adds `host_path` as `PATH` unless `env` already has a `PATH` key in any case.
#[must_use]
pub fn overlay_search_path(
    env: &BTreeMap<String, String>,
    host_path: Option<String>,
) -> BTreeMap<String, String> {
    let mut effective = env.clone();
    inherit_variable(&mut effective, env, SEARCH_PATH_VARIABLE, host_path);
    effective
}

/// Adds each of [`INHERITED_VARIABLES`] found by `host_value` unless `env`
/// already has that key in any case.
///
/// Values that look like exported shell functions are skipped.
#[must_use]
pub fn overlay_host_environment<F>(
    env: &BTreeMap<String, String>,
    host_value: F,
) -> BTreeMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut effective = env.clone();
    for name in INHERITED_VARIABLES {
        let value = host_value(name).filter(|value| !value.starts_with("()"));
        inherit_variable(&mut effective, env, name, value);
    }
    effective
}

fn inherit_variable(
    effective: &mut BTreeMap<String, String>,
    env: &BTreeMap<String, String>,
    name: &str,
    host_value: Option<String>,
) {
    let configured = env.keys().any(|key| key.eq_ignore_ascii_case(name));
    if let Some(value) = host_value.filter(|_| !configured) {
        effective.insert(name.to_owned(), value);
    }
}

/// Settings for a server reachable over the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTransportConfig {
    url: Url,
    headers: BTreeMap<String, String>,
    options: CallOptions,
}

impl NetworkTransportConfig {
    /// Creates a network configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionConfigError`] when the URL is empty, cannot be
    /// parsed, or does not use `http`/`https`.
    pub fn new(url: impl Into<String>) -> Result<Self, ConnectionConfigError> {
        let raw_url = url.into().trim().to_owned();
        if raw_url.is_empty() {
            return Err(ConnectionConfigError::MissingUrl);
        }

        let parsed = Url::parse(&raw_url).map_err(|err| ConnectionConfigError::InvalidUrl {
            url: raw_url.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConnectionConfigError::UnsupportedScheme(raw_url));
        }

        Ok(Self {
            url: parsed,
            headers: BTreeMap::new(),
            options: CallOptions::new(),
        })
    }

    /// Replaces the headers attached to every outbound request.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionConfigError::InvalidHeader`] when a name or value
    /// is not valid in an HTTP header.
    pub fn with_headers(
        mut self,
        values: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConnectionConfigError> {
        let headers: BTreeMap<String, String> = values.into_iter().collect();
        for (name, value) in &headers {
            let valid = HeaderName::from_bytes(name.as_bytes()).is_ok()
                && HeaderValue::from_str(value).is_ok();
            if !valid {
                return Err(ConnectionConfigError::InvalidHeader(name.clone()));
            }
        }
        self.headers = headers;
        Ok(self)
    }

    /// Sets per-request options.
    #[must_use]
    pub const fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the server endpoint.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the headers attached to every outbound request.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns per-request options.
    #[must_use]
    pub const fn options(&self) -> &CallOptions {
        &self.options
    }
}

/// Transport family selected by a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Locally spawned process over stdio.
    Process,
    /// Network endpoint.
    Network,
}

impl TransportKind {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Immutable configuration describing how to reach a tool server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub enum ServerConnectionConfig {
    /// Spawn a local process and talk over stdio.
    Process(ProcessTransportConfig),
    /// Connect to a network endpoint.
    Network(NetworkTransportConfig),
}

impl ServerConnectionConfig {
    /// Returns the transport family.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Process(_) => TransportKind::Process,
            Self::Network(_) => TransportKind::Network,
        }
    }

    /// Returns per-request options for either transport.
    #[must_use]
    pub const fn options(&self) -> &CallOptions {
        match self {
            Self::Process(config) => config.options(),
            Self::Network(config) => config.options(),
        }
    }

    /// Parses a structural configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionConfigError`] when the value is not an object,
    /// fields have the wrong shape, or required fields are missing.
    pub fn from_value(raw: &Value) -> Result<Self, ConnectionConfigError> {
        let object = raw.as_object().ok_or(ConnectionConfigError::NotAnObject)?;

        if object.contains_key("command") {
            let fields: RawProcessConfig = serde_json::from_value(raw.clone())
                .map_err(|err| ConnectionConfigError::Malformed(err.to_string()))?;
            let config = ProcessTransportConfig::new(fields.command)?
                .with_args(fields.args)
                .with_env(fields.env)
                .with_options(fields.options.into());
            return Ok(Self::Process(config));
        }

        let fields: RawNetworkConfig = serde_json::from_value(raw.clone())
            .map_err(|err| ConnectionConfigError::Malformed(err.to_string()))?;
        let url = fields.url.ok_or(ConnectionConfigError::MissingUrl)?;
        let config = NetworkTransportConfig::new(url)?
            .with_headers(fields.headers)?
            .with_options(fields.options.into());
        Ok(Self::Network(config))
    }
}

impl TryFrom<Value> for ServerConnectionConfig {
    type Error = ConnectionConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCallOptions {
    #[serde(default)]
    timeout: Option<u64>,
}

impl From<RawCallOptions> for CallOptions {
    fn from(raw: RawCallOptions) -> Self {
        raw.timeout.map_or_else(Self::new, |millis| {
            Self::new().with_timeout(Duration::from_millis(millis))
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawProcessConfig {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    options: RawCallOptions,
}

#[derive(Debug, Deserialize)]
struct RawNetworkConfig {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    options: RawCallOptions,
}
