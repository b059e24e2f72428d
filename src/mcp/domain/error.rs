//! Error types for connection configuration, schema translation, argument
//! validation, and process argument screening.

use std::fmt;
use thiserror::Error;

/// Errors returned while parsing a server connection configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionConfigError {
    /// The configuration is not a JSON object.
    #[error("connection configuration must be a JSON object")]
    NotAnObject,

    /// A field has the wrong shape.
    #[error("malformed connection configuration: {0}")]
    Malformed(String),

    /// The process command is empty after trimming.
    #[error("process command must not be empty")]
    EmptyCommand,

    /// A network configuration has no URL.
    #[error("network connection configuration requires a 'url'")]
    MissingUrl,

    /// The URL cannot be parsed.
    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as supplied.
        url: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The URL scheme is neither `http` nor `https`.
    #[error("server URL '{0}' must use the http or https scheme")]
    UnsupportedScheme(String),

    /// A configured header name or value cannot be sent over HTTP.
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
}

/// Errors returned while translating an input-shape description.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaTranslationError {
    /// The root shape does not declare `type: "object"`.
    #[error("input schema root must be an object, found {found}")]
    RootNotObject {
        /// Declared kind of the root, or a description of what was found.
        found: String,
    },

    /// The root object has no `properties` map.
    #[error("input schema root has no 'properties' map")]
    MissingRootProperties,

    /// The root object declares an empty `properties` map.
    #[error("input schema root declares no properties")]
    EmptyRootProperties,
}

/// A single structural problem found while validating arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Location of the offending value, rooted at `$`.
    pub path: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.path, self.message)
    }
}

/// Arguments failed structural validation.
///
/// All issues are collected before the error is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid arguments: {}", format_issues(.issues))]
pub struct ArgumentValidationError {
    /// Every issue found, in traversal order.
    pub issues: Vec<ValidationIssue>,
}

impl ArgumentValidationError {
    /// Creates an error from collected issues.
    #[must_use]
    pub const fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a process argument was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Unix or Windows absolute path.
    AbsolutePath,
    /// Contains a `..` traversal segment.
    ParentTraversal,
    /// Starts with `./`, `.\`, `~/`, or `~\`.
    RelativePathPrefix,
    /// Starts with `file://`.
    FileUrl,
    /// Ends with an executable or script extension.
    ExecutableExtension,
    /// Looks like a flag that reads or writes files.
    FileFlag,
    /// Contains a NUL byte.
    NullByte,
    /// Exceeds the argument length ceiling.
    TooLong,
}

impl RejectionReason {
    /// Returns a short description of the rule.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AbsolutePath => "absolute filesystem path",
            Self::ParentTraversal => "parent directory traversal",
            Self::RelativePathPrefix => "relative or home path prefix",
            Self::FileUrl => "file URL",
            Self::ExecutableExtension => "executable or script file extension",
            Self::FileFlag => "file input/output flag",
            Self::NullByte => "embedded null byte",
            Self::TooLong => "argument too long",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A process argument matched the denylist.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("process argument '{argument}' rejected: {reason}")]
pub struct SafetyRejection {
    /// The offending argument, truncated when very long.
    pub argument: String,
    /// The rule that matched.
    pub reason: RejectionReason,
}
