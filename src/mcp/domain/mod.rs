//! Domain model for the MCP tool bridge.
//!
//! Connection configuration, operation metadata, validator trees, and the
//! pure functions that build and screen them. Nothing here performs I/O.

mod arguments;
mod config;
mod descriptor;
mod error;
mod ids;
mod output;
mod schema;
mod validator;

pub use arguments::{MAX_ARGUMENT_LENGTH, check_argument, ensure_safe_arguments};
pub use config::{
    CallOptions, INHERITED_VARIABLES, NetworkTransportConfig, ProcessTransportConfig,
    SEARCH_PATH_VARIABLE, ServerConnectionConfig, TransportKind, overlay_host_environment,
    overlay_search_path,
};
pub use descriptor::OperationDescriptor;
pub use error::{
    ArgumentValidationError, ConnectionConfigError, RejectionReason, SafetyRejection,
    SchemaTranslationError, ValidationIssue,
};
pub use ids::SessionId;
pub use output::InvocationOutput;
pub use schema::{translate_input_schema, translate_shape};
pub use validator::{
    AdditionalFields, NumberRule, ObjectField, ObjectRule, StringRule, Validator, ValidatorRule,
};
