//! Toolbridge: expose the operations of a remote MCP tool server as
//! validated, invocable adapters.
//!
//! # Architecture
//!
//! Toolbridge follows hexagonal architecture principles:
//!
//! - **Domain**: connection configuration, validators, schema translation,
//!   and argument screening, with no I/O
//! - **Ports**: abstract session, connector, and dialer traits
//! - **Adapters**: stdio, streamable HTTP, legacy SSE, and in-memory
//!   implementations of those ports
//! - **Services**: catalog discovery, operation adapters, and the toolkit
//!   manager
//!
//! # Modules
//!
//! - [`mcp`]: the MCP tool bridge

pub mod mcp;
