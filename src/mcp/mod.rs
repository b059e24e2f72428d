//! MCP tool bridge: connect to a remote tool server, discover its operations,
//! and expose each one as an invocable adapter.
//!
//! The module follows the same hexagonal split as the rest of the crate:
//!
//! - Domain types in [`domain`]: connection configuration, operation
//!   descriptors, validators, schema translation, and the argument guard
//! - Port contracts in [`ports`]: sessions, connectors, and network dialers
//! - Adapter implementations in [`adapters`]: stdio, streamable HTTP, legacy
//!   SSE, and an in-memory server for tests
//! - Orchestration services in [`services`]: discovery, operation adapters,
//!   and the toolkit manager

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
