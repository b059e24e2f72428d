//! Adapter implementations of the session and connector ports.

pub mod http;
pub mod memory;

mod channel;
mod connector;
mod protocol;
mod stdio;

pub use channel::LineChannel;
pub use connector::{TransportConnector, TrustMode};
pub use memory::{InMemoryMcpServer, InvocationRecord};
pub use protocol::{PROTOCOL_VERSION, RpcExchange};
pub use stdio::StdioSession;
