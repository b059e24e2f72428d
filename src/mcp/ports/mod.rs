//! Port contracts for reaching a remote tool server.

mod connector;
mod dialer;
mod session;

pub use connector::{ConnectorError, ConnectorResult, SessionConnector};
#[cfg(test)]
pub(crate) use dialer::MockNetworkDialer;
pub use dialer::NetworkDialer;
pub use session::{McpSession, SessionError, SessionResult, TransportProtocol};
