//! Services that discover a server's operations and expose them as adapters.

mod adapter;
mod catalog;
mod discovery;
mod toolkit;

pub use adapter::{AdapterBuildError, InvocationError, OperationAdapter, SessionPolicy};
pub use catalog::Catalog;
pub use discovery::discover_operations;
pub use toolkit::{McpToolkit, ToolkitError, ToolkitResult, ToolkitSettings};
