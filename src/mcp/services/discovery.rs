//! Catalog discovery over an open session.

use crate::mcp::{
    domain::{CallOptions, OperationDescriptor},
    ports::{McpSession, SessionResult},
};

/// Lists the operations a server exposes, in server order.
///
/// The caller keeps ownership of the session and remains responsible for
/// closing it.
///
/// # Errors
///
/// Returns the session failure unchanged; a failed listing is fatal to
/// toolkit initialization.
pub async fn discover_operations(
    session: &mut dyn McpSession,
    options: &CallOptions,
) -> SessionResult<Vec<OperationDescriptor>> {
    let operations = session.list_operations(options).await?;
    tracing::debug!(
        session_id = %session.id(),
        count = operations.len(),
        "discovered operations"
    );
    Ok(operations)
}
