//! Materialized result of toolkit initialization.

use super::{AdapterBuildError, OperationAdapter};
use crate::mcp::domain::OperationDescriptor;

/// Discovered operations and the adapters usable by the host.
///
/// `tools` holds one adapter per accepted operation in server order.
/// Operations that could not be adapted are listed in `rejected`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    descriptors: Vec<OperationDescriptor>,
    tools: Vec<OperationAdapter>,
    rejected: Vec<AdapterBuildError>,
}

impl Catalog {
    /// Assembles a catalog.
    #[must_use]
    pub const fn new(
        descriptors: Vec<OperationDescriptor>,
        tools: Vec<OperationAdapter>,
        rejected: Vec<AdapterBuildError>,
    ) -> Self {
        Self {
            descriptors,
            tools,
            rejected,
        }
    }

    /// Returns every descriptor the server listed.
    #[must_use]
    pub fn descriptors(&self) -> &[OperationDescriptor] {
        &self.descriptors
    }

    /// Returns the usable adapters.
    #[must_use]
    pub fn tools(&self) -> &[OperationAdapter] {
        &self.tools
    }

    /// Returns why each dropped operation was dropped.
    #[must_use]
    pub fn rejected(&self) -> &[AdapterBuildError] {
        &self.rejected
    }

    /// Looks up an adapter by operation name.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&OperationAdapter> {
        self.tools.iter().find(|adapter| adapter.name() == name)
    }

    /// Returns the number of usable adapters.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether no adapter is usable.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
