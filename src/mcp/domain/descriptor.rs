//! Operation descriptor value object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote metadata describing one callable operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    description: String,
    #[serde(rename = "inputSchema", default)]
    input_schema: Value,
}

impl OperationDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human description, empty when the server sent none.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the raw input-shape description.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
